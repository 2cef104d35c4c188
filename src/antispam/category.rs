//! Spam-sensitive event categories and source kinds.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Identifier of an agent, object, owner, or sound asset.
pub type SourceId = uuid::Uuid;

/// The eight inbound event kinds that are rate limited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Chat,
    Inventory,
    Im,
    CallingCard,
    Sound,
    SoundPreload,
    ScriptDialog,
    Teleport,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 8;

    /// Every category, in index order.
    pub const ALL: [Category; Category::COUNT] = [
        Category::Chat,
        Category::Inventory,
        Category::Im,
        Category::CallingCard,
        Category::Sound,
        Category::SoundPreload,
        Category::ScriptDialog,
        Category::Teleport,
    ];

    /// Dense index used for per-category tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short machine name (config keys, metric labels, replay input).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Inventory => "inventory",
            Self::Im => "im",
            Self::CallingCard => "calling_card",
            Self::Sound => "sound",
            Self::SoundPreload => "sound_preload",
            Self::ScriptDialog => "script_dialog",
            Self::Teleport => "teleport",
        }
    }

    /// Human-readable queue name used in block notices.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Inventory => "Inventory",
            Self::Im => "Instant Message",
            Self::CallingCard => "Calling Card",
            Self::Sound => "Sound",
            Self::SoundPreload => "Sound Preload",
            Self::ScriptDialog => "Script Dialog",
            Self::Teleport => "Teleport",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lowered)
            .ok_or_else(|| ParseError::UnknownCategory(s.to_string()))
    }
}

/// Whether an event came from an avatar or from an in-world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Agent,
    Object,
}

impl SourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "object" => Ok(Self::Object),
            _ => Err(ParseError::UnknownSourceKind(s.to_string())),
        }
    }
}
