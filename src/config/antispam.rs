//! Anti-spam thresholds, windows, and related knobs.

use serde::Deserialize;
use std::time::Duration;

use crate::antispam::{Category, DEFAULT_NEWLINE_THRESHOLD, SourceId};

/// Threshold and window for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QueueLimits {
    /// Events allowed per window before the source is blocked.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl QueueLimits {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_secs: default_window_secs(),
        }
    }
}

/// Per-category overrides of [`AntispamConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryLimits {
    pub chat: Option<QueueLimits>,
    pub inventory: Option<QueueLimits>,
    pub im: Option<QueueLimits>,
    pub calling_card: Option<QueueLimits>,
    pub sound: Option<QueueLimits>,
    pub sound_preload: Option<QueueLimits>,
    pub script_dialog: Option<QueueLimits>,
    pub teleport: Option<QueueLimits>,
}

impl CategoryLimits {
    pub fn get(&self, category: Category) -> Option<QueueLimits> {
        match category {
            Category::Chat => self.chat,
            Category::Inventory => self.inventory,
            Category::Im => self.im,
            Category::CallingCard => self.calling_card,
            Category::Sound => self.sound,
            Category::SoundPreload => self.sound_preload,
            Category::ScriptDialog => self.script_dialog,
            Category::Teleport => self.teleport,
        }
    }
}

/// Anti-spam configuration (`[antispam]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AntispamConfig {
    /// Count every event a second time in a category-agnostic queue (default: false).
    #[serde(default)]
    pub global_enabled: bool,
    /// Limits of the global queue.
    #[serde(default)]
    pub global: QueueLimits,
    /// Limits applied to categories without an override.
    #[serde(default)]
    pub default: QueueLimits,
    /// Per-category overrides.
    #[serde(default)]
    pub categories: CategoryLimits,
    /// Scale applied to the default threshold for the sound queue (default: 10).
    #[serde(default = "default_sound_multiplier")]
    pub sound_multiplier: u32,
    /// Scale applied to the default threshold for the sound preload queue (default: 4).
    #[serde(default = "default_sound_preload_multiplier")]
    pub sound_preload_multiplier: u32,
    /// Line breaks tolerated in one message before it counts as a flood (default: 10).
    #[serde(default = "default_newline_threshold")]
    pub newline_threshold: usize,
    /// Known physics-collision sound asset ids.
    #[serde(default)]
    pub collision_sounds: Vec<SourceId>,
}

impl Default for AntispamConfig {
    fn default() -> Self {
        Self {
            global_enabled: false,
            global: QueueLimits::default(),
            default: QueueLimits::default(),
            categories: CategoryLimits::default(),
            sound_multiplier: default_sound_multiplier(),
            sound_preload_multiplier: default_sound_preload_multiplier(),
            newline_threshold: default_newline_threshold(),
            collision_sounds: Vec::new(),
        }
    }
}

impl AntispamConfig {
    /// Effective limits for a category: its override, or the default scaled
    /// by the category multiplier.
    pub fn limits_for(&self, category: Category) -> QueueLimits {
        if let Some(limits) = self.categories.get(category) {
            return limits;
        }
        let multiplier = match category {
            Category::Sound => self.sound_multiplier,
            Category::SoundPreload => self.sound_preload_multiplier,
            _ => 1,
        };
        QueueLimits {
            threshold: self.default.threshold.saturating_mul(multiplier),
            window_secs: self.default.window_secs,
        }
    }

    /// Log settings that are accepted but probably unintended.
    pub fn warn_degenerate(&self) {
        let check = |name: &str, limits: QueueLimits| {
            if limits.threshold == 0 {
                tracing::warn!(queue = name, "threshold is 0; every event from a source will be blocked");
            }
            if limits.window_secs == 0 {
                tracing::warn!(queue = name, "window is 0; counters reset on every event");
            }
        };
        check("global", self.global);
        for category in Category::ALL {
            check(category.as_str(), self.limits_for(category));
        }
        if self.newline_threshold == 0 {
            tracing::warn!("[antispam].newline_threshold is 0; any line break counts as a flood");
        }
    }
}

fn default_threshold() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    1
}

fn default_sound_multiplier() -> u32 {
    10
}

fn default_sound_preload_multiplier() -> u32 {
    4
}

fn default_newline_threshold() -> usize {
    DEFAULT_NEWLINE_THRESHOLD
}

/// Background maintenance configuration (`[maintenance]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MaintenanceConfig {
    /// Seconds between purge sweeps (default: 300).
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
    /// Seconds an object notification may wait for names (default: 60).
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,
    /// Capacity of the event channel feeding the anti-spam actor (default: 1024).
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl MaintenanceConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            purge_interval_secs: default_purge_interval(),
            pending_ttl_secs: default_pending_ttl(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

fn default_purge_interval() -> u64 {
    300
}

fn default_pending_ttl() -> u64 {
    60
}

fn default_event_queue_capacity() -> usize {
    1024
}
