//! Error types for spamgate.
//!
//! The rate-limiting engine itself is total: every check, purge, and query
//! returns a plain value. Errors only exist at the edges where text is
//! turned into typed values (configuration, replay input).

use thiserror::Error;

// ============================================================================
// Parse Errors (identifiers and enums)
// ============================================================================

/// Failure to interpret a textual category, source kind, or id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown source kind: {0}")]
    UnknownSourceKind(String),

    #[error("invalid uuid {input:?}: {reason}")]
    InvalidId { input: String, reason: String },

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

impl ParseError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "unknown_category",
            Self::UnknownSourceKind(_) => "unknown_source_kind",
            Self::InvalidId { .. } => "invalid_id",
            Self::InvalidNumber(_) => "invalid_number",
        }
    }
}

/// Parse a UUID, mapping failures into [`ParseError::InvalidId`].
pub fn parse_id(input: &str) -> Result<uuid::Uuid, ParseError> {
    uuid::Uuid::parse_str(input).map_err(|e| ParseError::InvalidId {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// Replay Errors (stdin driver)
// ============================================================================

/// Errors produced while parsing a replay line.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("empty line")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}: missing argument <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ReplayError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingArgument { .. } => "missing_argument",
            Self::Parse(e) => e.error_code(),
        }
    }
}
