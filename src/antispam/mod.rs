//! Client-side anti-spam engine.
//!
//! Throttles unwanted inbound events (chat, IMs, inventory offers, sounds,
//! script dialogs, calling cards, teleport offers) per sending agent or
//! object.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      AntispamRegistry                        │
//! ├────────────────────┬─────────────┬───────────────────────────┤
//! │ 8 × SpamQueue      │ Global      │ NotificationPipeline      │
//! │ (category, source) │ SpamQueue   │ (objectId, requestId)     │
//! │ fixed window       │ per source  │ properties → owner name   │
//! └────────────────────┴─────────────┴───────────────────────────┘
//! ```
//!
//! - [`entry`]: one counter with a sticky block flag
//! - [`queue`]: counters for one category and the three-way check outcome
//! - [`registry`]: both layers, maintenance, collision sounds, object metadata
//! - [`notify`]: block notices and the asynchronous object-name pipeline
//! - [`clock`]: injectable time source

pub mod category;
pub mod clock;
pub mod entry;
pub mod notify;
pub mod queue;
pub mod registry;

pub use category::{Category, SourceId, SourceKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::QueueEntry;
pub use notify::{
    BLOCKED_NOTIFICATION_ID, BlockContext, BlockLayer, BlockNotice, NameCache, NameResolution,
    NotificationPipeline, Notifier, ObjectMetadata, ObjectQuery, PendingNotification, PendingState,
    RequestId,
};
pub use queue::{CheckOutcome, SpamQueue};
pub use registry::{AntispamRegistry, Collaborators, DEFAULT_NEWLINE_THRESHOLD, RegistryStats};
