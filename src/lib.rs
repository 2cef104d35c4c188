//! spamgate - client-side anti-spam gate for virtual-world viewers.
//!
//! Counts inbound events per sender and category, blocks senders that
//! exceed their limits, and tells the user once per block who was blocked.

pub mod actor;
pub mod antispam;
pub mod config;
pub mod error;
pub mod metrics;
pub mod name_cache;
pub mod replay;

pub use actor::{AntispamActor, AntispamEvent, AntispamHandle};
pub use antispam::{AntispamRegistry, Category, Collaborators, SourceId, SourceKind};
pub use config::Config;
