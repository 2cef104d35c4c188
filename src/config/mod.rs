//! Configuration loading and management.
//!
//! - [`types`]: top-level [`Config`] and loading
//! - [`antispam`]: queue limits, multipliers, flood and maintenance knobs

mod antispam;
mod types;

pub use antispam::{AntispamConfig, CategoryLimits, MaintenanceConfig, QueueLimits};
pub use types::{Config, ConfigError};
