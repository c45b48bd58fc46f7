//! Pulse Config
//!
//! The persisted side of Pulse: plugin instances (a template bound to concrete
//! input values), their targets, and the dashboard entries that describe each
//! published value.
//!
//! Persistence is abstracted behind [`ConfigStore`]. Running components share
//! one [`AppConfig`] through a [`SharedConfig`] lock; label updates made while
//! jobs run stay in memory until the host decides to save.
//!
//! Keys published to the registry follow two formats:
//! - dashboard values: `DASH.<instanceId>[.<targetIndex>].<outputKey>`
//! - raw text results: `<instanceId>[.<targetIndex>]`

mod error;
mod instance;
mod keys;
mod monitor;
mod store;

pub use error::ConfigError;
pub use instance::{Instance, Target, TargetSlot};
pub use keys::{DASHBOARD_PREFIX, dashboard_key, target_suffix};
pub use monitor::MonitorItem;
pub use store::{AppConfig, ConfigStore, JsonConfigStore, SharedConfig, shared};
