//! Pulse Engine
//!
//! Runs one instance of a plugin template: fans out over its targets, executes
//! the HTTP call or step chain for each, and publishes the results.
//!
//! # Architecture
//!
//! ```text
//! Engine::run_instance(instance, template, cancel)
//! ├── one task per target (task i waits 50ms × i)
//! │   ├── merge_inputs: template defaults → instance inputs → target overrides
//! │   ├── run_step (sequential for chains)
//! │   │   ├── resolve url/body → cache key
//! │   │   ├── ResponseCache::get_fresh, or
//! │   │   └── ResponseCache::fetch (coalesced, detached from caller cancellation)
//! │   │       then extract → apply_transforms (always, even on cache hits)
//! │   └── publish_outputs | publish_failure ("Err")
//! └── RunReport
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = Engine::new(http, registry, app_config)
//!   .with_notifier(Arc::new(ChannelNotifier::new(tx)));
//!
//! let report = engine.run_instance(&instance, &template, &cancel).await;
//! ```

mod cache;
mod context;
mod engine;
mod error;
mod events;
mod publish;
mod step;

pub use cache::ResponseCache;
pub use context::merge_inputs;
pub use engine::{Engine, EngineConfig, RunReport};
pub use error::EngineError;
pub use events::{ChannelNotifier, EngineEvent, EventNotifier, NoopNotifier};
pub use publish::{
  EMPTY_VALUE, ERROR_VALUE, PLACEHOLDER_VALUE, ensure_monitor_item, output_labels,
};
