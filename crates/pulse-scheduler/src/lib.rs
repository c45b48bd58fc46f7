//! Pulse Scheduler
//!
//! Turns configuration into running jobs:
//!
//! - [`Scheduler::load_templates`] reads the template directory and creates an
//!   instance for every template nobody uses yet.
//! - [`Scheduler::reconcile`] starts, restarts and stops per-instance jobs so
//!   they match the enabled instances, leaving unchanged ones alone.
//! - Each job runs its instance immediately and then on a non-reentrant timer
//!   (see [`JobState`]).
//! - [`sync_dashboard_entries`] keeps one dashboard entry per target × output.

mod dashboard;
mod error;
mod hash;
mod job;
mod scheduler;

pub use dashboard::{prune_orphaned_entries, sync_dashboard_entries};
pub use error::SchedulerError;
pub use hash::config_hash;
pub use job::JobState;
pub use scheduler::{MIN_INTERVAL_MS, ReconcileReport, Scheduler, job_interval};
