//! Engine events and notifiers.
//!
//! Events are emitted while instances run so the host can observe failures and
//! react to label changes (e.g. refresh a settings view, schedule a save).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during instance execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
  /// A target finished and its outputs were published.
  TargetCompleted {
    instance_id: String,
    target_index: Option<usize>,
  },

  /// A target failed; its outputs now read `"Err"`.
  TargetFailed {
    instance_id: String,
    target_index: Option<usize>,
    error: String,
  },

  /// Dashboard labels of an instance changed in memory. Not persisted.
  SchemaChanged { instance_id: String },
}

/// Trait for receiving engine events.
pub trait EventNotifier: Send + Sync {
  /// Called when an event occurs.
  fn notify(&self, event: EngineEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: EngineEvent) {}
}

/// A notifier that sends events to an unbounded channel the host drains.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a pipeline task; volume is at
  // most a few events per target per tick.
  sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: EngineEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
