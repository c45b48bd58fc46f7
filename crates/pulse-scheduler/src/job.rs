//! Periodic per-instance jobs.
//!
//! Each job is a non-reentrant timer modelled as a state machine:
//!
//! ```text
//!   Idle ──fire──▶ Running ──run done──▶ Idle (re-arm)
//!    │                │
//!    └─────stop───────┴──────stop──────▶ Stopped
//! ```
//!
//! Re-arming only happens on `Running → Idle`, so two runs of one instance
//! never overlap no matter how long a run takes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pulse_config::Instance;
use pulse_engine::Engine;
use pulse_template::Template;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
  /// Waiting for the next tick.
  Idle,
  /// A run is in progress.
  Running,
  /// Terminal.
  Stopped,
}

impl JobState {
  /// The state after moving to `next`, if the machine allows it.
  pub fn transition(self, next: JobState) -> Result<JobState, SchedulerError> {
    match (self, next) {
      (JobState::Idle, JobState::Running)
      | (JobState::Running, JobState::Idle)
      | (JobState::Idle, JobState::Stopped)
      | (JobState::Running, JobState::Stopped)
      | (JobState::Stopped, JobState::Stopped) => Ok(next),
      (from, to) => Err(SchedulerError::InvalidTransition { from, to }),
    }
  }
}

/// Job state shared between the scheduler and the job's timer task.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<Mutex<JobState>>);

impl SharedState {
  fn new() -> Self {
    Self(Arc::new(Mutex::new(JobState::Idle)))
  }

  pub(crate) fn get(&self) -> JobState {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn advance(&self, next: JobState) -> Result<JobState, SchedulerError> {
    let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    *state = state.transition(next)?;
    Ok(*state)
  }
}

/// A running instance job.
pub(crate) struct Job {
  /// Configuration hash the job was started with.
  pub(crate) hash: Option<String>,
  pub(crate) state: SharedState,
  cancel: CancellationToken,
  handle: JoinHandle<()>,
}

impl Job {
  /// Spawn the timer task: one run immediately, then one per `interval`.
  pub(crate) fn spawn(
    engine: Engine,
    instance: Instance,
    template: Arc<Template>,
    interval: Duration,
    cancel: CancellationToken,
    hash: Option<String>,
  ) -> Self {
    let state = SharedState::new();
    let handle = tokio::spawn(run_loop(
      engine,
      instance,
      template,
      interval,
      cancel.clone(),
      state.clone(),
    ));

    Self {
      hash,
      state,
      cancel,
      handle,
    }
  }

  /// Cancel the current run and the timer. In-flight fetches are left to
  /// finish in the background.
  pub(crate) fn stop(self) {
    // Stopped is reachable from every state
    let _ = self.state.advance(JobState::Stopped);
    self.cancel.cancel();
    self.handle.abort();
  }
}

async fn run_loop(
  engine: Engine,
  instance: Instance,
  template: Arc<Template>,
  interval: Duration,
  cancel: CancellationToken,
  state: SharedState,
) {
  info!(
    instance = %instance.id,
    template = %template.id,
    interval_ms = interval.as_millis() as u64,
    "job started"
  );

  loop {
    if state.advance(JobState::Running).is_err() {
      break;
    }

    let report = engine.run_instance(&instance, &template, &cancel).await;
    debug!(instance = %instance.id, ?report, "tick finished");

    if state.advance(JobState::Idle).is_err() {
      debug!(instance = %instance.id, "job stopped during run, not re-arming");
      break;
    }

    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = tokio::time::sleep(interval) => {}
    }
  }

  debug!(instance = %instance.id, "job loop exited");
}
