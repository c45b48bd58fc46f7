//! Instance execution: target fan-out, per-kind pipelines, publication.

use std::sync::Arc;
use std::time::Duration;

use pulse_config::{Instance, SharedConfig, TargetSlot, target_suffix};
use pulse_host_http::HttpClient;
use pulse_host_kv::Registry;
use pulse_resolver::Context;
use pulse_template::{ExecutionKind, Template};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::cache::ResponseCache;
use crate::context::merge_inputs;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventNotifier, NoopNotifier};

/// Tunables of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Delay between target starts: target `i` waits `i × target_stagger`.
  pub target_stagger: Duration,

  /// Upper bound on one HTTP request, including the body read.
  pub request_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      target_stagger: Duration::from_millis(50),
      request_timeout: Duration::from_secs(15),
    }
  }
}

/// Per-target outcome counts of one `run_instance` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
  pub succeeded: usize,
  pub failed: usize,
  pub cancelled: usize,
}

impl RunReport {
  pub fn total(&self) -> usize {
    self.succeeded + self.failed + self.cancelled
  }
}

/// What a finished target hands to publication.
enum TargetOutcome {
  /// Context to publish declared outputs from.
  Outputs(Context),
  /// Raw response body of an `api_text` execution, published as-is.
  RawText(String),
}

/// The plugin execution engine.
///
/// Cheap to clone: every field is shared. The response cache and in-flight
/// table are process-wide, so every clone coalesces with every other.
#[derive(Clone)]
pub struct Engine {
  http: Arc<dyn HttpClient>,
  registry: Arc<dyn Registry>,
  app_config: SharedConfig,
  cache: ResponseCache,
  notifier: Arc<dyn EventNotifier>,
  config: EngineConfig,
  shutdown: CancellationToken,
}

impl Engine {
  /// Create an engine with default tunables and no-op notifications.
  pub fn new(
    http: Arc<dyn HttpClient>,
    registry: Arc<dyn Registry>,
    app_config: SharedConfig,
  ) -> Self {
    Self {
      http,
      registry,
      app_config,
      cache: ResponseCache::new(),
      notifier: Arc::new(NoopNotifier),
      config: EngineConfig::default(),
      shutdown: CancellationToken::new(),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn http(&self) -> &Arc<dyn HttpClient> {
    &self.http
  }

  pub fn registry(&self) -> &Arc<dyn Registry> {
    &self.registry
  }

  pub fn app_config(&self) -> &SharedConfig {
    &self.app_config
  }

  pub fn cache(&self) -> &ResponseCache {
    &self.cache
  }

  pub fn notifier(&self) -> &Arc<dyn EventNotifier> {
    &self.notifier
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Parent token of every detached fetch.
  pub fn shutdown_token(&self) -> &CancellationToken {
    &self.shutdown
  }

  /// Abort every detached fetch. Used on process exit.
  pub fn shutdown(&self) {
    self.shutdown.cancel();
  }

  /// Run every target of `instance` once, concurrently.
  ///
  /// Target `i` starts after `i × target_stagger`. Cancelling `cancel` stops
  /// the targets (nothing is published for them) but not their in-flight
  /// fetches.
  pub async fn run_instance(
    &self,
    instance: &Instance,
    template: &Arc<Template>,
    cancel: &CancellationToken,
  ) -> RunReport {
    let instance = Arc::new(instance.clone());

    let handles: Vec<_> = instance
      .target_slots()
      .into_iter()
      .map(|slot| {
        let engine = self.clone();
        let instance = instance.clone();
        let template = template.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run_target(&instance, slot, &template, &cancel).await })
      })
      .collect();

    let mut report = RunReport::default();
    for result in futures::future::join_all(handles).await {
      match result {
        Ok(Ok(())) => report.succeeded += 1,
        Ok(Err(EngineError::Cancelled)) => report.cancelled += 1,
        Ok(Err(_)) => report.failed += 1,
        Err(e) => {
          error!(instance = %instance.id, error = %e, "target task panicked");
          report.failed += 1;
        }
      }
    }

    debug!(instance = %instance.id, ?report, "instance run finished");
    report
  }

  #[instrument(skip_all, fields(instance = %instance.id, target = ?slot.index))]
  async fn run_target(
    &self,
    instance: &Instance,
    slot: TargetSlot,
    template: &Template,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    let position = slot.position();
    if position > 0 {
      let delay = self.config.target_stagger * position as u32;
      tokio::select! {
        _ = cancel.cancelled() => {
          debug!("cancelled before start");
          return Err(EngineError::Cancelled);
        }
        _ = tokio::time::sleep(delay) => {}
      }
    }

    let result = match self.execute(instance, &slot, template, cancel).await {
      Ok(_) if cancel.is_cancelled() => Err(EngineError::Cancelled),
      other => other,
    };

    match result {
      Ok(outcome) => {
        match outcome {
          TargetOutcome::RawText(text) => {
            let key = format!("{}{}", instance.id, target_suffix(slot.index));
            self.registry.inject_value(&key, text);
          }
          TargetOutcome::Outputs(ctx) => {
            self
              .publish_outputs(&instance.id, slot.index, template, &ctx)
              .await;
          }
        }
        self.notifier.notify(EngineEvent::TargetCompleted {
          instance_id: instance.id.clone(),
          target_index: slot.index,
        });
        Ok(())
      }
      Err(EngineError::Cancelled) => {
        debug!("target run cancelled");
        Err(EngineError::Cancelled)
      }
      Err(e) => {
        warn!(error = %e, "target run failed");
        self.publish_failure(&instance.id, slot.index, template);
        self.notifier.notify(EngineEvent::TargetFailed {
          instance_id: instance.id.clone(),
          target_index: slot.index,
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }

  async fn execute(
    &self,
    instance: &Instance,
    slot: &TargetSlot,
    template: &Template,
    cancel: &CancellationToken,
  ) -> Result<TargetOutcome, EngineError> {
    let prefix = format!("{}{}", instance.id, target_suffix(slot.index));
    let mut ctx = merge_inputs(template, instance, &slot.overrides);
    let execution = &template.execution;

    if execution.kind == ExecutionKind::Chain {
      for step in &execution.steps {
        if cancel.is_cancelled() {
          return Err(EngineError::Cancelled);
        }
        ctx = self.run_step(&prefix, step, ctx, cancel).await?;
      }
      return Ok(TargetOutcome::Outputs(ctx));
    }

    let step = execution
      .single_step()
      .ok_or_else(|| EngineError::InvalidTemplate {
        template_id: template.id.clone(),
        message: "execution has no single request".to_string(),
      })?;

    if execution.kind == ExecutionKind::ApiText {
      let text = self.fetch_text(&prefix, &step, &ctx, cancel).await?;
      return Ok(TargetOutcome::RawText(text));
    }

    let ctx = self.run_step(&prefix, &step, ctx, cancel).await?;
    Ok(TargetOutcome::Outputs(ctx))
  }
}
