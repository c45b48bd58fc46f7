//! Integration tests for Scheduler reconciliation and job timing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pulse_config::{AppConfig, Instance, SharedConfig, shared};
use pulse_engine::{Engine, PLACEHOLDER_VALUE};
use pulse_host_http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use pulse_host_kv::{InMemoryRegistry, Registry};
use pulse_scheduler::{JobState, ReconcileReport, Scheduler};
use pulse_template::Template;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Answers every request with the same body after a delay, tracking how many
/// requests overlap.
struct SlowHttp {
  delay: Duration,
  calls: AtomicUsize,
  active: AtomicUsize,
  max_active: AtomicUsize,
}

impl SlowHttp {
  fn new(delay: Duration) -> Self {
    Self {
      delay,
      calls: AtomicUsize::new(0),
      active: AtomicUsize::new(0),
      max_active: AtomicUsize::new(0),
    }
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl HttpClient for SlowHttp {
  async fn send(
    &self,
    _request: HttpRequest,
    cancel: CancellationToken,
  ) -> Result<HttpResponse, HttpError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active.fetch_max(active, Ordering::SeqCst);

    let result = tokio::select! {
      _ = cancel.cancelled() => Err(HttpError::Cancelled),
      _ = tokio::time::sleep(self.delay) => Ok(HttpResponse {
        status: 200,
        body: Bytes::from_static(br#"{"temp":21}"#),
      }),
    };

    self.active.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

struct Harness {
  scheduler: Scheduler,
  http: Arc<SlowHttp>,
  registry: Arc<InMemoryRegistry>,
  config: SharedConfig,
}

impl Harness {
  async fn new(delay: Duration, instances: Vec<Instance>) -> Self {
    let http = Arc::new(SlowHttp::new(delay));
    let registry = Arc::new(InMemoryRegistry::new());
    let config = shared(AppConfig {
      instances,
      ..Default::default()
    });

    let scheduler = Scheduler::new(Engine::new(http.clone(), registry.clone(), config.clone()));
    scheduler.add_template(weather_template()).await;

    Self {
      scheduler,
      http,
      registry,
      config,
    }
  }
}

fn weather_template() -> Template {
  serde_json::from_value(json!({
    "id": "weather",
    "inputs": [{ "key": "city", "default": "Oslo" }],
    "execution": {
      "type": "api_json",
      "interval": 1000,
      "url": "https://wx.test/{{city}}",
      "extract": { "temp": "temp" }
    },
    "outputs": [{ "key": "temp", "label": "{{city}}", "format": "{{temp}}" }]
  }))
  .unwrap()
}

fn weather(id: &str, city: &str) -> Instance {
  serde_json::from_value(json!({
    "id": id,
    "template_id": "weather",
    "inputs": { "city": city }
  }))
  .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_is_idempotent() {
  let h = Harness::new(
    Duration::from_millis(10),
    vec![weather("wx1", "Oslo"), weather("wx2", "Rome")],
  )
  .await;

  let first = h.scheduler.reconcile().await;
  assert_eq!(
    first,
    ReconcileReport {
      started: 2,
      ..Default::default()
    }
  );

  let second = h.scheduler.reconcile().await;
  assert_eq!(
    second,
    ReconcileReport {
      unchanged: 2,
      ..Default::default()
    }
  );
  assert!(!second.has_changes());
  assert_eq!(h.scheduler.running_ids().await, vec!["wx1", "wx2"]);

  h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_changed_instance_is_restarted_alone() {
  let h = Harness::new(
    Duration::from_millis(10),
    vec![weather("wx1", "Oslo"), weather("wx2", "Rome")],
  )
  .await;
  h.scheduler.reconcile().await;

  h.config
    .write()
    .await
    .instance_mut("wx2")
    .unwrap()
    .inputs
    .insert("city".to_string(), "Milan".to_string());
  let report = h.scheduler.reconcile().await;

  assert_eq!(report.started, 1);
  assert_eq!(report.unchanged, 1);
  assert_eq!(report.stopped, 0);

  h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_and_removed_instances_stop() {
  let h = Harness::new(
    Duration::from_millis(10),
    vec![weather("wx1", "Oslo"), weather("wx2", "Rome")],
  )
  .await;
  h.scheduler.reconcile().await;
  tokio::time::sleep(Duration::from_millis(100)).await;

  {
    let mut config = h.config.write().await;
    config.instance_mut("wx1").unwrap().enabled = false;
    config.instances.retain(|i| i.id != "wx2");
  }
  let report = h.scheduler.reconcile().await;

  assert_eq!(report.stopped, 2);
  assert!(h.scheduler.running_ids().await.is_empty());

  let config = h.config.read().await;
  assert!(config.monitor_item("DASH.wx2.temp").is_none());
  assert!(config.monitor_item("DASH.wx1.temp").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_instance_without_template_is_skipped() {
  let mut orphan = weather("st1", "");
  orphan.template_id = "stocks".to_string();
  let h = Harness::new(Duration::from_millis(10), vec![orphan]).await;

  let report = h.scheduler.reconcile().await;

  assert_eq!(report.skipped, 1);
  assert!(h.scheduler.running_ids().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_creates_dashboard_placeholders() {
  let h = Harness::new(Duration::from_secs(3), vec![weather("wx1", "Oslo")]).await;

  h.scheduler.reconcile().await;

  assert_eq!(
    h.registry.get_value("DASH.wx1.temp").as_deref(),
    Some(PLACEHOLDER_VALUE)
  );
  assert_eq!(
    h.config.read().await.monitor_item("DASH.wx1.temp").unwrap().label,
    "Oslo"
  );

  tokio::time::sleep(Duration::from_secs(4)).await;
  assert_eq!(h.registry.get_value("DASH.wx1.temp").as_deref(), Some("21"));

  h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_runs_never_overlap() {
  let h = Harness::new(Duration::from_secs(3), vec![weather("wx1", "Oslo")]).await;

  h.scheduler.reconcile().await;
  // Runs start at 0s, 4s and 8s: 3s of work plus the 1s interval.
  tokio::time::sleep(Duration::from_secs(10)).await;

  assert_eq!(h.http.calls(), 3);
  assert_eq!(h.http.max_active.load(Ordering::SeqCst), 1);
  assert_eq!(h.scheduler.job_state("wx1").await, Some(JobState::Running));

  h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_rearm() {
  let h = Harness::new(Duration::from_secs(3), vec![weather("wx1", "Oslo")]).await;

  h.scheduler.reconcile().await;
  tokio::time::sleep(Duration::from_secs(1)).await;

  assert!(h.scheduler.stop("wx1").await);
  assert!(!h.scheduler.stop("wx1").await);
  assert_eq!(h.scheduler.job_state("wx1").await, None);

  tokio::time::sleep(Duration::from_secs(20)).await;
  assert_eq!(h.http.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_immediately_then_rearms() {
  let wx1 = weather("wx1", "Oslo");
  let h = Harness::new(Duration::from_millis(10), vec![wx1.clone()]).await;

  h.scheduler
    .start(wx1.clone(), Arc::new(weather_template()))
    .await;
  tokio::time::sleep(Duration::from_millis(50)).await;

  assert_eq!(h.http.calls(), 1);
  assert_eq!(h.registry.get_value("DASH.wx1.temp").as_deref(), Some("21"));
  assert_eq!(h.scheduler.running_ids().await, vec!["wx1"]);

  tokio::time::sleep(Duration::from_millis(1_000)).await;
  assert_eq!(h.http.calls(), 2);

  // Starting again replaces the job and runs at once.
  h.scheduler.start(wx1, Arc::new(weather_template())).await;
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert_eq!(h.http.calls(), 3);
  assert_eq!(h.scheduler.running_ids().await.len(), 1);

  h.scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_custom_interval_overrides_template() {
  let mut wx1 = weather("wx1", "Oslo");
  wx1.custom_interval = Some(5_000);
  let h = Harness::new(Duration::from_millis(10), vec![wx1]).await;

  h.scheduler.reconcile().await;
  tokio::time::sleep(Duration::from_millis(5_500)).await;

  assert_eq!(h.http.calls(), 2);
  h.scheduler.stop_all().await;
}

#[tokio::test]
async fn test_load_templates_synthesizes_instances() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(
    dir.path().join("weather.json"),
    serde_json::to_string(&weather_template()).unwrap(),
  )
  .unwrap();
  std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

  let h = Harness::new(Duration::from_millis(10), Vec::new()).await;
  let loaded = h.scheduler.load_templates(dir.path()).await.unwrap();

  assert_eq!(loaded, 1);
  {
    let config = h.config.read().await;
    assert_eq!(config.instances.len(), 1);
    let instance = &config.instances[0];
    assert_eq!(instance.id, "weather");
    assert_eq!(instance.inputs["city"], "Oslo");
  }

  // A second load does not duplicate the instance.
  h.scheduler.load_templates(dir.path()).await.unwrap();
  assert_eq!(h.config.read().await.instances.len(), 1);
}

#[tokio::test]
async fn test_run_once_reports_per_instance() {
  let h = Harness::new(
    Duration::from_millis(1),
    vec![weather("wx1", "Oslo"), weather("wx2", "Rome")],
  )
  .await;

  let reports = h.scheduler.run_once().await;

  assert_eq!(reports.len(), 2);
  assert!(reports.values().all(|r| r.succeeded == 1));
  assert_eq!(h.registry.get_value("DASH.wx2.temp").as_deref(), Some("21"));
  assert!(h.scheduler.running_ids().await.is_empty());
}
