//! The instance scheduler: owns loaded templates and live jobs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pulse_config::{AppConfig, Instance};
use pulse_engine::{Engine, RunReport};
use pulse_template::{Template, TemplateLoader};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dashboard::{prune_orphaned_entries, sync_dashboard_entries};
use crate::error::SchedulerError;
use crate::hash::config_hash;
use crate::job::{Job, JobState};

/// Lower bound on any job interval, in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 1_000;

/// Length of the random suffix that disambiguates synthesized instance ids.
const ID_SUFFIX_LEN: usize = 6;

/// What one `reconcile` call did.
///
/// A restarted job counts as `started`. `stopped` counts jobs stopped without
/// a replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
  pub started: usize,
  pub stopped: usize,
  pub unchanged: usize,
  /// Enabled instances whose template is not loaded.
  pub skipped: usize,
}

impl ReconcileReport {
  /// Whether any job was started or stopped.
  pub fn has_changes(&self) -> bool {
    self.started > 0 || self.stopped > 0
  }
}

/// Keeps one periodic job per enabled instance in line with configuration.
///
/// Construct once and share behind an `Arc`.
pub struct Scheduler {
  engine: Engine,
  templates: RwLock<HashMap<String, Arc<Template>>>,
  jobs: Mutex<HashMap<String, Job>>,
  root: CancellationToken,
}

impl Scheduler {
  pub fn new(engine: Engine) -> Self {
    Self {
      engine,
      templates: RwLock::new(HashMap::new()),
      jobs: Mutex::new(HashMap::new()),
      root: CancellationToken::new(),
    }
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  /// Load every template in `dir`, replacing the loaded set, and synthesize
  /// an instance for each template no instance uses yet.
  ///
  /// Returns the number of templates loaded.
  pub async fn load_templates(&self, dir: &Path) -> Result<usize, SchedulerError> {
    let loaded = TemplateLoader::new(dir).load_all().await?;
    let count = loaded.len();

    let templates: Vec<Arc<Template>> = loaded.into_iter().map(Arc::new).collect();
    {
      let mut config = self.engine.app_config().write().await;
      for template in &templates {
        if let Some(instance) = synthesize_instance(&config, template) {
          info!(instance = %instance.id, template = %template.id, "created instance for new template");
          config.instances.push(instance);
        }
      }
    }

    *self.templates.write().await = templates
      .into_iter()
      .map(|t| (t.id.clone(), t))
      .collect();

    info!(count, dir = %dir.display(), "templates loaded");
    Ok(count)
  }

  /// Register a single template, replacing one with the same id.
  pub async fn add_template(&self, template: Template) {
    self
      .templates
      .write()
      .await
      .insert(template.id.clone(), Arc::new(template));
  }

  /// Loaded templates, sorted by id.
  pub async fn templates(&self) -> Vec<Arc<Template>> {
    let mut templates: Vec<_> = self.templates.read().await.values().cloned().collect();
    templates.sort_by(|a, b| a.id.cmp(&b.id));
    templates
  }

  /// Bring running jobs in line with the enabled instances in configuration.
  ///
  /// Jobs whose configuration hash is unchanged keep running untouched, so
  /// calling this after an unrelated settings change costs nothing. Dashboard
  /// entries are synchronized for every enabled instance before any job
  /// starts.
  pub async fn reconcile(&self) -> ReconcileReport {
    let templates = self.templates.read().await.clone();
    let mut report = ReconcileReport::default();

    // Plan under the config lock, act after releasing it.
    let planned: Vec<(Instance, Option<Arc<Template>>)> = {
      let mut config = self.engine.app_config().write().await;
      let enabled: Vec<Instance> = config.enabled_instances().cloned().collect();

      for instance in &enabled {
        if let Some(template) = templates.get(&instance.template_id) {
          sync_dashboard_entries(
            &mut config,
            self.engine.registry().as_ref(),
            instance,
            template,
          );
        }
      }

      let pruned = prune_orphaned_entries(&mut config);
      if pruned > 0 {
        debug!(pruned, "pruned dashboard entries of removed instances");
      }

      enabled
        .into_iter()
        .map(|instance| {
          let template = templates.get(&instance.template_id).cloned();
          (instance, template)
        })
        .collect()
    };

    let mut jobs = self.jobs.lock().await;

    let enabled_ids: HashSet<&str> = planned.iter().map(|(i, _)| i.id.as_str()).collect();
    let orphaned: Vec<String> = jobs
      .keys()
      .filter(|id| !enabled_ids.contains(id.as_str()))
      .cloned()
      .collect();
    for id in orphaned {
      if let Some(job) = jobs.remove(&id) {
        info!(instance = %id, "stopping job of removed or disabled instance");
        job.stop();
        report.stopped += 1;
      }
    }

    for (instance, template) in planned {
      let Some(template) = template else {
        warn!(
          instance = %instance.id,
          template = %instance.template_id,
          "template not loaded, instance skipped"
        );
        if let Some(job) = jobs.remove(&instance.id) {
          job.stop();
          report.stopped += 1;
        }
        report.skipped += 1;
        continue;
      };

      let hash = config_hash(&instance);
      if let Some(job) = jobs.get(&instance.id)
        && hash.is_some()
        && job.hash == hash
      {
        report.unchanged += 1;
        continue;
      }

      if let Some(job) = jobs.remove(&instance.id) {
        debug!(instance = %instance.id, "configuration changed, restarting job");
        job.stop();
      }

      let id = instance.id.clone();
      jobs.insert(id, self.spawn_job(instance, template, hash));
      report.started += 1;
    }

    info!(
      started = report.started,
      stopped = report.stopped,
      unchanged = report.unchanged,
      skipped = report.skipped,
      "reconciled"
    );
    report
  }

  /// Start (or restart) the job of one instance.
  ///
  /// Runs the instance immediately, then every
  /// `max(1000ms, custom_interval or template interval)`.
  pub async fn start(&self, instance: Instance, template: Arc<Template>) {
    let mut jobs = self.jobs.lock().await;
    if let Some(job) = jobs.remove(&instance.id) {
      job.stop();
    }

    let hash = config_hash(&instance);
    let id = instance.id.clone();
    jobs.insert(id, self.spawn_job(instance, template, hash));
  }

  /// Stop the job of one instance. Returns whether a job was running.
  pub async fn stop(&self, instance_id: &str) -> bool {
    match self.jobs.lock().await.remove(instance_id) {
      Some(job) => {
        info!(instance = %instance_id, "job stopped");
        job.stop();
        true
      }
      None => false,
    }
  }

  pub async fn stop_all(&self) {
    let mut jobs = self.jobs.lock().await;
    let count = jobs.len();
    for (_, job) in jobs.drain() {
      job.stop();
    }
    if count > 0 {
      info!(count, "all jobs stopped");
    }
  }

  /// Ids of instances with a live job, sorted.
  pub async fn running_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
    ids.sort();
    ids
  }

  pub async fn job_state(&self, instance_id: &str) -> Option<JobState> {
    self
      .jobs
      .lock()
      .await
      .get(instance_id)
      .map(|job| job.state.get())
  }

  /// Run every enabled instance once, without starting jobs.
  pub async fn run_once(&self) -> BTreeMap<String, RunReport> {
    let templates = self.templates.read().await.clone();
    let planned: Vec<(Instance, Arc<Template>)> = {
      let mut config = self.engine.app_config().write().await;
      let enabled: Vec<Instance> = config.enabled_instances().cloned().collect();
      enabled
        .into_iter()
        .filter_map(|instance| {
          let Some(template) = templates.get(&instance.template_id).cloned() else {
            let err = SchedulerError::TemplateNotLoaded {
              instance_id: instance.id.clone(),
              template_id: instance.template_id.clone(),
            };
            warn!(error = %err, "instance skipped");
            return None;
          };
          sync_dashboard_entries(
            &mut config,
            self.engine.registry().as_ref(),
            &instance,
            &template,
          );
          Some((instance, template))
        })
        .collect()
    };

    let cancel = self.root.child_token();
    let mut reports = BTreeMap::new();
    for (instance, template) in planned {
      let report = self.engine.run_instance(&instance, &template, &cancel).await;
      reports.insert(instance.id, report);
    }
    reports
  }

  fn spawn_job(&self, instance: Instance, template: Arc<Template>, hash: Option<String>) -> Job {
    let interval = job_interval(&instance, &template);
    Job::spawn(
      self.engine.clone(),
      instance,
      template,
      interval,
      self.root.child_token(),
      hash,
    )
  }
}

/// Effective tick interval of an instance.
pub fn job_interval(instance: &Instance, template: &Template) -> Duration {
  let requested = instance
    .interval_override()
    .unwrap_or_else(|| template.interval_ms());
  if requested < MIN_INTERVAL_MS {
    warn!(
      instance = %instance.id,
      requested_ms = requested,
      "interval below minimum, clamped"
    );
  }
  Duration::from_millis(requested.max(MIN_INTERVAL_MS))
}

/// A fresh instance for `template`, unless one already uses it.
fn synthesize_instance(config: &AppConfig, template: &Template) -> Option<Instance> {
  if config.instances.iter().any(|i| i.template_id == template.id) {
    return None;
  }

  let mut id = template.id.clone();
  while config.instance(&id).is_some() {
    let suffix = Uuid::new_v4().simple().to_string();
    id = format!("{}_{}", template.id, &suffix[..ID_SUFFIX_LEN]);
  }

  Some(Instance::new(id, &template.id, template.default_inputs()))
}
