use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pulse_config::{AppConfig, ConfigStore, JsonConfigStore, SharedConfig, shared};
use pulse_engine::{ChannelNotifier, Engine, EngineConfig, EngineEvent};
use pulse_host_http::ReqwestClient;
use pulse_host_kv::{InMemoryRegistry, Registry};
use pulse_scheduler::Scheduler;
use pulse_template::TemplateLoader;

/// Pulse - polls HTTP APIs described by plugin templates and publishes the results
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.pulse)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Template directory (default: <data-dir>/templates)
  #[arg(long, global = true)]
  templates: Option<PathBuf>,

  /// Configuration file (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log filter, e.g. "debug" or "pulse_engine=trace" (overrides RUST_LOG)
  #[arg(long, global = true)]
  log_level: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run every enabled instance on its schedule until Ctrl-C
  Run {
    /// Seconds between checks of the configuration file for changes
    #[arg(long, default_value_t = 2)]
    watch_secs: u64,
  },

  /// Run every enabled instance once and print the published values as JSON
  Once,

  /// List the templates in the template directory
  Templates,
}

struct Paths {
  templates: PathBuf,
  config: PathBuf,
}

impl Paths {
  fn from_cli(cli: &Cli) -> Result<Self> {
    let data_dir = match &cli.data_dir {
      Some(dir) => dir.clone(),
      None => dirs::home_dir()
        .context("could not determine home directory")?
        .join(".pulse"),
    };

    Ok(Self {
      templates: cli
        .templates
        .clone()
        .unwrap_or_else(|| data_dir.join("templates")),
      config: cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("config.json")),
    })
  }
}

/// The wired-up runtime shared by the subcommands.
struct App {
  scheduler: Arc<Scheduler>,
  registry: Arc<InMemoryRegistry>,
  config: SharedConfig,
  events: mpsc::UnboundedReceiver<EngineEvent>,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.log_level.as_deref());

  let paths = Paths::from_cli(&cli)?;

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Run { watch_secs }) => rt.block_on(run(paths, watch_secs)),
    Some(Commands::Once) => rt.block_on(once(paths)),
    Some(Commands::Templates) => rt.block_on(list_templates(paths)),
    None => {
      println!("pulse - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(level: Option<&str>) {
  let filter = match level {
    Some(level) => EnvFilter::new(level),
    None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn build_app(config: AppConfig) -> Result<App> {
  let engine_config = EngineConfig::default();
  let http =
    ReqwestClient::new(engine_config.request_timeout).context("failed to create http client")?;
  let registry = Arc::new(InMemoryRegistry::new());
  let config = shared(config);
  let (tx, events) = mpsc::unbounded_channel();

  let engine = Engine::new(Arc::new(http), registry.clone(), config.clone())
    .with_config(engine_config)
    .with_notifier(Arc::new(ChannelNotifier::new(tx)));

  Ok(App {
    scheduler: Arc::new(Scheduler::new(engine)),
    registry,
    config,
    events,
  })
}

async fn run(paths: Paths, watch_secs: u64) -> Result<()> {
  let store = JsonConfigStore::new(&paths.config);
  let initial = store
    .load()
    .await
    .with_context(|| format!("failed to load configuration: {}", paths.config.display()))?;

  let App {
    scheduler,
    config,
    mut events,
    ..
  } = build_app(initial)?;

  scheduler
    .load_templates(&paths.templates)
    .await
    .context("failed to load templates")?;

  // Persist instances created for new templates.
  let mut on_disk = config.read().await.clone();
  store
    .save(&on_disk)
    .await
    .context("failed to save configuration")?;

  scheduler.reconcile().await;

  tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      match &event {
        EngineEvent::TargetFailed {
          instance_id,
          target_index,
          error,
        } => warn!(instance = %instance_id, target = ?target_index, %error, "target failed"),
        other => debug!(event = ?other, "engine event"),
      }
    }
  });

  let mut ticker = tokio::time::interval(Duration::from_secs(watch_secs.max(1)));
  ticker.tick().await;

  info!(config = %paths.config.display(), "running, press Ctrl-C to stop");
  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      _ = ticker.tick() => {
        match reload_if_changed(&store, &config, &on_disk).await {
          Ok(Some(fresh)) => {
            on_disk = fresh;
            scheduler.reconcile().await;
          }
          Ok(None) => {}
          Err(e) => warn!(error = %e, "failed to reload configuration"),
        }
      }
    }
  }

  info!("shutting down");
  scheduler.stop_all().await;
  scheduler.engine().shutdown();

  let config = config.read().await;
  store
    .save(&config)
    .await
    .context("failed to save configuration")?;
  Ok(())
}

/// Apply the configuration file to the live configuration if it changed on
/// disk since `last`. Returns the new file contents when applied.
///
/// Live dashboard labels are kept; user label overrides from the file win.
async fn reload_if_changed(
  store: &JsonConfigStore,
  config: &SharedConfig,
  last: &AppConfig,
) -> Result<Option<AppConfig>> {
  let fresh = store.load().await?;
  if &fresh == last {
    return Ok(None);
  }

  info!(path = %store.path().display(), "configuration changed on disk");
  let mut live = config.write().await;
  live.instances = fresh.instances.clone();
  live.extra = fresh.extra.clone();
  for item in &fresh.monitor_items {
    if let Some(live_item) = live.monitor_item_mut(&item.key) {
      live_item.user_label.clone_from(&item.user_label);
      live_item.user_short_label.clone_from(&item.user_short_label);
    }
  }

  Ok(Some(fresh))
}

async fn once(paths: Paths) -> Result<()> {
  let config = JsonConfigStore::new(&paths.config)
    .load()
    .await
    .with_context(|| format!("failed to load configuration: {}", paths.config.display()))?;

  let app = build_app(config)?;
  app
    .scheduler
    .load_templates(&paths.templates)
    .await
    .context("failed to load templates")?;

  let reports = app.scheduler.run_once().await;
  for (instance, report) in &reports {
    eprintln!(
      "{}: {} ok, {} failed, {} cancelled",
      instance, report.succeeded, report.failed, report.cancelled
    );
  }
  println!("{}", serde_json::to_string_pretty(&app.registry.snapshot())?);
  Ok(())
}

async fn list_templates(paths: Paths) -> Result<()> {
  let templates = TemplateLoader::new(&paths.templates)
    .load_all()
    .await
    .with_context(|| format!("failed to read templates: {}", paths.templates.display()))?;

  if templates.is_empty() {
    eprintln!("no templates in {}", paths.templates.display());
    return Ok(());
  }

  for template in templates {
    println!(
      "{}\t{}\t{:?}\t{}ms",
      template.id,
      template.name(),
      template.execution.kind,
      template.interval_ms()
    );
  }
  Ok(())
}
