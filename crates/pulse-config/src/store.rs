use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ConfigError;
use crate::instance::Instance;
use crate::monitor::MonitorItem;

/// The configuration document Pulse reads and mutates.
///
/// Settings owned by other parts of the host application are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppConfig {
  pub instances: Vec<Instance>,

  pub monitor_items: Vec<MonitorItem>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

// Deserialized through a plain map rather than `#[serde(flatten)]`: flatten
// buffers the document, which cannot carry serde_json's exact numbers into
// typed fields such as `custom_interval`.
impl<'de> Deserialize<'de> for AppConfig {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut extra = Map::deserialize(deserializer)?;
    Ok(Self {
      instances: take_field(&mut extra, "instances").map_err(D::Error::custom)?,
      monitor_items: take_field(&mut extra, "monitor_items").map_err(D::Error::custom)?,
      extra,
    })
  }
}

fn take_field<T: DeserializeOwned + Default>(
  map: &mut Map<String, Value>,
  key: &str,
) -> Result<T, serde_json::Error> {
  match map.remove(key) {
    Some(value) => serde_json::from_value(value),
    None => Ok(T::default()),
  }
}

impl AppConfig {
  pub fn instance(&self, id: &str) -> Option<&Instance> {
    self.instances.iter().find(|i| i.id == id)
  }

  pub fn instance_mut(&mut self, id: &str) -> Option<&mut Instance> {
    self.instances.iter_mut().find(|i| i.id == id)
  }

  pub fn enabled_instances(&self) -> impl Iterator<Item = &Instance> {
    self.instances.iter().filter(|i| i.enabled)
  }

  pub fn monitor_item(&self, key: &str) -> Option<&MonitorItem> {
    self.monitor_items.iter().find(|m| m.key == key)
  }

  pub fn monitor_item_mut(&mut self, key: &str) -> Option<&mut MonitorItem> {
    self.monitor_items.iter_mut().find(|m| m.key == key)
  }
}

/// Shared, lock-protected configuration handle.
///
/// Any loop over `monitor_items` that also mutates them holds the write lock
/// for the whole loop, since UI consumers read the list concurrently.
pub type SharedConfig = Arc<RwLock<AppConfig>>;

/// Wrap a configuration for sharing between the scheduler and the engine.
pub fn shared(config: AppConfig) -> SharedConfig {
  Arc::new(RwLock::new(config))
}

/// Persistence for [`AppConfig`].
#[async_trait]
pub trait ConfigStore: Send + Sync {
  async fn load(&self) -> Result<AppConfig, ConfigError>;

  async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

/// Configuration stored as one pretty-printed JSON file.
pub struct JsonConfigStore {
  path: PathBuf,
}

impl JsonConfigStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn io_error(&self, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
      path: self.path.clone(),
      source,
    }
  }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
  /// Load the configuration. A missing file is an empty configuration.
  async fn load(&self) -> Result<AppConfig, ConfigError> {
    if !self.path.exists() {
      debug!(path = %self.path.display(), "configuration file missing, starting empty");
      return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&self.path)
      .await
      .map_err(|e| self.io_error(e))?;
    if content.trim().is_empty() {
      return Ok(AppConfig::default());
    }

    Ok(serde_json::from_str(&content)?)
  }

  /// Save the configuration, writing to a sibling temp file first so a crash
  /// never leaves a truncated document behind.
  async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent)
        .await
        .map_err(|e| self.io_error(e))?;
    }

    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, content)
      .await
      .map_err(|e| self.io_error(e))?;
    fs::rename(&tmp, &self.path)
      .await
      .map_err(|e| self.io_error(e))?;

    debug!(path = %self.path.display(), "configuration saved");
    Ok(())
  }
}
