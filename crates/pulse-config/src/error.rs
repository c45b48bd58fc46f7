use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// IO error when reading/writing the configuration file.
  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The configuration document could not be parsed or serialized.
  #[error("invalid configuration: {0}")]
  Serialization(#[from] serde_json::Error),
}
