use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating templates.
#[derive(Debug, Error)]
pub enum TemplateError {
  /// IO error when reading the template directory or a document.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A template document is not valid JSON or does not match the schema.
  #[error("invalid template document {path}: {source}")]
  InvalidDocument {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// The document parsed but describes an unusable template.
  #[error("invalid template '{template_id}': {message}")]
  Invalid {
    template_id: String,
    message: String,
  },
}

impl TemplateError {
  pub(crate) fn invalid(template_id: &str, message: impl Into<String>) -> Self {
    Self::Invalid {
      template_id: template_id.to_string(),
      message: message.into(),
    }
  }
}
