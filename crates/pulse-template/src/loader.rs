use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::TemplateError;
use crate::template::Template;

/// Filesystem-based template loader.
///
/// Templates are stored one per file:
/// ```text
/// {root}/
/// ├── weather.json
/// ├── stocks.json
/// └── README.md (ignored)
/// ```
pub struct TemplateLoader {
  root: PathBuf,
}

impl TemplateLoader {
  /// Create a new loader for the given directory.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the template directory.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Read, parse and validate a single template document.
  pub async fn load_file(path: &Path) -> Result<Template, TemplateError> {
    let content = fs::read_to_string(path).await?;
    let template: Template =
      serde_json::from_str(&content).map_err(|source| TemplateError::InvalidDocument {
        path: path.to_path_buf(),
        source,
      })?;
    template.validate()?;
    Ok(template)
  }

  /// Load every template in the directory.
  ///
  /// Malformed documents are logged and skipped; only a failure to read the
  /// directory itself is an error. A missing directory yields no templates.
  /// Later files never replace an already loaded id.
  pub async fn load_all(&self) -> Result<Vec<Template>, TemplateError> {
    let mut templates: Vec<Template> = Vec::new();

    if !self.root.exists() {
      warn!(path = %self.root.display(), "template directory does not exist");
      return Ok(templates);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
        paths.push(path);
      }
    }
    paths.sort();

    for path in paths {
      match Self::load_file(&path).await {
        Ok(template) => {
          if templates.iter().any(|t| t.id == template.id) {
            warn!(
              path = %path.display(),
              template_id = %template.id,
              "duplicate template id, skipping"
            );
            continue;
          }
          debug!(path = %path.display(), template_id = %template.id, "loaded template");
          templates.push(template);
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "skipping template");
        }
      }
    }

    Ok(templates)
  }
}
