use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::execution::{Execution, ExecutionKind};

/// Free-form presentation hints (icon, colour, grouping...). Pulse carries them
/// through untouched for whoever renders the published values.
pub type DisplayHints = BTreeMap<String, serde_json::Value>;

/// A plugin template.
///
/// Identity is `id`; two templates with the same id are the same plugin kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
  pub id: String,

  #[serde(default)]
  pub meta: TemplateMeta,

  #[serde(default)]
  pub inputs: Vec<InputDef>,

  pub execution: Execution,

  #[serde(default)]
  pub outputs: Vec<OutputDef>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub display: DisplayHints,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub author: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub url: String,
}

/// Where an input value is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputScope {
  /// One value for the whole instance.
  #[default]
  Global,
  /// One value per target (e.g. one stock symbol per tracked row).
  Target,
}

/// Editor hint for an input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
  #[default]
  Text,
  Number,
  Select,
  Checkbox,
  Password,
  #[serde(other)]
  Other,
}

/// A selectable option for `select` inputs. Documents may list plain strings
/// or `{ "label": ..., "value": ... }` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputOption {
  Plain(String),
  Labeled { label: String, value: String },
}

impl InputOption {
  pub fn value(&self) -> &str {
    match self {
      Self::Plain(v) => v,
      Self::Labeled { value, .. } => value,
    }
  }

  pub fn label(&self) -> &str {
    match self {
      Self::Plain(v) => v,
      Self::Labeled { label, .. } => label,
    }
  }
}

/// A user-configurable input declared by the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
  pub key: String,

  #[serde(default)]
  pub label: String,

  #[serde(rename = "type", default)]
  pub input_type: InputType,

  #[serde(default)]
  pub default: String,

  #[serde(default)]
  pub placeholder: String,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<InputOption>,

  #[serde(default)]
  pub scope: InputScope,
}

/// A named value published by the template.
///
/// `label`, `short_label` and `format` are patterns resolved against the run
/// context, e.g. `"{{symbol}} price"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  pub key: String,

  #[serde(default)]
  pub label: String,

  #[serde(default)]
  pub short_label: String,

  #[serde(default)]
  pub format: String,

  #[serde(default)]
  pub unit: String,
}

impl Template {
  /// Human-readable name, falling back to the id.
  pub fn name(&self) -> &str {
    if self.meta.name.is_empty() {
      &self.id
    } else {
      &self.meta.name
    }
  }

  /// Polling interval declared by the template, in milliseconds.
  pub fn interval_ms(&self) -> u64 {
    self.execution.interval
  }

  /// Default value for every declared input.
  pub fn default_inputs(&self) -> BTreeMap<String, String> {
    self
      .inputs
      .iter()
      .map(|i| (i.key.clone(), i.default.clone()))
      .collect()
  }

  /// Check structural rules a document can violate while still being valid JSON.
  pub fn validate(&self) -> Result<(), TemplateError> {
    if self.id.trim().is_empty() {
      return Err(TemplateError::invalid(&self.id, "template id is empty"));
    }

    unique_keys(&self.id, "input", self.inputs.iter().map(|i| i.key.as_str()))?;
    unique_keys(&self.id, "output", self.outputs.iter().map(|o| o.key.as_str()))?;

    match self.execution.kind {
      ExecutionKind::Chain => {
        if self.execution.steps.is_empty() {
          return Err(TemplateError::invalid(
            &self.id,
            "chain execution declares no steps",
          ));
        }
        unique_keys(
          &self.id,
          "step",
          self.execution.steps.iter().map(|s| s.id.as_str()),
        )?;
        if let Some(step) = self.execution.steps.iter().find(|s| s.url.is_empty()) {
          return Err(TemplateError::invalid(
            &self.id,
            format!("step '{}' has no url", step.id),
          ));
        }
      }
      ExecutionKind::ApiJson | ExecutionKind::ApiText => {
        if self.execution.url.is_empty() {
          return Err(TemplateError::invalid(&self.id, "execution has no url"));
        }
      }
    }

    Ok(())
  }
}

fn unique_keys<'a>(
  template_id: &str,
  what: &str,
  keys: impl Iterator<Item = &'a str>,
) -> Result<(), TemplateError> {
  let mut seen = HashSet::new();
  for key in keys {
    if key.is_empty() {
      return Err(TemplateError::invalid(
        template_id,
        format!("{} with empty key", what),
      ));
    }
    if !seen.insert(key) {
      return Err(TemplateError::invalid(
        template_id,
        format!("duplicate {} key '{}'", what, key),
      ));
    }
  }
  Ok(())
}
