use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user-configured binding of a template to concrete input values.
///
/// Maps are ordered so the serialized form is stable; the scheduler hashes it
/// to detect configuration changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
  pub id: String,

  pub template_id: String,

  #[serde(default = "default_enabled")]
  pub enabled: bool,

  /// Global input values.
  #[serde(default)]
  pub inputs: BTreeMap<String, String>,

  /// Poll interval override in milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom_interval: Option<u64>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub targets: Vec<Target>,
}

/// Per-target input overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
  pub inputs: BTreeMap<String, String>,
}

impl Target {
  pub fn new(inputs: impl IntoIterator<Item = (String, String)>) -> Self {
    Self {
      inputs: inputs.into_iter().collect(),
    }
  }
}

/// One unit of repetition within a run: a configured target, or the implicit
/// empty target of an instance without targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSlot {
  /// `None` for the implicit target.
  pub index: Option<usize>,
  pub overrides: BTreeMap<String, String>,
}

impl TargetSlot {
  /// Position in the run, used for staggering.
  pub fn position(&self) -> usize {
    self.index.unwrap_or(0)
  }
}

impl Instance {
  /// Create an enabled instance with the given global inputs.
  pub fn new(
    id: impl Into<String>,
    template_id: impl Into<String>,
    inputs: BTreeMap<String, String>,
  ) -> Self {
    Self {
      id: id.into(),
      template_id: template_id.into(),
      enabled: true,
      inputs,
      custom_interval: None,
      targets: Vec::new(),
    }
  }

  /// The targets a run fans out to. Always at least one.
  pub fn target_slots(&self) -> Vec<TargetSlot> {
    if self.targets.is_empty() {
      return vec![TargetSlot {
        index: None,
        overrides: BTreeMap::new(),
      }];
    }

    self
      .targets
      .iter()
      .enumerate()
      .map(|(index, target)| TargetSlot {
        index: Some(index),
        overrides: target.inputs.clone(),
      })
      .collect()
  }

  /// Interval override, ignoring a zero value.
  pub fn interval_override(&self) -> Option<u64> {
    self.custom_interval.filter(|ms| *ms > 0)
  }
}

fn default_enabled() -> bool {
  true
}
