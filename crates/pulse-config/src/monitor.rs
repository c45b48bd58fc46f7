use serde::{Deserialize, Serialize};

/// A dashboard entry describing one published value.
///
/// `label` and `short_label` are derived from the template's output patterns;
/// a user override takes precedence and is never replaced by derived text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorItem {
  /// Registry key, `DASH.<instanceId>[.<targetIndex>].<outputKey>`.
  pub key: String,

  pub instance_id: String,

  pub output_key: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_index: Option<usize>,

  #[serde(default)]
  pub label: String,

  #[serde(default)]
  pub short_label: String,

  #[serde(default)]
  pub unit: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_label: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_short_label: Option<String>,
}

impl MonitorItem {
  pub fn new(
    key: impl Into<String>,
    instance_id: impl Into<String>,
    target_index: Option<usize>,
    output_key: impl Into<String>,
  ) -> Self {
    Self {
      key: key.into(),
      instance_id: instance_id.into(),
      output_key: output_key.into(),
      target_index,
      label: String::new(),
      short_label: String::new(),
      unit: String::new(),
      user_label: None,
      user_short_label: None,
    }
  }

  /// Label to show: the user override if any, else the derived label.
  pub fn display_label(&self) -> &str {
    self.user_label.as_deref().unwrap_or(&self.label)
  }

  pub fn display_short_label(&self) -> &str {
    self
      .user_short_label
      .as_deref()
      .unwrap_or(&self.short_label)
  }

  /// Apply derived labels, respecting user overrides.
  ///
  /// `None` means the pattern could not be resolved and the current value is
  /// kept. Returns whether anything changed.
  pub fn apply_labels(&mut self, label: Option<String>, short_label: Option<String>) -> bool {
    let mut changed = false;

    if self.user_label.is_none()
      && let Some(label) = label
      && label != self.label
    {
      self.label = label;
      changed = true;
    }

    if self.user_short_label.is_none()
      && let Some(short_label) = short_label
      && short_label != self.short_label
    {
      self.short_label = short_label;
      changed = true;
    }

    changed
  }
}
