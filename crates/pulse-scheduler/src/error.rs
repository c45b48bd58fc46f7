use pulse_template::TemplateError;
use thiserror::Error;

use crate::job::JobState;

/// Errors that can occur while scheduling instances.
#[derive(Debug, Error)]
pub enum SchedulerError {
  /// The template directory could not be read.
  #[error("failed to load templates: {0}")]
  Templates(#[from] TemplateError),

  /// A job state change that the state machine forbids.
  #[error("invalid job transition {from:?} -> {to:?}")]
  InvalidTransition { from: JobState, to: JobState },

  /// The instance references a template that is not loaded.
  #[error("instance '{instance_id}' references unknown template '{template_id}'")]
  TemplateNotLoaded {
    instance_id: String,
    template_id: String,
  },
}
