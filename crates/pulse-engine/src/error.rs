//! Engine errors.

use pulse_host_http::HttpError;

/// Errors that abort a target's run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The run was cancelled (instance stopped or reconfigured).
  #[error("execution cancelled")]
  Cancelled,

  /// The HTTP call of a step failed or returned a non-success status.
  #[error("step '{step_id}' fetch failed: {source}")]
  Fetch {
    step_id: String,
    #[source]
    source: HttpError,
  },

  /// The response could not be parsed in the step's declared format.
  #[error("step '{step_id}' returned an unparseable response: {message}")]
  Parse { step_id: String, message: String },

  /// The template cannot be executed as declared.
  #[error("template '{template_id}' is not runnable: {message}")]
  InvalidTemplate {
    template_id: String,
    message: String,
  },
}
