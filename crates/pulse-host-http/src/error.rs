use thiserror::Error;

/// Errors produced by the HTTP capability.
///
/// Cloneable because one fetch result may be handed to several waiting
/// callers; underlying errors are captured as messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
  /// The URL is malformed or uses a scheme other than http/https.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// The method is not a supported HTTP verb.
  #[error("unsupported HTTP method: {0}")]
  InvalidMethod(String),

  /// Connection, TLS, timeout or body read failure.
  #[error("request to {url} failed: {message}")]
  Transport { url: String, message: String },

  /// The server answered with a non-success status.
  #[error("request to {url} returned status {status}")]
  Status { url: String, status: u16 },

  /// The request was cancelled before completing.
  #[error("request cancelled")]
  Cancelled,

  /// The fetch task ended without producing a result.
  #[error("fetch task aborted: {0}")]
  Aborted(String),
}
