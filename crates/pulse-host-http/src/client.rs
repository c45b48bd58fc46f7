use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::HttpError;

/// A fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
  pub method: String,
  pub url: String,
  pub headers: BTreeMap<String, String>,
  /// Sent only when non-empty.
  pub body: String,
}

impl HttpRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.into(),
      headers: BTreeMap::new(),
      body: String::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Bytes,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// HTTP transport capability.
#[async_trait]
pub trait HttpClient: Send + Sync {
  /// Send a request, returning status and raw body.
  ///
  /// Non-success statuses are returned as responses, not errors. Cancelling
  /// the token abandons the request with [`HttpError::Cancelled`].
  async fn send(
    &self,
    request: HttpRequest,
    cancel: CancellationToken,
  ) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by a shared reqwest connection pool.
#[derive(Clone)]
pub struct ReqwestClient {
  client: Client,
}

impl ReqwestClient {
  /// Create a client with the given per-request timeout.
  pub fn new(timeout: Duration) -> Result<Self, HttpError> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("pulse/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| HttpError::Transport {
        url: String::new(),
        message: format!("failed to build http client: {}", e),
      })?;
    Ok(Self { client })
  }

  async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let url = validate_url(&request.url)?;
    let method = parse_method(&request.method)?;

    let mut builder = self.client.request(method, url);
    for (key, value) in &request.headers {
      builder = builder.header(key, value);
    }
    if !request.body.is_empty() {
      builder = builder.body(request.body.clone());
    }

    let transport = |e: reqwest::Error| HttpError::Transport {
      url: request.url.clone(),
      message: e.to_string(),
    };

    let response = builder.send().await.map_err(transport)?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(transport)?;

    debug!(url = %request.url, status, bytes = body.len(), "http response");
    Ok(HttpResponse { status, body })
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn send(
    &self,
    request: HttpRequest,
    cancel: CancellationToken,
  ) -> Result<HttpResponse, HttpError> {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(HttpError::Cancelled),
      result = self.execute(request) => result,
    }
  }
}

/// Parse a URL and enforce the http/https scheme policy.
pub fn validate_url(raw: &str) -> Result<Url, HttpError> {
  let url = Url::parse(raw.trim()).map_err(|e| HttpError::InvalidUrl {
    url: raw.to_string(),
    message: e.to_string(),
  })?;

  match url.scheme() {
    "http" | "https" => Ok(url),
    other => Err(HttpError::InvalidUrl {
      url: raw.to_string(),
      message: format!("scheme '{}' is not allowed", other),
    }),
  }
}

/// Parse an HTTP method name, case-insensitively. Empty means GET.
pub fn parse_method(method: &str) -> Result<Method, HttpError> {
  match method.trim().to_uppercase().as_str() {
    "" | "GET" => Ok(Method::GET),
    "POST" => Ok(Method::POST),
    "PUT" => Ok(Method::PUT),
    "DELETE" => Ok(Method::DELETE),
    "PATCH" => Ok(Method::PATCH),
    "HEAD" => Ok(Method::HEAD),
    "OPTIONS" => Ok(Method::OPTIONS),
    _ => Err(HttpError::InvalidMethod(method.to_string())),
  }
}
