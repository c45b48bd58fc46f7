//! Execution specs: how a template fetches and shapes its data.
//!
//! Every string field except `id` is a pattern resolved against the run
//! context before use (`"https://api.example.com/{{symbol}}"`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Interval used when a template does not declare one.
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// Encoding label used when a step does not declare one.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Step id given to the single request of `api_json` / `api_text` executions.
const SINGLE_STEP_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
  /// One request, JSON response, extraction + transforms + outputs.
  ApiJson,
  /// One request, raw body published as-is.
  ApiText,
  /// Ordered steps sharing one context.
  Chain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
  #[default]
  Json,
  /// JSON wrapped in a callback, e.g. `cb({"a":1});`
  Jsonp,
  Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
  #[serde(rename = "type")]
  pub kind: ExecutionKind,

  #[serde(default = "default_method")]
  pub method: String,

  /// Polling interval in milliseconds.
  #[serde(default = "default_interval")]
  pub interval: u64,

  #[serde(default)]
  pub url: String,

  #[serde(default)]
  pub body: String,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,

  #[serde(default = "default_encoding")]
  pub response_encoding: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub response_format: Option<ResponseFormat>,

  /// Context variable → document path.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extract: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub process: Vec<Transform>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<Step>,
}

/// One HTTP call plus extraction/transform stage within a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub id: String,

  pub url: String,

  #[serde(default)]
  pub body: String,

  #[serde(default = "default_method")]
  pub method: String,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,

  #[serde(default = "default_encoding")]
  pub response_encoding: String,

  #[serde(default)]
  pub response_format: ResponseFormat,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extract: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub process: Vec<Transform>,

  /// Cache lifetime in minutes: 0 never caches, negative caches forever.
  #[serde(default)]
  pub cache_minutes: i64,

  /// Skip the step when this context variable is already set and non-empty.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skip_if_set: Option<String>,
}

impl Execution {
  /// The request of a single-call execution expressed as an uncached step.
  ///
  /// Returns `None` for chains.
  pub fn single_step(&self) -> Option<Step> {
    let format = match self.kind {
      ExecutionKind::Chain => return None,
      ExecutionKind::ApiJson => self.response_format.unwrap_or(ResponseFormat::Json),
      ExecutionKind::ApiText => ResponseFormat::Text,
    };

    Some(Step {
      id: SINGLE_STEP_ID.to_string(),
      url: self.url.clone(),
      body: self.body.clone(),
      method: self.method.clone(),
      headers: self.headers.clone(),
      response_encoding: self.response_encoding.clone(),
      response_format: format,
      extract: self.extract.clone(),
      process: self.process.clone(),
      cache_minutes: 0,
      skip_if_set: None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFunction {
  RegexReplace,
  Map,
  ResolveTemplate,
  #[serde(other)]
  Unknown,
}

/// A post-processing step applied to context variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
  pub function: TransformFunction,

  /// Variable to read. Defaults to `target` when absent.
  #[serde(default, alias = "source_var", skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,

  /// Variable the result is written to.
  #[serde(alias = "target_var")]
  pub target: String,

  #[serde(default)]
  pub pattern: String,

  #[serde(default)]
  pub replacement: String,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub map: BTreeMap<String, String>,
}

impl Transform {
  /// Name of the variable this transform reads.
  pub fn source_var(&self) -> &str {
    self.source.as_deref().unwrap_or(&self.target)
  }
}

fn default_method() -> String {
  "GET".to_string()
}

fn default_interval() -> u64 {
  DEFAULT_INTERVAL_MS
}

fn default_encoding() -> String {
  DEFAULT_ENCODING.to_string()
}
