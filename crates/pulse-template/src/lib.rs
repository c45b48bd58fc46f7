//! Pulse Template
//!
//! This crate contains the serializable plugin template types for Pulse. A
//! template describes one kind of plugin: the inputs a user fills in, how data
//! is fetched (a single HTTP call or a chain of steps), and which named values
//! the plugin publishes.
//!
//! Templates are loaded from a directory of JSON documents by
//! [`TemplateLoader`] and are read-only afterwards.
//!
//! # Example
//!
//! ```json
//! {
//!   "id": "weather",
//!   "meta": { "name": "Weather", "version": "1.0.0" },
//!   "inputs": [{ "key": "city", "label": "City", "default": "Oslo" }],
//!   "execution": {
//!     "type": "api_json",
//!     "url": "https://api.example.com/weather?q={{city}}",
//!     "interval": 600000,
//!     "extract": { "temp": "current.temp_c" }
//!   },
//!   "outputs": [{ "key": "temp", "label": "{{city}}", "format": "{{temp}}", "unit": "°C" }]
//! }
//! ```

mod error;
mod execution;
mod loader;
mod template;

pub use error::TemplateError;
pub use execution::{
  DEFAULT_ENCODING, DEFAULT_INTERVAL_MS, Execution, ExecutionKind, ResponseFormat, Step,
  Transform, TransformFunction,
};
pub use loader::TemplateLoader;
pub use template::{
  DisplayHints, InputDef, InputOption, InputScope, InputType, OutputDef, Template, TemplateMeta,
};
