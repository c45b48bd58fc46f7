//! Pulse Resolver
//!
//! Pure functions shared by the engine and the scheduler:
//!
//! - [`resolve`] / [`try_resolve`]: `{{ var }}` and `{{ a ?? b }}` substitution
//! - [`extract`]: dot/index path lookup into a parsed JSON document
//! - [`unwrap_jsonp`]: strip a JSONP callback wrapper
//! - [`apply_transforms`]: the `process` pipeline of a step
//!
//! Nothing here performs I/O or fails loudly: unresolved variables become empty
//! strings, missing paths become `"?"`, and broken regexes leave values as they
//! were.

use std::collections::HashMap;

mod extract;
mod resolve;
mod transform;

pub use extract::{MISSING, extract, unwrap_jsonp};
pub use resolve::{has_markers, resolve, try_resolve};
pub use transform::{apply_transform, apply_transforms};

/// Per-run variables flowing through a pipeline.
pub type Context = HashMap<String, String>;
