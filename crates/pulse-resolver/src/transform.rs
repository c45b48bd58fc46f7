use pulse_template::{Transform, TransformFunction};
use regex::Regex;
use tracing::{debug, warn};

use crate::Context;
use crate::resolve::resolve;

/// Apply transforms in order, each reading the context the previous one left.
pub fn apply_transforms(transforms: &[Transform], ctx: &mut Context) {
  for transform in transforms {
    apply_transform(transform, ctx);
  }
}

/// Apply one transform.
///
/// Skipped when the source variable is absent. Otherwise the result, changed
/// or not, is written to the target variable.
pub fn apply_transform(transform: &Transform, ctx: &mut Context) {
  let Some(source) = ctx.get(transform.source_var()) else {
    debug!(
      source = %transform.source_var(),
      "transform source not set, skipping"
    );
    return;
  };

  let value = match transform.function {
    TransformFunction::RegexReplace => {
      let replacement = resolve(&transform.replacement, ctx);
      match Regex::new(&transform.pattern) {
        Ok(re) => re.replace_all(source, replacement.as_str()).into_owned(),
        Err(e) => {
          warn!(pattern = %transform.pattern, error = %e, "invalid regex in transform");
          source.clone()
        }
      }
    }
    TransformFunction::Map => transform
      .map
      .get(source)
      .cloned()
      .unwrap_or_else(|| source.clone()),
    TransformFunction::ResolveTemplate => resolve(source, ctx),
    TransformFunction::Unknown => {
      warn!(target = %transform.target, "unknown transform function, value left unchanged");
      source.clone()
    }
  };

  ctx.insert(transform.target.clone(), value);
}
