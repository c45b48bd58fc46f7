//! `{{ ... }}` substitution.
//!
//! ```text
//! "{{city}}"               -> ctx["city"], or "" when missing
//! "{{ nick ?? name }}"     -> first of nick, name that is present and non-empty
//! "Price: {{p}} {{unit}}"  -> every span replaced
//! ```

use crate::Context;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const FALLBACK: &str = "??";

/// Whether the pattern contains a substitution marker at all.
pub fn has_markers(pattern: &str) -> bool {
  pattern.contains(OPEN)
}

/// Resolve every `{{ ... }}` span against the context.
///
/// Unresolved spans become empty strings; they are never left in the output.
/// An unterminated `{{` is kept literally.
pub fn resolve(pattern: &str, ctx: &Context) -> String {
  if !has_markers(pattern) {
    return pattern.to_string();
  }
  render(pattern, ctx, false).unwrap_or_default()
}

/// Resolve only if every span resolves to a present, non-empty value.
///
/// Used for labels, where a half-resolved text is worse than the old one.
pub fn try_resolve(pattern: &str, ctx: &Context) -> Option<String> {
  if !has_markers(pattern) {
    return Some(pattern.to_string());
  }
  render(pattern, ctx, true)
}

fn render(pattern: &str, ctx: &Context, strict: bool) -> Option<String> {
  let mut out = String::with_capacity(pattern.len());
  let mut rest = pattern;

  while let Some(start) = rest.find(OPEN) {
    let inner_start = start + OPEN.len();
    let Some(len) = rest[inner_start..].find(CLOSE) else {
      break;
    };

    out.push_str(&rest[..start]);
    match lookup(&rest[inner_start..inner_start + len], ctx) {
      Some(value) if !value.is_empty() => out.push_str(value),
      _ if strict => return None,
      _ => {}
    }
    rest = &rest[inner_start + len + CLOSE.len()..];
  }

  out.push_str(rest);
  Some(out)
}

fn lookup<'a>(expr: &str, ctx: &'a Context) -> Option<&'a str> {
  if expr.contains(FALLBACK) {
    return expr
      .split(FALLBACK)
      .map(str::trim)
      .filter_map(|key| ctx.get(key))
      .map(String::as_str)
      .find(|value| !value.is_empty());
  }
  ctx.get(expr.trim()).map(String::as_str)
}
