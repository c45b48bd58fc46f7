//! Path-based value extraction from parsed response documents.

use serde_json::Value;

/// Sentinel returned when a path does not match the document.
pub const MISSING: &str = "?";

/// Extract the value at `path` as a string.
///
/// `path` is dot-separated; a segment may index into arrays with `name[n]`,
/// `name[n][m]` or a bare `[n]`. Any structural mismatch yields [`MISSING`].
/// An empty path selects the whole document.
pub fn extract(document: &Value, path: &str) -> String {
  match walk(document, path) {
    Some(value) => stringify(value),
    None => MISSING.to_string(),
  }
}

fn walk<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
  let mut current = document;
  if path.trim().is_empty() {
    return Some(current);
  }

  for segment in path.split('.') {
    let (name, indices) = split_segment(segment)?;

    if !name.is_empty() {
      current = current.as_object()?.get(name)?;
    }
    for index in indices {
      current = current.as_array()?.get(index)?;
    }
  }

  Some(current)
}

/// Split `name[1][2]` into `("name", [1, 2])`.
fn split_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
  let segment = segment.trim();
  let Some(open) = segment.find('[') else {
    return Some((segment, Vec::new()));
  };

  let name = &segment[..open];
  let mut indices = Vec::new();
  let mut rest = &segment[open..];

  while !rest.is_empty() {
    let inner = rest.strip_prefix('[')?;
    let close = inner.find(']')?;
    indices.push(inner[..close].trim().parse().ok()?);
    rest = &inner[close + 1..];
  }

  Some((name, indices))
}

fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    // Source text, including trailing zeros and exponents.
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// Strip a JSONP callback wrapper: `cb({"a":1});` -> `{"a":1}`.
///
/// Text without parentheses is returned trimmed.
pub fn unwrap_jsonp(text: &str) -> &str {
  match (text.find('('), text.rfind(')')) {
    (Some(open), Some(close)) if open < close => text[open + 1..close].trim(),
    _ => text.trim(),
  }
}
