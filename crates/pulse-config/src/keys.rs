/// Prefix of every dashboard registry key.
pub const DASHBOARD_PREFIX: &str = "DASH";

/// Suffix distinguishing targets: empty for the implicit target, `.<index>`
/// otherwise.
pub fn target_suffix(target_index: Option<usize>) -> String {
  match target_index {
    Some(index) => format!(".{}", index),
    None => String::new(),
  }
}

/// Registry key of one published output.
pub fn dashboard_key(instance_id: &str, target_index: Option<usize>, output_key: &str) -> String {
  format!(
    "{}.{}{}.{}",
    DASHBOARD_PREFIX,
    instance_id,
    target_suffix(target_index),
    output_key
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dashboard_key_with_target() {
    assert_eq!(dashboard_key("wx1", Some(0), "temp"), "DASH.wx1.0.temp");
    assert_eq!(dashboard_key("wx1", Some(12), "temp"), "DASH.wx1.12.temp");
  }

  #[test]
  fn test_dashboard_key_without_target() {
    assert_eq!(dashboard_key("wx1", None, "temp"), "DASH.wx1.temp");
  }

  #[test]
  fn test_target_suffix() {
    assert_eq!(target_suffix(None), "");
    assert_eq!(target_suffix(Some(3)), ".3");
  }
}
