use pulse_config::Instance;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Structural hash of an instance's configuration.
///
/// `None` when the instance cannot be serialized; callers treat that as
/// "changed" so a job is never left running on a configuration it can't track.
pub fn config_hash(instance: &Instance) -> Option<String> {
  match serde_json::to_vec(instance) {
    Ok(bytes) => Some(format!("{:x}", Sha256::digest(&bytes))),
    Err(e) => {
      warn!(instance = %instance.id, error = %e, "failed to hash instance configuration");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[test]
  fn test_hash_tracks_configuration() {
    let mut a = Instance::new("wx1", "weather", BTreeMap::new());
    let b = a.clone();
    assert_eq!(config_hash(&a), config_hash(&b));

    a.inputs.insert("city".to_string(), "Oslo".to_string());
    assert_ne!(config_hash(&a), config_hash(&b));

    let mut c = b.clone();
    c.custom_interval = Some(5_000);
    assert_ne!(config_hash(&b), config_hash(&c));
  }
}
