use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Process-wide registry of published values.
///
/// Pulse writes dashboard values and raw text results here; renderers and
/// other parts of the host read them. Implementations use interior mutability
/// since many pipeline tasks publish concurrently.
pub trait Registry: Send + Sync {
  /// Get a value by key.
  fn get_value(&self, key: &str) -> Option<String>;

  /// Set a value, replacing any previous one.
  fn inject_value(&self, key: &str, value: String);

  /// Copy of every key and value, sorted by key.
  fn snapshot(&self) -> BTreeMap<String, String>;
}

/// In-memory registry implementation.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
  data: RwLock<HashMap<String, String>>,
}

impl InMemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Registry for InMemoryRegistry {
  fn get_value(&self, key: &str) -> Option<String> {
    let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
    data.get(key).cloned()
  }

  fn inject_value(&self, key: &str, value: String) {
    let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
    data.insert(key.to_string(), value);
  }

  fn snapshot(&self) -> BTreeMap<String, String> {
    let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
    data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
  }
}
