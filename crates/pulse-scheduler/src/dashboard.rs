//! Dashboard entry synchronization.

use std::collections::HashSet;

use pulse_config::{AppConfig, Instance, dashboard_key};
use pulse_engine::{PLACEHOLDER_VALUE, ensure_monitor_item, merge_inputs, output_labels};
use pulse_host_kv::Registry;
use pulse_template::Template;
use tracing::debug;

/// Create or refresh the dashboard entries of one instance.
///
/// One entry per (target × declared output). Labels are derived from the
/// merged inputs and only written when fully resolvable; registry values get a
/// placeholder until the first run publishes. Entries of this instance for
/// outputs or targets that no longer exist are removed.
///
/// Returns whether any entry was created, relabelled or removed.
pub fn sync_dashboard_entries(
  config: &mut AppConfig,
  registry: &dyn Registry,
  instance: &Instance,
  template: &Template,
) -> bool {
  let mut changed = false;
  let mut live = HashSet::new();

  for slot in instance.target_slots() {
    let ctx = merge_inputs(template, instance, &slot.overrides);

    for output in &template.outputs {
      let key = dashboard_key(&instance.id, slot.index, &output.key);
      if registry.get_value(&key).is_none() {
        registry.inject_value(&key, PLACEHOLDER_VALUE.to_string());
      }

      let existed = config.monitor_item(&key).is_some();
      let (label, short_label) = output_labels(output, &ctx);
      let item = ensure_monitor_item(config, &instance.id, slot.index, output);
      changed |= item.apply_labels(label, short_label) || !existed;

      live.insert(key);
    }
  }

  let before = config.monitor_items.len();
  config
    .monitor_items
    .retain(|m| m.instance_id != instance.id || live.contains(&m.key));
  let removed = before - config.monitor_items.len();
  if removed > 0 {
    debug!(instance = %instance.id, removed, "removed stale dashboard entries");
    changed = true;
  }

  changed
}

/// Remove dashboard entries of instances that are no longer configured.
///
/// Returns the number of entries removed.
pub fn prune_orphaned_entries(config: &mut AppConfig) -> usize {
  let ids: HashSet<String> = config.instances.iter().map(|i| i.id.clone()).collect();
  let before = config.monitor_items.len();
  config
    .monitor_items
    .retain(|m| ids.contains(&m.instance_id));
  before - config.monitor_items.len()
}

#[cfg(test)]
mod tests {
  use pulse_config::{MonitorItem, Target};
  use pulse_host_kv::InMemoryRegistry;
  use serde_json::json;

  use super::*;

  fn template() -> Template {
    serde_json::from_value(json!({
      "id": "stocks",
      "inputs": [{ "key": "symbol", "scope": "target" }],
      "execution": { "type": "api_json", "url": "https://x/{{symbol}}" },
      "outputs": [
        { "key": "price", "label": "{{symbol}} price", "short_label": "{{symbol}}" },
        { "key": "change", "label": "{{symbol}} change" }
      ]
    }))
    .unwrap()
  }

  fn instance(symbols: &[&str]) -> Instance {
    let mut instance = Instance::new("st1", "stocks", Default::default());
    instance.targets = symbols
      .iter()
      .map(|s| Target::new([("symbol".to_string(), s.to_string())]))
      .collect();
    instance
  }

  #[test]
  fn test_creates_entries_and_placeholders() {
    let mut config = AppConfig::default();
    let registry = InMemoryRegistry::new();

    assert!(sync_dashboard_entries(&mut config, &registry, &instance(&["IBM", "SAP"]), &template()));

    assert_eq!(config.monitor_items.len(), 4);
    assert_eq!(config.monitor_item("DASH.st1.1.price").unwrap().label, "SAP price");
    assert_eq!(config.monitor_item("DASH.st1.0.change").unwrap().short_label, "change");
    assert_eq!(registry.get_value("DASH.st1.0.price").as_deref(), Some(PLACEHOLDER_VALUE));
  }

  #[test]
  fn test_existing_value_is_not_replaced_by_placeholder() {
    let mut config = AppConfig::default();
    let registry = InMemoryRegistry::new();
    registry.inject_value("DASH.st1.0.price", "250".to_string());

    sync_dashboard_entries(&mut config, &registry, &instance(&["IBM"]), &template());
    assert_eq!(registry.get_value("DASH.st1.0.price").as_deref(), Some("250"));
  }

  #[test]
  fn test_second_sync_is_a_no_op() {
    let mut config = AppConfig::default();
    let registry = InMemoryRegistry::new();
    let instance = instance(&["IBM"]);

    sync_dashboard_entries(&mut config, &registry, &instance, &template());
    assert!(!sync_dashboard_entries(&mut config, &registry, &instance, &template()));
  }

  #[test]
  fn test_unresolvable_label_left_untouched() {
    let mut config = AppConfig::default();
    let registry = InMemoryRegistry::new();
    let mut item = MonitorItem::new("DASH.st1.0.price", "st1", Some(0), "price");
    item.label = "IBM price".to_string();
    config.monitor_items.push(item);

    // Symbol cleared: the pattern no longer resolves.
    sync_dashboard_entries(&mut config, &registry, &instance(&[""]), &template());

    assert_eq!(config.monitor_item("DASH.st1.0.price").unwrap().label, "IBM price");
  }

  #[test]
  fn test_stale_entries_removed() {
    let mut config = AppConfig::default();
    let registry = InMemoryRegistry::new();
    config
      .monitor_items
      .push(MonitorItem::new("DASH.other.x", "other", None, "x"));

    sync_dashboard_entries(&mut config, &registry, &instance(&["IBM", "SAP"]), &template());
    assert!(sync_dashboard_entries(&mut config, &registry, &instance(&["IBM"]), &template()));

    assert!(config.monitor_item("DASH.st1.1.price").is_none());
    assert!(config.monitor_item("DASH.st1.0.price").is_some());
    assert!(config.monitor_item("DASH.other.x").is_some());
  }

  #[test]
  fn test_prune_orphaned_entries() {
    let mut config = AppConfig::default();
    config.instances.push(instance(&[]));
    config
      .monitor_items
      .push(MonitorItem::new("DASH.st1.price", "st1", None, "price"));
    config
      .monitor_items
      .push(MonitorItem::new("DASH.gone.price", "gone", None, "price"));

    assert_eq!(prune_orphaned_entries(&mut config), 1);
    assert_eq!(config.monitor_items.len(), 1);
  }
}
