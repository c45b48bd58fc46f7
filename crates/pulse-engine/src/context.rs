use std::collections::BTreeMap;

use pulse_config::Instance;
use pulse_resolver::Context;
use pulse_template::Template;

/// Build the starting context of one target.
///
/// Layers, lowest priority first: template defaults, instance inputs, target
/// overrides. Empty values do not override a lower layer, so clearing a field
/// falls back to the default. Every declared input key is present.
pub fn merge_inputs(
  template: &Template,
  instance: &Instance,
  overrides: &BTreeMap<String, String>,
) -> Context {
  let mut ctx: Context = template.default_inputs().into_iter().collect();

  for (key, value) in instance.inputs.iter().chain(overrides) {
    if !value.is_empty() || !ctx.contains_key(key) {
      ctx.insert(key.clone(), value.clone());
    }
  }

  ctx
}
