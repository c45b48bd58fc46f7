//! Output publication: registry values and dashboard labels.

use pulse_config::{AppConfig, MonitorItem, dashboard_key};
use pulse_resolver::{Context, resolve, try_resolve};
use pulse_template::{OutputDef, Template};
use tracing::debug;

use crate::engine::Engine;
use crate::events::EngineEvent;

/// Registry value of a dashboard entry that has not been published yet.
pub const PLACEHOLDER_VALUE: &str = "...";

/// Published when an output's format resolves to nothing.
pub const EMPTY_VALUE: &str = "[Empty]";

/// Published for every output of a target whose run failed.
pub const ERROR_VALUE: &str = "Err";

/// Derived `(label, short_label)` of an output under `ctx`.
///
/// `None` means the pattern references a variable that is not resolvable, in
/// which case the stored label must be left alone. An empty pattern falls
/// back to the output key.
pub fn output_labels(output: &OutputDef, ctx: &Context) -> (Option<String>, Option<String>) {
  let derive = |pattern: &str| {
    if pattern.is_empty() {
      Some(output.key.clone())
    } else {
      try_resolve(pattern, ctx)
    }
  };
  (derive(&output.label), derive(&output.short_label))
}

/// The dashboard entry of one (instance, target, output), created if missing.
pub fn ensure_monitor_item<'a>(
  config: &'a mut AppConfig,
  instance_id: &str,
  target_index: Option<usize>,
  output: &OutputDef,
) -> &'a mut MonitorItem {
  let key = dashboard_key(instance_id, target_index, &output.key);

  let position = match config.monitor_items.iter().position(|m| m.key == key) {
    Some(position) => position,
    None => {
      config.monitor_items.push(MonitorItem::new(
        key,
        instance_id,
        target_index,
        &output.key,
      ));
      config.monitor_items.len() - 1
    }
  };

  let item = &mut config.monitor_items[position];
  item.unit.clone_from(&output.unit);
  item
}

fn format_value(output: &OutputDef, ctx: &Context) -> String {
  let value = if output.format.is_empty() {
    ctx.get(&output.key).cloned().unwrap_or_default()
  } else {
    resolve(&output.format, ctx)
  };

  if value.is_empty() {
    EMPTY_VALUE.to_string()
  } else {
    value
  }
}

impl Engine {
  /// Publish every declared output of a finished target and refresh labels.
  ///
  /// Label changes stay in memory and raise one `SchemaChanged` event; they
  /// are never written to disk from here.
  pub(crate) async fn publish_outputs(
    &self,
    instance_id: &str,
    target_index: Option<usize>,
    template: &Template,
    ctx: &Context,
  ) {
    for output in &template.outputs {
      self.registry().inject_value(
        &dashboard_key(instance_id, target_index, &output.key),
        format_value(output, ctx),
      );
    }

    let changed = {
      let mut config = self.app_config().write().await;
      if config.instance(instance_id).is_none() {
        debug!(instance = %instance_id, "instance removed, skipping label refresh");
        return;
      }

      let mut changed = false;
      for output in &template.outputs {
        let (label, short_label) = output_labels(output, ctx);
        let item = ensure_monitor_item(&mut config, instance_id, target_index, output);
        changed |= item.apply_labels(label, short_label);
      }
      changed
    };

    if changed {
      debug!(instance = %instance_id, "dashboard labels changed");
      self.notifier().notify(EngineEvent::SchemaChanged {
        instance_id: instance_id.to_string(),
      });
    }
  }

  /// Mark every declared output of a failed target as `"Err"`.
  pub(crate) fn publish_failure(
    &self,
    instance_id: &str,
    target_index: Option<usize>,
    template: &Template,
  ) {
    for output in &template.outputs {
      self.registry().inject_value(
        &dashboard_key(instance_id, target_index, &output.key),
        ERROR_VALUE.to_string(),
      );
    }
  }
}
