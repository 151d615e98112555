//! Data plugins: default fields contributed to every event.

use std::fmt::Debug;
use std::sync::Arc;

use cased_core::{deep_merge, library_name, Payload};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// Contributes default fields to outgoing events.
///
/// Plugin fields have the lowest precedence: context and caller data both
/// override them.
pub trait DataPlugin: Send + Sync + Debug {
    /// Plugin name, used for removal.
    fn name(&self) -> &str;

    /// Fields to add to `event`. The caller's event is read-only here.
    fn additions(&self, event: &Payload) -> Payload;
}

/// Always-registered plugin identifying the client library.
#[derive(Debug, Default, Clone, Copy)]
pub struct CasedDefaultPlugin;

impl CasedDefaultPlugin {
    /// Name the default plugin is registered under.
    pub const NAME: &'static str = "cased_default";

    /// Field carrying the library identifier.
    pub const LIBRARY_FIELD: &'static str = "cased_library";
}

impl DataPlugin for CasedDefaultPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn additions(&self, _event: &Payload) -> Payload {
        let mut fields = Payload::new();
        fields.insert(Self::LIBRARY_FIELD.to_string(), Value::String(library_name()));
        fields
    }
}

/// Plugin contributing a fixed set of fields.
#[derive(Debug, Clone)]
pub struct FieldsPlugin {
    name: String,
    fields: Payload,
}

impl FieldsPlugin {
    /// Creates a plugin that adds `fields` to every event.
    pub fn new(name: impl Into<String>, fields: Payload) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

impl DataPlugin for FieldsPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn additions(&self, _event: &Payload) -> Payload {
        self.fields.clone()
    }
}

/// Ordered set of registered data plugins.
#[derive(Debug)]
pub struct PluginPipeline {
    plugins: RwLock<Vec<Arc<dyn DataPlugin>>>,
}

impl Default for PluginPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginPipeline {
    /// Creates a pipeline with [`CasedDefaultPlugin`] registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(vec![Arc::new(CasedDefaultPlugin)]),
        }
    }

    /// Appends a plugin. Later plugins win over earlier ones.
    pub fn add_plugin(&self, plugin: Arc<dyn DataPlugin>) {
        self.plugins.write().push(plugin);
    }

    /// Removes every plugin registered under `name`.
    ///
    /// Returns `false` when no such plugin was registered; removal is then a
    /// no-op.
    pub fn remove_plugin(&self, name: &str) -> bool {
        let mut plugins = self.plugins.write();
        let before = plugins.len();
        plugins.retain(|p| p.name() != name);
        plugins.len() != before
    }

    /// Names of registered plugins, in registration order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    /// Returns true when no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    /// Runs every plugin and merges their fields in registration order.
    #[must_use]
    pub fn defaults(&self, event: &Payload) -> Payload {
        let plugins = self.plugins.read().clone();
        let mut accumulated = Payload::new();

        for plugin in plugins {
            let additions = plugin.additions(event);
            debug!(plugin = plugin.name(), fields = additions.len(), "Applied data plugin");
            deep_merge(&mut accumulated, additions);
        }

        accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Payload {
        cased_core::expect_object(value, "fields").unwrap()
    }

    #[test]
    fn test_default_plugin_registered() {
        let pipeline = PluginPipeline::new();
        assert_eq!(pipeline.plugin_names(), vec![CasedDefaultPlugin::NAME]);

        let defaults = pipeline.defaults(&Payload::new());
        assert_eq!(
            defaults[CasedDefaultPlugin::LIBRARY_FIELD],
            Value::String(library_name())
        );
    }

    #[test]
    fn test_later_plugins_win() {
        let pipeline = PluginPipeline::new();
        pipeline.add_plugin(Arc::new(FieldsPlugin::new(
            "first",
            fields(json!({"env": "staging", "tags": ["a"]})),
        )));
        pipeline.add_plugin(Arc::new(FieldsPlugin::new(
            "second",
            fields(json!({"env": "production", "tags": ["b"]})),
        )));

        let defaults = pipeline.defaults(&Payload::new());
        assert_eq!(defaults["env"], "production");
        assert_eq!(defaults["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_plugins_see_the_event() {
        #[derive(Debug)]
        struct EchoActor;

        impl DataPlugin for EchoActor {
            fn name(&self) -> &str {
                "echo_actor"
            }

            fn additions(&self, event: &Payload) -> Payload {
                let mut out = Payload::new();
                if let Some(actor) = event.get("actor") {
                    out.insert("actor_copy".to_string(), actor.clone());
                }
                out
            }
        }

        let pipeline = PluginPipeline::new();
        pipeline.add_plugin(Arc::new(EchoActor));

        let defaults = pipeline.defaults(&fields(json!({"actor": "jill"})));
        assert_eq!(defaults["actor_copy"], "jill");
    }

    #[test]
    fn test_remove_plugin() {
        let pipeline = PluginPipeline::new();
        pipeline.add_plugin(Arc::new(FieldsPlugin::new("extra", Payload::new())));
        assert_eq!(pipeline.len(), 2);

        assert!(pipeline.remove_plugin("extra"));
        assert!(!pipeline.remove_plugin("extra"));
        assert_eq!(pipeline.plugin_names(), vec![CasedDefaultPlugin::NAME]);
    }
}
