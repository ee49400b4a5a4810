//! Built-in feature plugins.
//!
//! Each feature is a `ResourceSchema` served through the generic resource
//! triple. `builtin_factories` exposes them to the plugin loader by entry id;
//! `scaffold_builtin_plugins` writes the plugin directories that select them.

mod channels;
mod contacts;
mod notes;
mod tasks;

pub use channels::CHANNELS;
pub use contacts::CONTACTS;
pub use notes::NOTES;
pub use tasks::TASKS;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::plugins::{scaffold_plugin, FactoryTable, PluginDescriptor, PluginEnv, PluginParts};
use crate::resource::{self, ResourceController, ResourceModel, ResourceSchema};

/// Role required by the built-in plugins when role enforcement is on.
pub const DEFAULT_ROLE: &str = "user";

/// `(entry id, description)` of every built-in feature. The entry id doubles
/// as the plugin name.
pub const BUILTINS: &[(&str, &str)] = &[
    ("contacts", "Referees, clubs and other contacts"),
    ("notes", "Free-form notes, optionally linked to a contact"),
    ("channels", "Notification channels (read-only)"),
    ("tasks", "To-do items with due dates"),
];

pub fn builtin_factories() -> FactoryTable {
    FactoryTable::new()
        .register("contacts", contacts::factory)
        .register("notes", notes::factory)
        .register("channels", channels::factory)
        .register("tasks", tasks::factory)
}

/// Write `{dir}/{name}/index.json` and `plugin.config.json` for every
/// built-in feature. Existing files are kept.
pub fn scaffold_builtin_plugins(dir: &Path) -> Result<Vec<PathBuf>, String> {
    BUILTINS
        .iter()
        .map(|(entry, description)| {
            let descriptor = PluginDescriptor::new(entry, DEFAULT_ROLE, description);
            scaffold_plugin(dir, entry, &descriptor)
        })
        .collect()
}

/// Shared factory body: model, controller, guarded router. The loader
/// creates the table once the plugin is accepted.
fn resource_plugin(schema: &'static ResourceSchema, env: &PluginEnv<'_>) -> Result<PluginParts, String> {
    let model = Arc::new(ResourceModel::new(schema, env.pool.clone()));
    let controller = Arc::new(ResourceController::new(model.clone()));
    let guard = env.guards.require(env.descriptor);
    let router = resource::router(controller.clone(), &guard);

    Ok(PluginParts {
        config: Some(env.descriptor.clone()),
        router: Some(router),
        model: Some(model),
        controller: Some(controller),
    })
}
