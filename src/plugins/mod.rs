//! Backend plugin discovery and mounting.
//!
//! Plugins live in `{plugins_dir}/{dir}/`. Each directory holds:
//! - `index.json`: the entry point, `{"entry": "<factory id>"}`
//! - `plugin.config.json`: the `PluginDescriptor`
//!
//! The entry id selects a compiled-in factory from a `FactoryTable`. The
//! factory receives the database pool and the role-guard factory and returns
//! the plugin's router (plus its model and controller when it has them).

mod descriptor;
mod guard;
mod loader;

pub use descriptor::PluginDescriptor;
pub use guard::{GuardFactory, RoleGuard, ADMIN_ROLE, ROLE_HEADER};
pub use loader::{
    scaffold_plugin, scan_plugins, LoadError, LoadedPlugin, PluginLoader, PluginRegistry,
    ScanEntry, ScanStatus,
};

use axum::Router;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::db::Pool;
use crate::resource::{ResourceController, ResourceModel};

pub const INDEX_FILE: &str = "index.json";
pub const CONFIG_FILE: &str = "plugin.config.json";

/// Contents of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub entry: String,
}

/// What a factory gets to build its plugin from.
pub struct PluginEnv<'a> {
    pub pool: &'a Pool,
    pub guards: &'a GuardFactory,
    pub descriptor: &'a PluginDescriptor,
    pub dir: &'a Path,
}

/// What a factory hands back. `config` and `router` are mandatory; the
/// loader rejects the plugin when either is missing.
#[derive(Default)]
pub struct PluginParts {
    pub config: Option<PluginDescriptor>,
    pub router: Option<Router>,
    pub model: Option<Arc<ResourceModel>>,
    pub controller: Option<Arc<ResourceController>>,
}

pub type PluginFactory = fn(&PluginEnv<'_>) -> Result<PluginParts, String>;

/// Compiled-in factories, keyed by entry id.
#[derive(Clone, Default)]
pub struct FactoryTable {
    factories: BTreeMap<String, PluginFactory>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entry: &str, factory: PluginFactory) -> Self {
        self.factories.insert(entry.to_string(), factory);
        self
    }

    pub fn get(&self, entry: &str) -> Option<PluginFactory> {
        self.factories.get(entry).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
