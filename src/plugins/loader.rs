use axum::Router;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::{
    EntryPoint, FactoryTable, GuardFactory, PluginDescriptor, PluginEnv, CONFIG_FILE, INDEX_FILE,
};
use crate::db::{DbError, Pool};
use crate::resource::{ResourceController, ResourceModel};

/// Why a plugin directory was skipped. Reported and logged, never fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing {0}")]
    MissingFile(&'static str),
    #[error("failed to read {file}: {source}")]
    Read {
        file: &'static str,
        source: std::io::Error,
    },
    #[error("invalid {file}: {source}")]
    Parse {
        file: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("unknown entry point \"{0}\"")]
    UnknownEntry(String),
    #[error("factory failed: {0}")]
    Factory(String),
    #[error("factory did not return a {0}")]
    Incomplete(&'static str),
    #[error("route base {route_base} conflicts with {existing}")]
    RouteConflict { route_base: String, existing: String },
    #[error("failed to create table: {0}")]
    Schema(#[from] DbError),
}

/// A plugin mounted into the application router.
#[derive(Clone)]
pub struct LoadedPlugin {
    pub dir_name: String,
    pub config: PluginDescriptor,
    pub router: Router,
    pub model: Option<Arc<ResourceModel>>,
    pub controller: Option<Arc<ResourceController>>,
    /// Path the router was nested at; always `config.route_base`.
    pub mounted_at: String,
}

/// The set of loaded plugins, keyed by directory name. Frozen once
/// `load_plugins` returns.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<BTreeMap<String, LoadedPlugin>>,
}

impl PluginRegistry {
    pub fn get_plugin(&self, name: &str) -> Option<&LoadedPlugin> {
        self.plugins.get(name)
    }

    /// Descriptors of every loaded plugin, ordered by directory name.
    pub fn get_all_plugins(&self) -> Vec<PluginDescriptor> {
        self.plugins.values().map(|p| p.config.clone()).collect()
    }

    /// Loaded plugins in load order.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.plugins.values()
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Scans a plugins directory and mounts every valid plugin.
pub struct PluginLoader {
    plugins_dir: PathBuf,
    factories: FactoryTable,
    pool: Pool,
    guards: GuardFactory,
    reserved: Vec<String>,
}

impl PluginLoader {
    pub fn new(plugins_dir: impl Into<PathBuf>, factories: FactoryTable, pool: Pool, guards: GuardFactory) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            factories,
            pool,
            guards,
            reserved: Vec::new(),
        }
    }

    /// Keep plugins from mounting over a core route.
    pub fn reserve(mut self, route_base: &str) -> Self {
        self.reserved.push(route_base.to_string());
        self
    }

    /// Mount every valid plugin onto `app`.
    ///
    /// A plugin that fails any check is logged and skipped; the others are
    /// still loaded. Returns the extended router and the frozen registry.
    pub async fn load_plugins(&self, mut app: Router) -> (Router, PluginRegistry) {
        let mut loaded: BTreeMap<String, LoadedPlugin> = BTreeMap::new();
        let mut taken: Vec<String> = self.reserved.clone();

        for (dir_name, path) in plugin_dirs(&self.plugins_dir) {
            let plugin = match self.load_one(&dir_name, &path, &taken).await {
                Ok(p) => p,
                Err(err) => {
                    tracing::error!(plugin = %dir_name, "skipping plugin: {err}");
                    continue;
                }
            };
            app = app.nest(&plugin.mounted_at, plugin.router.clone());
            tracing::info!(plugin = %dir_name, route_base = %plugin.mounted_at, "plugin mounted");
            taken.push(plugin.mounted_at.clone());
            loaded.insert(dir_name, plugin);
        }

        tracing::info!(count = loaded.len(), dir = %self.plugins_dir.display(), "plugins loaded");
        (app, PluginRegistry { plugins: Arc::new(loaded) })
    }

    async fn load_one(&self, dir_name: &str, path: &Path, taken: &[String]) -> Result<LoadedPlugin, LoadError> {
        let (entry, descriptor) = read_plugin_files(path)?;
        for warning in descriptor.validate().map_err(LoadError::InvalidDescriptor)? {
            tracing::warn!(plugin = %dir_name, "{warning}");
        }

        let factory = self
            .factories
            .get(&entry.entry)
            .ok_or_else(|| LoadError::UnknownEntry(entry.entry.clone()))?;

        let env = PluginEnv {
            pool: &self.pool,
            guards: &self.guards,
            descriptor: &descriptor,
            dir: path,
        };
        let parts = factory(&env).map_err(LoadError::Factory)?;
        let config = parts.config.ok_or(LoadError::Incomplete("config"))?;
        let router = parts.router.ok_or(LoadError::Incomplete("router"))?;
        // The factory may hand back a different descriptor; re-check the one
        // that will actually be mounted.
        config.validate().map_err(LoadError::InvalidDescriptor)?;

        if let Some(existing) = taken.iter().find(|t| route_overlaps(t, &config.route_base)) {
            return Err(LoadError::RouteConflict {
                route_base: config.route_base.clone(),
                existing: existing.clone(),
            });
        }
        if let Some(model) = &parts.model {
            model.ensure_schema().await?;
        }

        Ok(LoadedPlugin {
            dir_name: dir_name.to_string(),
            mounted_at: config.route_base.clone(),
            config,
            router,
            model: parts.model,
            controller: parts.controller,
        })
    }
}

/// True when nesting at `a` and `b` would register clashing routes.
fn route_overlaps(a: &str, b: &str) -> bool {
    a == b || a.starts_with(&format!("{b}/")) || b.starts_with(&format!("{a}/"))
}

/// Non-hidden subdirectories of `dir`, sorted by name.
fn plugin_dirs(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), "cannot read plugins dir: {err}");
            return Vec::new();
        }
    };

    let mut dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            (!name.starts_with('.')).then_some((name, path))
        })
        .collect();
    dirs.sort();
    dirs
}

fn read_plugin_files(path: &Path) -> Result<(EntryPoint, PluginDescriptor), LoadError> {
    let index_path = path.join(INDEX_FILE);
    let config_path = path.join(CONFIG_FILE);
    if !index_path.is_file() {
        return Err(LoadError::MissingFile(INDEX_FILE));
    }
    if !config_path.is_file() {
        return Err(LoadError::MissingFile(CONFIG_FILE));
    }
    Ok((read_json(&index_path, INDEX_FILE)?, read_json(&config_path, CONFIG_FILE)?))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, file: &'static str) -> Result<T, LoadError> {
    let data = std::fs::read_to_string(path).map_err(|source| LoadError::Read { file, source })?;
    serde_json::from_str(&data).map_err(|source| LoadError::Parse { file, source })
}

// ---------------------------------------------------------------------------
// Dry-run scan and scaffolding (CLI)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanStatus {
    Ready { entry: String, descriptor: PluginDescriptor },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub dir_name: String,
    #[serde(flatten)]
    pub status: ScanStatus,
}

/// Report what `load_plugins` would do for each directory, without
/// invoking any factory.
pub fn scan_plugins(dir: &Path, factories: &FactoryTable) -> Vec<ScanEntry> {
    plugin_dirs(dir)
        .into_iter()
        .map(|(dir_name, path)| {
            let status = match check_plugin(&path, factories) {
                Ok((entry, descriptor)) => ScanStatus::Ready { entry, descriptor },
                Err(err) => ScanStatus::Skipped { reason: err.to_string() },
            };
            ScanEntry { dir_name, status }
        })
        .collect()
}

fn check_plugin(path: &Path, factories: &FactoryTable) -> Result<(String, PluginDescriptor), LoadError> {
    let (entry, descriptor) = read_plugin_files(path)?;
    descriptor.validate().map_err(LoadError::InvalidDescriptor)?;
    if factories.get(&entry.entry).is_none() {
        return Err(LoadError::UnknownEntry(entry.entry));
    }
    Ok((entry.entry, descriptor))
}

/// Write `index.json` and `plugin.config.json` for one plugin under
/// `{plugins_dir}/{descriptor.name}/`. Existing files are left alone.
pub fn scaffold_plugin(plugins_dir: &Path, entry: &str, descriptor: &PluginDescriptor) -> Result<PathBuf, String> {
    let dir = plugins_dir.join(&descriptor.name);
    std::fs::create_dir_all(&dir).map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;

    let files = [
        (INDEX_FILE, serde_json::to_string_pretty(&EntryPoint { entry: entry.to_string() })),
        (CONFIG_FILE, serde_json::to_string_pretty(descriptor)),
    ];
    for (name, json) in files {
        let path = dir.join(name);
        if path.exists() {
            continue;
        }
        let json = json.map_err(|e| format!("Failed to serialize {name}: {e}"))?;
        std::fs::write(&path, json).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PluginParts;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn echo_factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
        let name = env.descriptor.name.clone();
        let router = Router::new().route("/", get(move || async move { name }));
        Ok(PluginParts {
            config: Some(env.descriptor.clone()),
            router: Some(router),
            ..PluginParts::default()
        })
    }

    fn no_router_factory(env: &PluginEnv<'_>) -> Result<PluginParts, String> {
        Ok(PluginParts {
            config: Some(env.descriptor.clone()),
            ..PluginParts::default()
        })
    }

    fn failing_factory(_env: &PluginEnv<'_>) -> Result<PluginParts, String> {
        Err("boom".into())
    }

    fn factories() -> FactoryTable {
        FactoryTable::new()
            .register("echo", echo_factory)
            .register("no-router", no_router_factory)
            .register("failing", failing_factory)
    }

    fn write_plugin(root: &Path, dir: &str, entry: Option<&str>, descriptor: Option<PluginDescriptor>) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        if let Some(entry) = entry {
            std::fs::write(path.join(INDEX_FILE), format!(r#"{{"entry":"{entry}"}}"#)).unwrap();
        }
        if let Some(d) = descriptor {
            std::fs::write(path.join(CONFIG_FILE), serde_json::to_string(&d).unwrap()).unwrap();
        }
    }

    async fn loader(root: &Path) -> PluginLoader {
        let pool = Pool::open_in_memory().await.unwrap();
        PluginLoader::new(root, factories(), pool, GuardFactory::default())
    }

    async fn get_status(app: &Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn mounts_valid_plugin_at_route_base() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "contacts", Some("echo"), Some(PluginDescriptor::new("contacts", "user", "")));

        let (app, registry) = loader(dir.path()).await.load_plugins(Router::new()).await;
        assert!(registry.is_plugin_loaded("contacts"));
        let plugin = registry.get_plugin("contacts").unwrap();
        assert_eq!(plugin.mounted_at, plugin.config.route_base);
        assert_eq!(plugin.mounted_at, "/api/contacts");

        let (status, body) = get_status(&app, "/api/contacts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "contacts");
    }

    #[tokio::test]
    async fn missing_files_skip_only_that_plugin() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "a-first", Some("echo"), Some(PluginDescriptor::new("a-first", "user", "")));
        write_plugin(dir.path(), "b-no-index", None, Some(PluginDescriptor::new("b-no-index", "user", "")));
        write_plugin(dir.path(), "c-no-config", Some("echo"), None);
        write_plugin(dir.path(), "d-last", Some("echo"), Some(PluginDescriptor::new("d-last", "user", "")));

        let (app, registry) = loader(dir.path()).await.load_plugins(Router::new()).await;
        assert_eq!(registry.len(), 2);
        assert!(registry.is_plugin_loaded("a-first"));
        assert!(registry.is_plugin_loaded("d-last"));
        assert!(!registry.is_plugin_loaded("b-no-index"));
        assert!(!registry.is_plugin_loaded("c-no-config"));

        assert_eq!(get_status(&app, "/api/b-no-index").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_status(&app, "/api/c-no-config").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_status(&app, "/api/d-last").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn incomplete_or_failing_factories_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "hollow", Some("no-router"), Some(PluginDescriptor::new("hollow", "user", "")));
        write_plugin(dir.path(), "broken", Some("failing"), Some(PluginDescriptor::new("broken", "user", "")));
        write_plugin(dir.path(), "ghost", Some("nope"), Some(PluginDescriptor::new("ghost", "user", "")));
        write_plugin(dir.path(), "notes", Some("echo"), Some(PluginDescriptor::new("notes", "user", "")));

        let (_, registry) = loader(dir.path()).await.load_plugins(Router::new()).await;
        let names: Vec<String> = registry.get_all_plugins().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["notes".to_string()]);
    }

    #[tokio::test]
    async fn conflicting_route_bases_keep_the_first() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "a", Some("echo"), Some(PluginDescriptor::new("tasks", "user", "")));
        write_plugin(dir.path(), "b", Some("echo"), Some(PluginDescriptor::new("tasks", "user", "")));

        let (_, registry) = loader(dir.path()).await.load_plugins(Router::new()).await;
        assert!(registry.is_plugin_loaded("a"));
        assert!(!registry.is_plugin_loaded("b"));
    }

    #[tokio::test]
    async fn reserved_route_bases_are_refused() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "plugins", Some("echo"), Some(PluginDescriptor::new("plugins", "user", "")));

        let (_, registry) = loader(dir.path()).await.reserve("/api/plugins").load_plugins(Router::new()).await;
        assert!(registry.is_empty());
    }

    #[test]
    fn hidden_dirs_and_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        write_plugin(dir.path(), "notes", Some("echo"), Some(PluginDescriptor::new("notes", "user", "")));

        let names: Vec<String> = plugin_dirs(dir.path()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["notes".to_string()]);
    }

    #[tokio::test]
    async fn missing_plugins_dir_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let (_, registry) = loader(&dir.path().join("absent")).await.load_plugins(Router::new()).await;
        assert!(registry.is_empty());
    }

    #[test]
    fn scan_reports_reasons() {
        let dir = TempDir::new().unwrap();
        write_plugin(dir.path(), "contacts", Some("echo"), Some(PluginDescriptor::new("contacts", "user", "")));
        write_plugin(dir.path(), "notes", None, Some(PluginDescriptor::new("notes", "user", "")));

        let report = scan_plugins(dir.path(), &factories());
        assert_eq!(report.len(), 2);
        assert!(matches!(&report[0].status, ScanStatus::Ready { entry, .. } if entry == "echo"));
        assert!(matches!(&report[1].status, ScanStatus::Skipped { reason } if reason == "missing index.json"));
    }

    #[test]
    fn scaffold_writes_loadable_files() {
        let dir = TempDir::new().unwrap();
        let d = PluginDescriptor::new("tasks", "user", "Tasks");
        scaffold_plugin(dir.path(), "echo", &d).unwrap();

        let (entry, descriptor) = read_plugin_files(&dir.path().join("tasks")).unwrap();
        assert_eq!(entry.entry, "echo");
        assert_eq!(descriptor, d);
    }

    #[test]
    fn route_overlap_detection() {
        assert!(route_overlaps("/api/a", "/api/a"));
        assert!(route_overlaps("/api/a", "/api/a/b"));
        assert!(!route_overlaps("/api/a", "/api/ab"));
    }
}
