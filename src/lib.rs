pub mod app_logger;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod http;
pub mod plugins;
pub mod resource;
pub mod shell;
pub mod state;

use anyhow::Context;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

pub use state::AppState;

use app_logger::SharedLogBuffer;
use config::AppConfig;
use db::Pool;
use plugins::{GuardFactory, PluginLoader};

/// Open the database, load plugins and assemble the full router.
///
/// Relative `plugins_dir` and `database_path` resolve against `config_dir`.
/// A missing plugins directory is seeded with the built-in features so a
/// fresh install serves something useful.
pub async fn bootstrap(
    config: AppConfig,
    config_dir: PathBuf,
    log_buffer: SharedLogBuffer,
) -> anyhow::Result<(Router, Arc<AppState>)> {
    let plugins_dir = config.plugins_dir_in(&config_dir);
    if !plugins_dir.exists() {
        let written = features::scaffold_builtin_plugins(&plugins_dir)
            .map_err(anyhow::Error::msg)
            .context("failed to seed plugins directory")?;
        tracing::info!(dir = %plugins_dir.display(), count = written.len(), "seeded built-in plugins");
    }

    let db_path = config.database_path_in(&config_dir);
    let pool = Pool::open(&db_path)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let loader = http::CORE_ROUTE_BASES.iter().fold(
        PluginLoader::new(
            plugins_dir,
            features::builtin_factories(),
            pool,
            GuardFactory::new(config.enforce_roles),
        ),
        |loader, base| loader.reserve(base),
    );
    let (plugin_router, registry) = loader.load_plugins(Router::new()).await;

    let state = Arc::new(AppState::new(config, config_dir, registry, log_buffer));
    let app = http::build_router(state.clone(), plugin_router);
    Ok((app, state))
}

/// Bootstrap and serve until shutdown.
pub async fn run_server(config: AppConfig, config_dir: PathBuf, log_buffer: SharedLogBuffer) -> anyhow::Result<()> {
    let (app, state) = bootstrap(config, config_dir, log_buffer).await?;
    http::start_server(state, app).await.context("HTTP server failed")
}
