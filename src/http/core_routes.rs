use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use super::types::*;
use crate::config::ShellPrefs;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::plugins::LoadedPlugin;
use crate::state::AppState;

pub(super) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        plugins: state.registry.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

fn plugin_info(plugin: &LoadedPlugin) -> PluginInfo {
    let schema = plugin.model.as_ref().map(|m| m.schema());
    PluginInfo {
        descriptor: plugin.config.clone(),
        dir_name: plugin.dir_name.clone(),
        mounted_at: plugin.mounted_at.clone(),
        fields: schema.map(|s| s.fields.iter().map(|f| f.name).collect()),
        writable: schema.map(|s| s.writable),
    }
}

/// GET /api/plugins
pub(super) async fn list_plugins(State(state): State<Arc<AppState>>) -> Json<Vec<PluginInfo>> {
    Json(state.registry.iter().map(plugin_info).collect())
}

/// GET /api/plugins/{name}, where name is the plugin's directory name.
pub(super) async fn get_plugin(
    State(state): State<Arc<AppState>>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<PluginInfo>, ApiError> {
    state
        .registry
        .get_plugin(&name)
        .map(|p| Json(plugin_info(p)))
        .ok_or(ApiError::NotFound { resource: "plugin", id: name })
}

pub(super) async fn get_settings(State(state): State<Arc<AppState>>) -> Json<ShellPrefs> {
    Json(state.prefs.read().clone())
}

pub(super) async fn put_settings(
    State(state): State<Arc<AppState>>,
    ApiJson(prefs): ApiJson<ShellPrefs>,
) -> Result<Json<ShellPrefs>, ApiError> {
    if prefs.panel_width == 0 {
        return Err(ApiError::Validation("panelWidth must be positive".into()));
    }
    // Hold the lock across the write so disk and memory never disagree.
    let mut current = state.prefs.write();
    crate::config::save_shell_prefs_in(&state.config_dir, &prefs)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    *current = prefs.clone();
    Ok(Json(prefs))
}
