use serde::{Deserialize, Serialize};

use crate::app_logger::LogLevel;
use crate::plugins::PluginDescriptor;

// --- Request/Response types ---

#[derive(Serialize)]
pub(super) struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
    pub plugins: usize,
    pub uptime_secs: u64,
}

/// A loaded plugin as reported by `/api/plugins`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PluginInfo {
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    pub dir_name: String,
    pub mounted_at: String,
    /// Column names when the plugin is backed by a resource table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
}

#[derive(Deserialize)]
pub(super) struct GetLogsQuery {
    #[serde(default)]
    pub limit: usize,
    /// Minimum level: "debug", "info", "warn", "error"
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct PushLogBody {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub(super) struct PushLogResponse {
    pub id: u64,
}
