use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::time::Instant;

use crate::app_logger::SharedLogBuffer;
use crate::config::{AppConfig, ShellPrefs};
use crate::plugins::PluginRegistry;

/// Process-wide state shared by the core HTTP handlers.
///
/// Plugin routers carry their own state; they only appear here through the
/// frozen `registry`.
pub struct AppState {
    pub config: RwLock<AppConfig>,
    /// Directory holding `config.json` and `settings.json`.
    pub config_dir: PathBuf,
    pub registry: PluginRegistry,
    pub log_buffer: SharedLogBuffer,
    pub prefs: RwLock<ShellPrefs>,
    pub started_at: Instant,
    /// Send () to stop the HTTP server gracefully.
    pub server_shutdown: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        config_dir: PathBuf,
        registry: PluginRegistry,
        log_buffer: SharedLogBuffer,
    ) -> Self {
        let prefs = crate::config::load_shell_prefs_in(&config_dir);
        Self {
            config: RwLock::new(config),
            config_dir,
            registry,
            log_buffer,
            prefs: RwLock::new(prefs),
            started_at: Instant::now(),
            server_shutdown: Mutex::new(None),
        }
    }

    /// Trigger graceful shutdown if the server is running. Returns false
    /// when there was nothing to stop.
    pub fn request_shutdown(&self) -> bool {
        match self.server_shutdown.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}
