use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "REFDESK_CONFIG_DIR";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/refdesk/`
/// - Linux: `~/.config/refdesk/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/refdesk/`
///
/// `$REFDESK_CONFIG_DIR` wins over all of the above. Falls back to
/// `~/.refdesk/` if the platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join("refdesk"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".refdesk")
        })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot create {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("cannot encode {file}: {source}")]
    Encode { file: String, source: serde_json::Error },
    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Distinguishes concurrent saves of the same file within one process.
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Parse `dir/filename`, or fall back to `T::default()`.
///
/// A missing file is normal (first run). An unreadable or malformed one is
/// logged before falling back.
pub fn load_json_config_in<T: DeserializeOwned + Default>(dir: &Path, filename: &str) -> T {
    let path = dir.join(filename);
    let parsed = match std::fs::read(&path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(e) => Err(e.to_string()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| e.to_string()),
    };
    parsed.unwrap_or_else(|reason| {
        tracing::warn!(path = %path.display(), %reason, "ignoring unusable config file");
        T::default()
    })
}

/// Replace `dir/filename` with the pretty-printed `value`, owner-only on
/// Unix. Readers see either the old content or the new, never a mix.
pub fn save_json_config_in<T: Serialize>(dir: &Path, filename: &str, value: &T) -> Result<(), ConfigError> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let json = serde_json::to_vec_pretty(value).map_err(|source| ConfigError::Encode {
        file: filename.to_string(),
        source,
    })?;

    let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
    let staging = dir.join(format!(".{filename}.{}.{seq}", std::process::id()));
    let target = dir.join(filename);
    write_owner_only(&staging, &json)
        .and_then(|()| std::fs::rename(&staging, &target))
        .map_err(|source| {
            let _ = std::fs::remove_file(&staging);
            ConfigError::Write { path: target, source }
        })
}

fn write_owner_only(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Server-side configuration, persisted as `config.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory scanned for plugin subdirectories. Relative paths resolve
    /// against the config directory.
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,
    /// SQLite database file. Relative paths resolve against the config directory.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// When false, the per-plugin role guard lets every request through.
    #[serde(default)]
    pub enforce_roles: bool,
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4310
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("refdesk.db")
}

fn default_log_filter() -> String {
    "refdesk_lib=info,tower_http=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            plugins_dir: default_plugins_dir(),
            database_path: default_database_path(),
            enforce_roles: false,
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Resolve a possibly-relative path against `base`.
    fn resolve(base: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    pub fn plugins_dir_in(&self, base: &Path) -> PathBuf {
        Self::resolve(base, &self.plugins_dir)
    }

    pub fn database_path_in(&self, base: &Path) -> PathBuf {
        Self::resolve(base, &self.database_path)
    }
}

// ---------------------------------------------------------------------------
// ShellPrefs
// ---------------------------------------------------------------------------

/// Per-installation shell preferences, persisted as `settings.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellPrefs {
    #[serde(default = "default_panel_width")]
    pub panel_width: u32,
    #[serde(default)]
    pub last_page: Option<String>,
    #[serde(default = "default_true")]
    pub keyboard_navigation: bool,
}

fn default_panel_width() -> u32 {
    480
}

fn default_true() -> bool {
    true
}

impl Default for ShellPrefs {
    fn default() -> Self {
        Self {
            panel_width: default_panel_width(),
            last_page: None,
            keyboard_navigation: true,
        }
    }
}

pub const APP_CONFIG_FILE: &str = "config.json";
pub const SHELL_PREFS_FILE: &str = "settings.json";

pub fn load_app_config_in(dir: &Path) -> AppConfig {
    load_json_config_in(dir, APP_CONFIG_FILE)
}

pub fn save_app_config_in(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    save_json_config_in(dir, APP_CONFIG_FILE, config)
}

pub fn load_shell_prefs_in(dir: &Path) -> ShellPrefs {
    load_json_config_in(dir, SHELL_PREFS_FILE)
}

pub fn save_shell_prefs_in(dir: &Path, prefs: &ShellPrefs) -> Result<(), ConfigError> {
    save_json_config_in(dir, SHELL_PREFS_FILE, prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn app_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            plugins_dir: PathBuf::from("/srv/refdesk/plugins"),
            database_path: PathBuf::from("data.db"),
            enforce_roles: true,
            log_filter: "debug".to_string(),
        };
        save_app_config_in(dir.path(), &cfg).unwrap();
        let loaded = load_app_config_in(dir.path());
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn app_config_serde_default_for_missing_fields() {
        let cfg: AppConfig = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bind_addr, "127.0.0.1");
        assert_eq!(cfg.plugins_dir, PathBuf::from("plugins"));
        assert!(!cfg.enforce_roles);
    }

    #[test]
    fn shell_prefs_use_camel_case() {
        let prefs = ShellPrefs {
            panel_width: 600,
            last_page: Some("notes".to_string()),
            keyboard_navigation: false,
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["panelWidth"], 600);
        assert_eq!(json["lastPage"], "notes");
        assert_eq!(json["keyboardNavigation"], false);
    }

    #[test]
    fn missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let prefs = load_shell_prefs_in(dir.path());
        assert_eq!(prefs, ShellPrefs::default());
    }

    #[test]
    fn corrupt_file_returns_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SHELL_PREFS_FILE), "{not json").unwrap();
        assert_eq!(load_shell_prefs_in(dir.path()), ShellPrefs::default());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        save_shell_prefs_in(dir.path(), &ShellPrefs::default()).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![SHELL_PREFS_FILE.to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        save_shell_prefs_in(dir.path(), &ShellPrefs::default()).unwrap();
        let mode = fs::metadata(dir.path().join(SHELL_PREFS_FILE))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "Config file should be owner-only (0600)");
    }

    #[test]
    fn concurrent_saves_all_succeed() {
        let dir = TempDir::new().unwrap();
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    (0..100u32)
                        .filter(|i| {
                            let prefs = ShellPrefs { panel_width: 100 + t * 1000 + i, ..ShellPrefs::default() };
                            save_shell_prefs_in(&path, &prefs).is_err()
                        })
                        .count()
                })
            })
            .collect();
        let failed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(failed, 0);
        assert_ne!(load_shell_prefs_in(dir.path()), ShellPrefs::default());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let cfg = AppConfig::default();
        let base = Path::new("/etc/refdesk");
        assert_eq!(cfg.plugins_dir_in(base), PathBuf::from("/etc/refdesk/plugins"));

        let abs = AppConfig {
            database_path: PathBuf::from("/var/lib/refdesk.db"),
            ..AppConfig::default()
        };
        assert_eq!(abs.database_path_in(base), PathBuf::from("/var/lib/refdesk.db"));
    }
}
