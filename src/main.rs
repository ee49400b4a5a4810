use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use refdesk_lib::app_logger::{self, RingBufferLayer, SharedLogBuffer};
use refdesk_lib::config::{self, AppConfig};
use refdesk_lib::features;
use refdesk_lib::plugins::{scan_plugins, ScanStatus};

#[derive(Parser)]
#[command(name = "refdesk")]
#[command(about = "Referee and invoice administration backend")]
#[command(version)]
struct Cli {
    /// Directory holding config.json and settings.json
    #[arg(long, global = true, env = config::CONFIG_DIR_ENV)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long, env = "REFDESK_BIND")]
        bind: Option<String>,
        #[arg(short, long, env = "REFDESK_PORT")]
        port: Option<u16>,
        #[arg(long)]
        plugins_dir: Option<PathBuf>,
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Inspect or create plugin directories
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Show which plugin directories would load, and why others would not
    List {
        #[arg(long)]
        plugins_dir: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the built-in plugin directories into DIR
    Init { dir: PathBuf },
}

fn init_logging(filter: &str, buffer: SharedLogBuffer) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(RingBufferLayer::new(buffer))
        .init();
}

/// Write the defaults on first run so there is a file to edit.
fn ensure_config_file(dir: &std::path::Path, config: &AppConfig) {
    if dir.join(config::APP_CONFIG_FILE).exists() {
        return;
    }
    match config::save_app_config_in(dir, config) {
        Ok(()) => tracing::info!(dir = %dir.display(), "wrote default config"),
        Err(e) => tracing::warn!("could not write default config: {e}"),
    }
}

fn list_plugins(dir: PathBuf, json: bool) -> anyhow::Result<()> {
    let report = scan_plugins(&dir, &features::builtin_factories());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.is_empty() {
        println!("no plugin directories in {}", dir.display());
    }
    for entry in report {
        match entry.status {
            ScanStatus::Ready { entry: factory, descriptor } => println!(
                "ok    {:<12} {:<20} entry={factory}",
                entry.dir_name, descriptor.route_base
            ),
            ScanStatus::Skipped { reason } => println!("skip  {:<12} {reason}", entry.dir_name),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(config::config_dir);
    let log_buffer = app_logger::shared_buffer();

    let mut config = config::load_app_config_in(&config_dir);
    init_logging(&config.log_filter, log_buffer.clone());

    match cli.command.unwrap_or(Commands::Serve {
        bind: None,
        port: None,
        plugins_dir: None,
        database: None,
    }) {
        Commands::Serve { bind, port, plugins_dir, database } => {
            ensure_config_file(&config_dir, &config);
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dir) = plugins_dir {
                config.plugins_dir = dir;
            }
            if let Some(db) = database {
                config.database_path = db;
            }
            tracing::info!(config_dir = %config_dir.display(), "starting refdesk");
            refdesk_lib::run_server(config, config_dir, log_buffer).await
        }
        Commands::Plugins { command: PluginCommands::List { plugins_dir, json } } => {
            let dir = plugins_dir.unwrap_or_else(|| config.plugins_dir_in(&config_dir));
            list_plugins(dir, json)
        }
        Commands::Plugins { command: PluginCommands::Init { dir } } => {
            let written = features::scaffold_builtin_plugins(&dir)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("failed to scaffold plugins into {}", dir.display()))?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}
