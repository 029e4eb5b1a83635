//! Filedeck Daemon
//!
//! Sandboxed file manager served over HTTP.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config, EnvOverride};
use daemon::server::{wait_for_shutdown_signal, Server};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filedeck Daemon - sandboxed file manager served over HTTP.
#[derive(Parser, Debug)]
#[command(name = "filedeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start serving the sandbox root
    Start {
        /// Sandbox root directory (overrides config and FILEDECK_ROOT)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Port to listen on (overrides config and FILEDECK_PORT)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let (root_override, port_override) = match &cli.command {
        Commands::InitConfig { force } => return init_config(&config_path, *force),
        Commands::Start { root, port } => (root.clone(), *port),
        Commands::CheckConfig => (None, None),
    };

    // Load configuration
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides, then command line flags
    let overrides = config.apply_env_overrides();
    if let Some(root) = root_override {
        config.sandbox.root = root;
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    // Validate configuration
    config.validate()?;

    let _guard = init_tracing(&config, cli.verbose)?;
    tracing::debug!("Using config file: {:?}", config_path);
    log_env_overrides(&overrides);

    if matches!(cli.command, Commands::CheckConfig) {
        println!("Configuration OK ({})", config_path.display());
        println!();
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing::info!("Filedeck daemon starting...");
    tracing::info!("Serving sandbox root {}", config.sandbox.root.display());

    let server = Server::bind(&config).await?;
    server.run(wait_for_shutdown_signal()).await?;

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When `log_dir` is
/// set, a daily-rolling file is written alongside stdout; the returned guard
/// must be held until exit so buffered lines are flushed.
fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let (file_layer, guard) = match &config.daemon.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "filedeck.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn log_env_overrides(overrides: &[EnvOverride]) {
    for entry in overrides {
        match entry {
            EnvOverride::Applied { var, value } => {
                tracing::info!("Overriding config from {}: {}", var, value);
            }
            EnvOverride::Ignored { var, value, reason } => {
                tracing::warn!("Ignoring invalid {} {:?}: {}", var, value, reason);
            }
        }
    }
}

/// Write the default configuration to `path`.
fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
