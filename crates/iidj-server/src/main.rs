mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use config::{ServerConfig, ServerOverrides, ServerSettings};
use iidj_keys::DiskKeyManager;
use iidj_web::{AppState, WebConfig};

#[derive(Parser)]
#[command(name = "iidj-server")]
#[command(about = "Signs instance identity documents and publishes their verification keys")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file with a [server] table
    #[arg(long, short, env = "IIDJ_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ServerOverrides,
}

fn create_data_dir(dir: &Path) -> anyhow::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(dir)
        .with_context(|| format!("Failed to create data dir {}", dir.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("iidj=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match cli.config {
        Some(ref path) => {
            tracing::info!("Loading configuration from {}", path.display());
            ServerConfig::load(path)?.server
        }
        None => ServerSettings::default(),
    };
    settings.apply(cli.overrides);

    create_data_dir(&settings.data_dir)?;

    let km_config = settings.key_manager_config()?;
    tracing::info!(
        key_type = %km_config.key_type,
        path = %km_config.path.display(),
        rotation_period = ?km_config.rotation_period,
        interval = ?km_config.check_interval,
        "Key manager settings"
    );

    let manager = Arc::new(DiskKeyManager::new(km_config)?);
    manager
        .initialize()
        .context("Failed to initialize KeyManager")?;

    let state = AppState::new(manager.clone())?;
    let web = WebConfig {
        listen_addr: settings.listen_addr(),
    };
    let served = iidj_web::start_server(web, state, shutdown_signal()).await;

    manager.stop().await;
    served
}
