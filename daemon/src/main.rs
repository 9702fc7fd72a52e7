//! Nexus daemon: entry point for the pairing and verification service.

mod config;
mod wiring;

use clap::Parser;
use config::NexusConfig;
use nexus_rpc::RpcServer;
use nexus_utils::LogFormat;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nexus-daemon", about = "Nexus trust pairing and identity verification daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "NEXUS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "NEXUS_LISTEN_ADDR")]
    listen_addr: Option<IpAddr>,

    /// HTTP port.
    #[arg(long, env = "NEXUS_PORT")]
    port: Option<u16>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "NEXUS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log output: "human" or "json".
    #[arg(long, env = "NEXUS_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level or filter directive, e.g. "info" or "info,nexus_pairing=debug".
    #[arg(long, env = "NEXUS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for uploaded objects.
    #[arg(long, env = "NEXUS_OBJECT_ROOT")]
    object_root: Option<PathBuf>,

    /// Base URL clients use to reach the upload sink.
    #[arg(long, env = "NEXUS_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// HMAC key for signed upload URLs.
    #[arg(long, env = "NEXUS_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: Option<String>,

    /// Base URL of the document analysis gateway.
    #[arg(long, env = "NEXUS_OCR_URL")]
    ocr_url: Option<String>,

    /// Base URL of the biometric gateway.
    #[arg(long, env = "NEXUS_BIOMETRICS_URL")]
    biometrics_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the store and serve HTTP until SIGINT/SIGTERM.
    Serve,
    /// Print the effective configuration as TOML (secrets omitted).
    PrintConfig,
}

impl Cli {
    fn apply(&self, config: &mut NexusConfig) {
        if let Some(v) = self.listen_addr {
            config.listen_addr = v;
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = &self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(v) = self.log_format {
            config.log_format = v;
        }
        if let Some(v) = &self.log_level {
            config.log_level = v.clone();
        }
        if let Some(v) = &self.object_root {
            config.object_store.root = v.clone();
        }
        if let Some(v) = &self.public_base_url {
            config.object_store.public_base_url = v.clone();
        }
        if let Some(v) = &self.signing_secret {
            config.object_store.signing_secret = Some(v.clone());
        }
        if let Some(v) = &self.ocr_url {
            config.providers.ocr_url = v.clone();
        }
        if let Some(v) = &self.biometrics_url {
            config.providers.biometrics_url = v.clone();
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NexusConfig::from_toml_file(path)?,
        None => NexusConfig::default(),
    };
    cli.apply(&mut config);

    if let Command::PrintConfig = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    nexus_utils::init_logging(config.log_format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "configuration loaded");
    }
    config.validate()?;

    let state = wiring::build_state(&config)?;
    tracing::info!(
        addr = %config.socket_addr(),
        data_dir = %config.data_dir.display(),
        ocr = %config.providers.ocr_url,
        biometrics = %config.providers.biometrics_url,
        "starting Nexus daemon"
    );

    RpcServer::new(config.socket_addr())
        .serve(state, shutdown_signal())
        .await?;

    tracing::info!("Nexus daemon exited cleanly");
    Ok(())
}
