//! `roomdrop-relay` binary: load config, start the relay, stop on Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use roomdrop_config::{LoggingConfig, RoomdropConfig};
use roomdrop_relay::server;

#[derive(Parser)]
#[command(name = "roomdrop-relay", about = "Room signaling relay for roomdrop")]
struct Args {
    /// Config file. Defaults to the platform config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind, overriding the config file.
    #[arg(long)]
    bind: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut RoomdropConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("roomdrop_relay={}", logging.level.as_str()).into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match roomdrop_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("roomdrop-relay: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);
    init_tracing(&config.logging);

    let mut handle = match server::start(&config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start relay");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        _ = handle.wait() => {
            tracing::warn!("Server task ended");
            ExitCode::FAILURE
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            handle.shutdown();
            ExitCode::SUCCESS
        }
    }
}
