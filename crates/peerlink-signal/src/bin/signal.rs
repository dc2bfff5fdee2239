//! Peerlink Signal Server
//!
//! WebSocket relay for WebRTC signaling between peers sharing a namespace.
//!
//! # Usage
//!
//! ```bash
//! peerlink-signal --port 3000
//!
//! # With a configuration file
//! peerlink-signal --config /etc/peerlink/config.toml
//!
//! # Persist the flags into the config file
//! peerlink-signal --port 4000 --write-config
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peerlink_core::Config;
use peerlink_signal::{banner, SignalServer};

#[derive(Parser, Debug)]
#[command(name = "peerlink-signal")]
#[command(about = "Peerlink signaling relay for WebRTC peers")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Write the effective configuration (file plus flags) and exit
    #[arg(long)]
    write_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::sample());
        return Ok(());
    }

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let mut file_config = Config::resolve(args.config.as_deref())?;
    if let Some(port) = args.port {
        file_config.server.port = port;
    }
    if let Some(bind) = args.bind {
        file_config.server.bind = bind.parse()?;
    }

    if args.write_config {
        let path = file_config.store(args.config.as_deref())?;
        info!("Wrote configuration to {}", path.display());
        return Ok(());
    }
    let config = file_config.server;

    info!("Starting Peerlink Signal Server");

    let server = SignalServer::new(config);
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let local_addr = listener.local_addr()?;
    info!("{}", banner::render(local_addr, banner::detect_local_ipv4()));

    tokio::select! {
        _ = server.serve_on(listener) => {}
        _ = signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }
    Ok(())
}
