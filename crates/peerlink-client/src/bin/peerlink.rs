//! Peerlink CLI - join a signaling namespace from the terminal
//!
//! Usage:
//!   peerlink                                  Create a new namespace
//!   peerlink 'https://app.example/#abcd-efgh-ijkl'   Join an existing one
//!
//! While connected, each stdin line of the form `<peer-id> <payload>` is sent
//! as a signal. The payload is parsed as JSON, falling back to a plain string.

use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peerlink_client::{ClientBootstrap, ClientSession, LoggingHandler, UrlLink};
use peerlink_core::Config;

const DEFAULT_LINK: &str = "peerlink://join/";

#[derive(Parser)]
#[command(name = "peerlink")]
#[command(about = "Join a Peerlink signaling namespace", long_about = None)]
#[command(version)]
struct Cli {
    /// Shareable link; its fragment names the namespace
    link: Option<String>,

    /// Signal server URL (overrides the config file)
    #[arg(short, long, env = "PEERLINK_SERVER")]
    server: Option<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let mut config = Config::resolve(cli.config.as_deref())?.client;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let link = UrlLink::parse(cli.link.as_deref().unwrap_or(DEFAULT_LINK))?;
    let mut bootstrap = ClientBootstrap::new(config, link)?;

    info!("");
    info!("  Namespace: {}", bootstrap.namespace());
    info!("  Share this link: {}", bootstrap.link());
    info!("");

    bootstrap.start(LoggingHandler).await?;
    if bootstrap.session().is_none() {
        bootstrap.connect().await?;
    }
    let Some(session) = bootstrap.into_session() else {
        return Err("no session".into());
    };

    tokio::select! {
        _ = relay_stdin(session) => {}
        _ = signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}

/// Forward stdin lines as signals until EOF or the connection ends
async fn relay_stdin(session: ClientSession) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = session.closed() => return,
        };

        match line {
            Ok(Some(line)) => {
                let Some((recipient, payload)) = parse_line(&line) else {
                    if !line.trim().is_empty() {
                        warn!("Expected '<peer-id> <payload>'");
                    }
                    continue;
                };
                if let Err(e) = session.send_signal(recipient, payload) {
                    error!("{}", e);
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    session.close().await;
}

fn parse_line(line: &str) -> Option<(&str, Value)> {
    let (recipient, payload) = line.trim().split_once(char::is_whitespace)?;
    let payload = payload.trim();
    let value =
        serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()));
    Some((recipient, value))
}
