//! TCP server for the matching engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use slab_matcher::server;
use slab_matcher::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "matcher-server")]
#[command(about = "Price-time priority matching engine over TCP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Maximum concurrent sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Order records the arena can hold
    #[arg(long)]
    arena_capacity: Option<u32>,

    /// Grow the arena instead of rejecting when it is full
    #[arg(long)]
    growable_arena: bool,

    /// Pin the engine thread to the last CPU core
    #[arg(long)]
    pin: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(max_sessions) = self.max_sessions {
            config.max_sessions = max_sessions;
        }
        if let Some(capacity) = self.arena_capacity {
            config.engine.arena_capacity = capacity;
        }
        config.engine.growable_arena |= self.growable_arena;
        config.engine.pin_to_core |= self.pin;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;
    info!(?config, "starting matcher-server");

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;

    server::serve_with_shutdown(listener, config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    Ok(())
}
