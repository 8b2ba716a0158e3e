//! Rewriting web proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                   REWRITING PROXY                    │
//!                        │                                                      │
//!   /proxy/<url>         │  ┌───────────┐   ┌───────────┐   ┌──────────────┐    │
//!   ─────────────────────┼─▶│ canonical │──▶│ blocklist │──▶│    cache     │    │
//!                        │  │  decode   │   │  filter   │   │  (GET only)  │    │
//!                        │  └───────────┘   └───────────┘   └──────┬───────┘    │
//!                        │                                   miss  │            │
//!                        │                                         ▼            │
//!                        │  ┌───────────┐   ┌───────────┐   ┌──────────────┐    │
//!   ◀────────────────────┼──│ response  │◀──│  rewrite  │◀──│   upstream   │◀───┼── Target
//!                        │  │  shaping  │   │ html/css  │   │   fetcher    │    │   Origin
//!                        │  └───────────┘   │  + hook   │   └──────────────┘    │
//!                        │                  └───────────┘                       │
//!   /ws/<url>            │  ┌──────────────────────────────┐                    │
//!   ◀───────────────────▶┼─▶│  websocket relay pair        │◀───────────────────┼─▶ Target
//!                        │  └──────────────────────────────┘                    │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use rewrite_proxy::config::loader::load_config;
use rewrite_proxy::lifecycle::startup;
use rewrite_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "rewrite-proxy", version, about = "Rewriting web proxy", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.listener.set_port(port);
    }

    init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_timeout_secs = config.upstream.timeout_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_max_entries = config.cache.max_entries,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
