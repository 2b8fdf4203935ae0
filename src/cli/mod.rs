//! CLI module for typed-cache
//!
//! Provides subcommands operating on the configured backend:
//! - `get`: print the JSON value stored under a key
//! - `set`: store a JSON value with optional expiration
//! - `remove`: delete a key
//! - `refresh`: reset a key's sliding expiration

pub mod commands;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::infrastructure::cache::{CacheFactory, CacheType};
use crate::infrastructure::logging;

/// typed-cache - typed JSON access to a distributed byte cache
#[derive(Parser)]
#[command(name = "typed-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the value stored under a key
    Get(GetArgs),

    /// Store a JSON value under a key
    Set(SetArgs),

    /// Remove a key
    Remove { key: String },

    /// Reset the sliding expiration of a key
    Refresh { key: String },
}

/// Arguments for the get command
#[derive(Args, Clone)]
pub struct GetArgs {
    pub key: String,

    /// Indent the printed JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the set command
#[derive(Args, Clone)]
pub struct SetArgs {
    pub key: String,

    /// JSON text to store
    pub value: String,

    /// Expire this many seconds after writing
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Expire at this RFC 3339 instant
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Expire after this many seconds without access
    #[arg(long)]
    pub sliding: Option<u64>,
}

/// Loads configuration, builds the backend and runs one command.
///
/// Ctrl+C cancels the in-flight cache operation.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    if config.cache.cache_type == CacheType::InMemory {
        warn!("Using the in-memory backend; entries do not outlive this process");
    }

    let cache = CacheFactory::new().create(&config.cache).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            on_interrupt.cancel();
        }
    });

    let output = commands::execute(cache.as_ref(), &cli.command, &cancel).await?;

    if let Some(output) = output {
        println!("{}", output);
    }

    Ok(())
}
