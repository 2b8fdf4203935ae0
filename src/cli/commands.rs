//! Command execution against a byte cache

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Command, GetArgs, SetArgs};
use crate::domain::cache::{
    run_cancellable, ByteCache, CacheEntryOptions, JsonOptions, TypedCacheExt,
    DEFAULT_JSON_OPTIONS,
};

/// Runs `command` and returns the text to print, if any
pub async fn execute(
    cache: &dyn ByteCache,
    command: &Command,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<String>> {
    match command {
        Command::Get(args) => get(cache, args, cancel).await,
        Command::Set(args) => {
            set(cache, args, cancel).await?;
            Ok(None)
        }
        Command::Remove { key } => {
            run_cancellable(cancel, async { cache.remove(key).await }).await?;
            info!(key = %key, "Removed");
            Ok(None)
        }
        Command::Refresh { key } => {
            run_cancellable(cancel, async { cache.refresh(key).await }).await?;
            info!(key = %key, "Refreshed");
            Ok(None)
        }
    }
}

async fn get(
    cache: &dyn ByteCache,
    args: &GetArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<String>> {
    let value: Option<Value> = cache.get(&args.key, &DEFAULT_JSON_OPTIONS, cancel).await?;

    let Some(value) = value else {
        info!(key = %args.key, "Key not found");
        return Ok(None);
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    Ok(Some(text))
}

async fn set(
    cache: &dyn ByteCache,
    args: &SetArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let value: Value = serde_json::from_str(&args.value)
        .with_context(|| format!("value for '{}' is not valid JSON", args.key))?;

    let options = entry_options(args);
    cache
        .set(&args.key, &value, &options, &JsonOptions::default(), cancel)
        .await?;

    info!(key = %args.key, "Stored");
    Ok(())
}

fn entry_options(args: &SetArgs) -> CacheEntryOptions {
    let mut options = CacheEntryOptions::new();

    if let Some(at) = args.expires_at {
        options = options.with_absolute_expiration(at);
    }

    if let Some(ttl) = args.ttl {
        options = options.with_absolute_expiration_relative_to_now(Duration::from_secs(ttl));
    }

    if let Some(sliding) = args.sliding {
        options = options.with_sliding_expiration(Duration::from_secs(sliding));
    }

    options
}
