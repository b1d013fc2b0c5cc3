//! Subcommand execution.

use crate::Command;
use anyhow::Result;
use plantitas_cache::{
    spawn_sweeper, CacheLookup, CachePolicy, CacheStore, CancellationToken, ResponseCache,
    SqliteCacheStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run(command: Command, store: SqliteCacheStore, policy: CachePolicy) -> Result<()> {
    let store: Arc<dyn CacheStore> = Arc::new(store);

    if let Command::Sweep { interval_secs } = command {
        return sweep(store, Duration::from_secs(interval_secs.max(1))).await;
    }

    let cache = ResponseCache::new(store, policy);
    let output = execute(command, &cache)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run a one-shot command and return its JSON report.
fn execute(command: Command, cache: &ResponseCache) -> Result<serde_json::Value> {
    let store = cache.store();

    let output = match command {
        Command::Stats => {
            let stats = store.stats()?;
            let hits_per_entry = stats.hits_per_entry();
            json!({
                "stats": stats,
                "hits_per_entry": hits_per_entry,
            })
        }
        Command::Lookup { question, context } => {
            match cache.lookup(&question, context.as_deref()) {
                CacheLookup::Hit { entry, .. } => json!({ "hit": true, "entry": entry }),
                CacheLookup::Miss => json!({ "hit": false }),
            }
        }
        Command::Store {
            question,
            answer,
            context,
            category,
        } => {
            let ttl = cache.policy().ttl_for(category.as_deref());
            let entry = store.store(&question, context.as_deref(), &answer, ttl)?;
            json!({ "entry": entry })
        }
        Command::Purge => json!({ "purged": store.purge_expired()? }),
        Command::Top { limit } => json!({ "entries": store.top_entries(limit)? }),
        Command::Clear => json!({ "cleared": store.clear()? }),
        Command::Sweep { .. } => anyhow::bail!("sweep is a long-running command"),
    };

    Ok(output)
}

async fn sweep(store: Arc<dyn CacheStore>, interval: Duration) -> Result<()> {
    let token = CancellationToken::new();
    let handle = spawn_sweeper(store, interval, token.clone());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping sweeper");

    token.cancel();
    handle.await?;
    Ok(())
}
