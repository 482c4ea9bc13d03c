//! Cache command - inspect and clear cache buckets

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::AgentResult;
use crate::request::CacheKey;
use crate::storage::{CacheStorage, DiskCacheStorage};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use tracing::debug;

/// Bucket summary for listings
#[derive(Debug, Serialize)]
struct BucketSummary {
    name: String,
    entries: usize,
    current: bool,
}

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> AgentResult<()> {
    let storage = DiskCacheStorage::new(config.storage.caches_dir());
    debug!("Cache root: {}", storage.root().display());

    match args.action {
        CacheAction::List { format } => list_buckets(&storage, config, format).await,
        CacheAction::Show { bucket, format } => {
            let name = bucket.unwrap_or_else(|| config.agent.generation.clone());
            show_bucket(&storage, &name, format).await
        }
        CacheAction::Clear { yes } => {
            let ctx = UiContext::detect().with_auto_yes(yes);
            clear_buckets(&ctx, &storage).await
        }
    }
}

async fn summarize(storage: &dyn CacheStorage, current: &str) -> AgentResult<Vec<BucketSummary>> {
    let mut summaries = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.open(&name).await?.keys().await?.len();
        summaries.push(BucketSummary {
            current: name == current,
            name,
            entries,
        });
    }
    Ok(summaries)
}

/// List buckets with entry counts
async fn list_buckets(
    storage: &dyn CacheStorage,
    config: &Config,
    format: OutputFormat,
) -> AgentResult<()> {
    let buckets = summarize(storage, &config.agent.generation).await?;

    if buckets.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No caches found");
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_bucket_table(&buckets),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&buckets)?),
        OutputFormat::Plain => {
            for bucket in &buckets {
                println!("{}", bucket.name);
            }
        }
    }

    Ok(())
}

fn print_bucket_table(buckets: &[BucketSummary]) {
    println!(
        "{:<32} {:<10} {:<10}",
        style("CACHE").bold(),
        style("ENTRIES").bold(),
        style("STATUS").bold()
    );
    println!("{}", "-".repeat(52));

    for bucket in buckets {
        let status = if bucket.current {
            style("current").green()
        } else {
            style("stale").dim()
        };
        println!("{:<32} {:<10} {:<10}", bucket.name, bucket.entries, status);
    }

    println!();
    println!("Total: {} cache(s)", buckets.len());
}

/// List the keys stored in one bucket
async fn show_bucket(storage: &dyn CacheStorage, name: &str, format: OutputFormat) -> AgentResult<()> {
    let keys: Vec<CacheKey> = if storage.has(name).await? {
        storage.open(name).await?.keys().await?
    } else {
        Vec::new()
    };

    match format {
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, name);
            if keys.is_empty() {
                ui::step_info(&ctx, "No entries");
            }
            for key in &keys {
                println!("  {} {}", style(key.method.as_str()).cyan(), key.url);
            }
        }
        OutputFormat::Json => {
            let urls: Vec<String> = keys.iter().map(|k| k.url.to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        OutputFormat::Plain => {
            for key in &keys {
                println!("{}", key.url);
            }
        }
    }

    Ok(())
}

/// Delete every bucket
async fn clear_buckets(ctx: &UiContext, storage: &dyn CacheStorage) -> AgentResult<()> {
    let names = storage.keys().await?;

    if names.is_empty() {
        ui::step_info(ctx, "No caches to clear");
        return Ok(());
    }

    println!("This will delete {} cache(s):", names.len());
    for name in &names {
        println!("  {} {}", style("•").red(), name);
    }
    println!();

    if !ui::confirm(ctx, "Delete these caches?", false).await? {
        ui::step_warn_hint(ctx, "Nothing deleted", "Pass --yes to skip the prompt");
        return Ok(());
    }

    let mut removed = 0;
    for name in &names {
        if storage.delete(name).await? {
            removed += 1;
        }
    }

    ui::outro_success(ctx, &format!("Cleared {} cache(s)", removed));
    Ok(())
}
