//! Cache management commands for the spades-icp CLI
//!
//! List, show and clear the analysis results stored by [`ResultCache`].

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::avatar::AvatarResolver;
use crate::cli::OutputFormat;
use crate::domain_utils::cache_key_domain;
use crate::logger::print_analysis_summary;
use crate::result_cache::ResultCache;

/// List all cached domains
pub async fn list_cached_domains(cache: &ResultCache) -> Result<()> {
    let entries = cache
        .entries()
        .await
        .with_context(|| format!("Failed to read cache directory {}", cache.dir().display()))?;

    if entries.is_empty() {
        println!("No cached analyses found. Run `spades-icp analyze <URL>` to create one.");
        return Ok(());
    }

    println!("Cached Analyses ({} total):", entries.len());
    println!("{}", "=".repeat(80));
    println!("{:<32} {:<25} {:<10} {}", "Domain", "Cached At", "Status", "Company");
    println!("{}", "-".repeat(80));

    for entry in entries {
        let cached_at = entry
            .timestamp
            .map(format_timestamp)
            .unwrap_or_else(|| "Unknown".to_string());
        let status = match (entry.timestamp, entry.expired) {
            (None, _) => "invalid",
            (Some(_), true) => "expired",
            (Some(_), false) => "valid",
        };
        let company = entry.company.unwrap_or_else(|| "-".to_string());

        println!("{:<32} {:<25} {:<10} {}", entry.domain, cached_at, status, company);
    }

    Ok(())
}

/// Show the cached result for a domain (expired entries are purged, not shown)
pub async fn show_cache_entry(cache: &ResultCache, domain: &str, format: OutputFormat) -> Result<()> {
    let key = cache_key_domain(domain);
    let Some(result) = cache.get(&key).await else {
        bail!("No valid cache entry found for: {}", key);
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let avatar = AvatarResolver::for_result(&result, Utc::now().timestamp_millis()).display();
            print_analysis_summary(&result, &avatar, "cached")
        }
    }
    Ok(())
}

/// Clear the cached result for one domain
pub async fn clear_domain_cache(cache: &ResultCache, domain: &str) -> Result<()> {
    let key = cache_key_domain(domain);
    let removed = cache
        .remove(&key)
        .await
        .with_context(|| format!("Failed to clear cache for {}", key))?;

    if !removed {
        bail!("No cache entry found for: {}", key);
    }
    println!("Successfully cleared cache for: {}", key);
    Ok(())
}

/// Clear all cached results
pub async fn clear_all_cache(cache: &ResultCache) -> Result<()> {
    let count = cache.clear().await.context("Failed to clear cache")?;
    if count > 0 {
        println!("Successfully cleared {} cache entries.", count);
    } else {
        println!("No cache entries to clear.");
    }
    Ok(())
}

fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "Invalid timestamp".to_string(),
    }
}
