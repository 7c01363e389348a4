//! File-backed cache of finished analysis results
//!
//! Each domain gets one JSON file `<dir>/<prefix><domain>.json` holding
//! `{ "timestamp": <unix millis>, "data": <AnalysisResult> }`. Entries older than the
//! TTL are treated as absent and deleted on the read that notices. Writes always
//! overwrite and go through a temporary file plus rename, so a reader never sees a
//! half-written entry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::model::AnalysisResult;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// Unix time in milliseconds when the entry was written
    pub timestamp: i64,
    pub data: AnalysisResult,
}

impl CachedEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }
}

/// Summary row for `cache list`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheListing {
    pub domain: String,
    pub timestamp: Option<i64>,
    pub company: Option<String>,
    pub expired: bool,
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    key_prefix: String,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.dir.clone(), config.key_prefix.clone(), config.ttl())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `<prefix><lower-cased domain>`
    pub fn storage_key(&self, domain: &str) -> String {
        format!("{}{}", self.key_prefix, domain.trim().to_lowercase())
    }

    /// File path for a domain's entry; the key is sanitized to `[A-Za-z0-9._-]`
    pub fn entry_path(&self, domain: &str) -> PathBuf {
        let safe_key: String = self
            .storage_key(domain)
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        let safe_key = safe_key.replace("..", "_");
        self.dir.join(format!("{}.json", safe_key))
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, entry: &CachedEntry, now_ms: i64) -> bool {
        entry.age_ms(now_ms) > self.ttl_ms()
    }

    /// Cached result for `domain`, if present and not expired
    pub async fn get(&self, domain: &str) -> Option<AnalysisResult> {
        self.get_at(domain, Utc::now().timestamp_millis()).await
    }

    /// Lookup relative to an explicit clock. Unreadable or corrupt entries count as misses.
    pub async fn get_at(&self, domain: &str, now_ms: i64) -> Option<AnalysisResult> {
        let path = self.entry_path(domain);
        let entry = match self.read_entry(&path).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(domain = %domain, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(domain = %domain, "Ignoring unreadable cache entry: {}", e);
                return None;
            }
        };

        if self.is_expired(&entry, now_ms) {
            info!(
                domain = %domain,
                age_ms = entry.age_ms(now_ms),
                "Cache entry expired, removing"
            );
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!("Failed to remove expired cache entry {:?}: {}", path, e);
            }
            return None;
        }

        info!(domain = %domain, "Cache hit");
        Some(entry.data)
    }

    /// Read and decode an entry file. `Ok(None)` when it does not exist.
    pub async fn read_entry(&self, path: &Path) -> Result<Option<CachedEntry>, CacheError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store `result` for `domain`, replacing any previous entry
    pub async fn put(&self, domain: &str, result: &AnalysisResult) -> Result<(), CacheError> {
        self.put_at(domain, result, Utc::now().timestamp_millis()).await
    }

    pub async fn put_at(
        &self,
        domain: &str,
        result: &AnalysisResult,
        now_ms: i64,
    ) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = CachedEntry {
            timestamp: now_ms,
            data: result.clone(),
        };
        let content = serde_json::to_string_pretty(&entry)?;

        let path = self.entry_path(domain);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(domain = %domain, "Cached analysis result at {:?}", path);
        Ok(())
    }

    /// Delete the entry for `domain`. Returns whether one existed.
    pub async fn remove(&self, domain: &str) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.entry_path(domain)).await {
            Ok(()) => {
                debug!("Cleared cache for domain: {}", domain);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All entries carrying this cache's prefix, newest first
    pub async fn entries(&self) -> Result<Vec<CacheListing>, CacheError> {
        let mut listings = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listings),
            Err(e) => return Err(e.into()),
        };

        let now_ms = Utc::now().timestamp_millis();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(domain) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| stem.strip_prefix(&self.key_prefix))
                .map(str::to_string)
            else {
                continue;
            };

            let listing = match self.read_entry(&path).await {
                Ok(Some(entry)) => CacheListing {
                    domain,
                    timestamp: Some(entry.timestamp),
                    company: Some(entry.data.company_profile.name.clone()),
                    expired: self.is_expired(&entry, now_ms),
                },
                _ => CacheListing {
                    domain,
                    timestamp: None,
                    company: None,
                    expired: false,
                },
            };
            listings.push(listing);
        }

        listings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(listings)
    }

    /// Delete every entry carrying this cache's prefix. Returns the number removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for listing in self.entries().await? {
            if self.remove(&listing.domain).await? {
                removed += 1;
            }
        }
        info!("Cleared {} cached analysis results", removed);
        Ok(removed)
    }
}
