//! Persona reference dataset
//!
//! The dataset is a remotely published CSV export with one persona per row. It is
//! fetched once, parsed into [`ReferenceRow`]s and kept in an owned [`DatasetCache`]
//! so every later analysis is served from memory. A forced refresh clears the cached
//! snapshot first and busts any transport cache on the way to the source.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain_utils::append_query_param;

/// Rows with fewer fields than this are dropped at parse time
pub const MIN_FIELDS: usize = 11;

/// One persona record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRow {
    pub id: String,
    pub industry: String,
    pub persona_first_name: String,
    pub job_title: String,
    pub company_size: String,
    pub bio: String,
    pub challenges: Vec<String>,
    pub interests: Vec<String>,
    pub preferred_channels: Vec<String>,
    pub avoid_channels: Vec<String>,
    pub avatar_identifier: String,
}

impl ReferenceRow {
    /// Persona used when the dataset could not be loaded at all
    pub fn fallback() -> Self {
        Self {
            id: "ICP-1".to_string(),
            industry: "Technology".to_string(),
            persona_first_name: "Alex".to_string(),
            job_title: "Head of Growth".to_string(),
            company_size: "50-200".to_string(),
            bio: "Owns pipeline targets and evaluates new tooling every quarter.".to_string(),
            challenges: vec![
                "Predictable pipeline".to_string(),
                "Proving ROI".to_string(),
            ],
            interests: vec!["Productivity".to_string()],
            preferred_channels: vec!["LinkedIn".to_string(), "Email".to_string()],
            avoid_channels: vec!["Cold calls".to_string()],
            avatar_identifier: String::new(),
        }
    }

    /// Case-insensitive id comparison, ignoring surrounding whitespace
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.trim().to_lowercase() == id.trim().to_lowercase()
    }
}

/// Split a multi-value cell on `|` or `,`, trimming pieces and dropping empty ones
pub fn split_multi_value(field: &str) -> Vec<String> {
    field
        .split(|c| c == '|' || c == ',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split one export line on commas outside quotes. A `"` anywhere toggles the
/// quoted state and is itself dropped; fields are trimmed.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in line.chars() {
        match c {
            '"' => in_quote = !in_quote,
            ',' if !in_quote => fields.push(finish_field(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(finish_field(&mut current));
    fields
}

fn finish_field(current: &mut String) -> String {
    let field = std::mem::take(current);
    let field = field.strip_prefix('"').unwrap_or(&field);
    let field = field.strip_suffix('"').unwrap_or(field);
    field.trim().to_string()
}

/// Parse CSV text into trimmed field lists, one per line. The header line is always
/// discarded and blank lines are skipped; rows may have any number of fields. Quoted
/// fields never span lines.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(split_record)
        .collect()
}

/// Parse the dataset export into persona rows.
///
/// Short rows are dropped silently. A row with an empty id is assigned `ICP-<n>`,
/// where `n` is its 1-based position among kept rows. Later rows repeating an
/// existing id are dropped so ids stay unique within a snapshot.
pub fn parse_dataset(text: &str) -> Vec<ReferenceRow> {
    let mut rows: Vec<ReferenceRow> = Vec::new();
    let mut seen_ids = HashSet::new();

    for fields in parse_records(text) {
        if fields.len() < MIN_FIELDS {
            continue;
        }

        let id = match fields[0].as_str() {
            "" => format!("ICP-{}", rows.len() + 1),
            id => id.to_string(),
        };
        if !seen_ids.insert(id.to_lowercase()) {
            debug!("Dropping dataset row with duplicate id {}", id);
            continue;
        }

        rows.push(ReferenceRow {
            id,
            industry: fields[1].clone(),
            persona_first_name: fields[2].clone(),
            job_title: fields[3].clone(),
            company_size: fields[4].clone(),
            bio: fields[5].clone(),
            challenges: split_multi_value(&fields[6]),
            interests: split_multi_value(&fields[7]),
            preferred_channels: split_multi_value(&fields[8]),
            avoid_channels: split_multi_value(&fields[9]),
            avatar_identifier: fields[10].clone(),
        });
    }

    rows
}

/// Process-wide dataset snapshot: either absent or a complete row list.
/// Writers replace the whole snapshot, never individual rows.
#[derive(Debug, Default)]
pub struct DatasetCache {
    snapshot: RwLock<Option<Arc<Vec<ReferenceRow>>>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<Vec<ReferenceRow>>> {
        self.snapshot.read().await.clone()
    }

    pub async fn replace(&self, rows: Arc<Vec<ReferenceRow>>) {
        *self.snapshot.write().await = Some(rows);
    }

    pub async fn clear(&self) {
        *self.snapshot.write().await = None;
    }
}

/// Fetches the dataset export and keeps the parsed snapshot in memory
#[derive(Debug)]
pub struct DatasetLoader {
    client: reqwest::Client,
    source_url: String,
    cache: DatasetCache,
}

impl DatasetLoader {
    pub fn new(client: reqwest::Client, source_url: impl Into<String>) -> Self {
        Self {
            client,
            source_url: source_url.into(),
            cache: DatasetCache::new(),
        }
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    /// Return the dataset snapshot.
    ///
    /// Without `force_refresh` a non-empty cached snapshot is returned without network
    /// access. With it, the snapshot is cleared before a cache-busted reload. Fetch
    /// failures yield an empty list and leave the cache absent, so the next plain call
    /// tries the network again.
    pub async fn load(&self, force_refresh: bool) -> Arc<Vec<ReferenceRow>> {
        if force_refresh {
            self.cache.clear().await;
        } else if let Some(rows) = self.cache.get().await {
            if !rows.is_empty() {
                return rows;
            }
        }

        let url = if force_refresh {
            append_query_param(
                &self.source_url,
                "cb",
                &Utc::now().timestamp_millis().to_string(),
            )
        } else {
            self.source_url.clone()
        };

        match self.fetch_text(&url, force_refresh).await {
            Ok(text) => {
                let rows = Arc::new(parse_dataset(&text));
                info!(
                    "Loaded {} persona rows (force_refresh={})",
                    rows.len(),
                    force_refresh
                );
                self.cache.replace(rows.clone()).await;
                rows
            }
            Err(e) => {
                warn!("Failed to fetch persona dataset: {}", e);
                Arc::new(Vec::new())
            }
        }
    }

    async fn fetch_text(&self, url: &str, no_store: bool) -> anyhow::Result<String> {
        debug!("Fetching persona dataset: {}", url);

        let mut request = self.client.get(url);
        if no_store {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Non-success status {} for {}", response.status(), url);
        }
        Ok(response.text().await?)
    }
}
