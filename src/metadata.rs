//! Site metadata enrichment
//!
//! Fetches title, description, publisher and imagery for a URL from an external
//! metadata extraction service. The call is best-effort: any failure yields `None`
//! and is never retried. Also selects the hero image and logo shown with a result.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hashing::stable_hash;

/// Hero images used when the site has no suitable image of its own
pub const FALLBACK_HEROES: &[&str] = &[
    "https://images.unsplash.com/photo-1451187580459-43490279c0fa?q=80&w=1600&auto=format&fit=crop",
    "https://images.unsplash.com/photo-1486406146926-c627a92ad1ab?q=80&w=1600&auto=format&fit=crop",
    "https://images.unsplash.com/photo-1497366216548-37526070297c?q=80&w=1600&auto=format&fit=crop",
    "https://images.unsplash.com/photo-1504384308090-c894fdcc538d?q=80&w=1600&auto=format&fit=crop",
];

/// Minimum width for a site image to be used as hero
pub const MIN_HERO_WIDTH: f64 = 1200.0;

/// Metadata returned by the extraction service (all fields optional)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub logo: Option<ImageRef>,
}

impl SiteMetadata {
    /// Description, if present and not blank
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }
}

/// An image given either as a bare URL or as an object with dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Detailed {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
}

impl ImageRef {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Url(url) => non_blank(Some(url)),
            ImageRef::Detailed { url, .. } => non_blank(url.as_deref()),
        }
    }

    /// Width, treating zero as unknown
    pub fn width(&self) -> Option<f64> {
        match self {
            ImageRef::Detailed { width, .. } => width.filter(|w| *w > 0.0),
            ImageRef::Url(_) => None,
        }
    }

    /// Height, treating zero as unknown
    pub fn height(&self) -> Option<f64> {
        match self {
            ImageRef::Detailed { height, .. } => height.filter(|h| *h > 0.0),
            ImageRef::Url(_) => None,
        }
    }

    /// Landscape when both dimensions are known, otherwise assumed landscape
    pub fn is_landscape(&self) -> bool {
        match (self.width(), self.height()) {
            (Some(w), Some(h)) => w > h,
            _ => true,
        }
    }

    /// Large when the width is known to be at least [`MIN_HERO_WIDTH`], or unknown
    pub fn is_large(&self) -> bool {
        self.width().map_or(true, |w| w >= MIN_HERO_WIDTH)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Client for the metadata extraction service
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl MetadataFetcher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch metadata for `target_url`. Network errors, non-success statuses and
    /// unparseable bodies all yield `None`.
    pub async fn fetch(&self, target_url: &str) -> Option<SiteMetadata> {
        debug!("Fetching site metadata for {}", target_url);

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("url", target_url)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Metadata request failed for {}: {}", target_url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(
                "Metadata service returned {} for {}",
                response.status(),
                target_url
            );
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Metadata body for {} is not JSON: {}", target_url, e);
                return None;
            }
        };

        parse_metadata_body(body)
    }
}

/// Accept either a `{ "data": {...} }` envelope or the bare metadata object
pub fn parse_metadata_body(body: serde_json::Value) -> Option<SiteMetadata> {
    let payload = match body {
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(data @ serde_json::Value::Object(_)) => data,
            Some(_) => return None,
            None => serde_json::Value::Object(map),
        },
        _ => return None,
    };

    match serde_json::from_value(payload) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            debug!("Metadata payload has unexpected shape: {}", e);
            None
        }
    }
}

/// Where the hero image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeroSource {
    Website,
    Fallback { index: usize },
}

impl std::fmt::Display for HeroSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeroSource::Website => write!(f, "website"),
            HeroSource::Fallback { index } => write!(f, "fallback index={}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroImage {
    pub url: String,
    pub source: HeroSource,
}

/// Use the site image when it is a large landscape raster image, otherwise a
/// fallback hero picked by `stable_hash(host)`.
pub fn select_hero_image(metadata: Option<&SiteMetadata>, host: &str) -> HeroImage {
    let site_image = metadata
        .and_then(|meta| meta.image.as_ref())
        .and_then(|image| image.url().map(|url| (url, image)))
        .filter(|(url, image)| !url.contains(".svg") && image.is_landscape() && image.is_large());

    let hero = match site_image {
        Some((url, _)) => HeroImage {
            url: url.to_string(),
            source: HeroSource::Website,
        },
        None => {
            let index = stable_hash(host) as usize % FALLBACK_HEROES.len();
            HeroImage {
                url: FALLBACK_HEROES[index].to_string(),
                source: HeroSource::Fallback { index },
            }
        }
    };

    info!(source = %hero.source, url = %hero.url, "Hero image selected");
    hero
}

/// Site logo, or the favicon service URL for `host`
pub fn resolve_logo(metadata: Option<&SiteMetadata>, host: &str) -> String {
    metadata
        .and_then(|meta| meta.logo.as_ref())
        .and_then(ImageRef::url)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://www.google.com/s2/favicons?domain={}&sz=256", host))
}
