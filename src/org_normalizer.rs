//! Company name normalization
//!
//! Cleans raw names from site metadata into display names:
//! - Trailing legal-entity suffixes: Inc, LLC, Ltd, GmbH, B.V., S.A., PLC, Corp, ...
//! - Trailing hostname / common TLD suffixes ("Acme.com" -> "Acme")
//! - Wrapping quotes and repeated whitespace
//! - ALL CAPS or all lower-case names re-cased to "Capitalized rest-lower"

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain_utils::first_label;
use crate::metadata::SiteMetadata;

static LEGAL_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s(Inc|LLC|Ltd|Limited|GmbH|B\.V\.|BV|S\.A\.|SA|SAS|PLC|Corp|Corporation)[.,]?$")
        .unwrap()
});

static COMMON_TLD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(com|io|ai|net|org|co|uk|de|nl|fr|gov|edu|me|app|tech)$").unwrap()
});

static WRAPPING_QUOTES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^["']|["']$"#).unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Separators that split a page title into "Brand | Tagline" style segments
const TITLE_SEPARATORS: &[char] = &['|', '-', '•', ':'];

/// Normalize a raw company name for display. Returns an empty string for empty input;
/// callers fall back to the hostname's first label.
pub fn normalize_company_name(raw: &str, hostname: &str) -> String {
    let mut clean = raw.trim().to_string();
    if clean.is_empty() {
        return clean;
    }

    clean = LEGAL_SUFFIX_REGEX.replace(&clean, "").into_owned();

    let ends_with_host =
        !hostname.is_empty() && clean.to_lowercase().ends_with(&hostname.to_lowercase());
    if ends_with_host || COMMON_TLD_REGEX.is_match(&clean) {
        clean = COMMON_TLD_REGEX.replace(&clean, "").into_owned();
    }

    clean = WRAPPING_QUOTES_REGEX.replace_all(&clean, "").into_owned();
    clean = WHITESPACE_REGEX.replace_all(&clean, " ").into_owned();

    if clean == clean.to_uppercase() || clean == clean.to_lowercase() {
        clean = recase(&clean);
    }

    clean.trim().to_string()
}

/// First character upper-cased, the rest lower-cased
fn recase(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}

/// Pick a display name from site metadata: publisher, then site name, then the first
/// segment of the page title. Falls back to the hostname's first label.
pub fn derive_company_name(metadata: Option<&SiteMetadata>, hostname: &str) -> String {
    let raw = metadata
        .and_then(|meta| {
            [meta.publisher.as_deref(), meta.site_name.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|name| !name.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    meta.title
                        .as_deref()
                        .and_then(|title| title.split(TITLE_SEPARATORS).next())
                        .map(str::to_string)
                })
        })
        .unwrap_or_default();

    let normalized = normalize_company_name(&raw, hostname);
    if normalized.is_empty() {
        let fallback = first_label(hostname).to_string();
        debug!("No usable company name for {}, using '{}'", hostname, fallback);
        fallback
    } else {
        normalized
    }
}
