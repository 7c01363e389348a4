//! URL and hostname helpers shared by the pipeline, the geographic resolver and the
//! result cache.

use url::Url;

/// Parse user input into an absolute URL. Input without an `http` prefix is treated as
/// an `https://` address. A URL without a host is rejected.
pub fn parse_target_url(input: &str) -> Result<Url, url::ParseError> {
    let trimmed = input.trim();
    let candidate = if trimmed.to_ascii_lowercase().starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(url::ParseError::EmptyHost),
    }
}

/// Lower-cased host of a parsed URL (may still carry a `www.` prefix)
pub fn hostname(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_lowercase()
}

/// Strip a leading `www.` (case-insensitive)
pub fn bare_hostname(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

/// Last DNS label, lower-cased (`example.co.uk` -> `uk`)
pub fn top_level_domain(host: &str) -> Option<String> {
    host.trim_end_matches('.')
        .rsplit('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(|label| label.to_lowercase())
}

/// First DNS label of the bare hostname (`www.acme.com` -> `acme`)
pub fn first_label(host: &str) -> &str {
    bare_hostname(host).split('.').next().unwrap_or_default()
}

/// Cache key for raw user input: lower-cased, scheme and `www.` removed, path dropped.
pub fn cache_key_domain(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.split('/').next().unwrap_or_default().to_string()
}

/// Append `key=value` to a URL string, choosing `?` or `&` as the separator.
pub fn append_query_param(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, key, value)
}
