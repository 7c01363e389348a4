//! Persona avatar resolution
//!
//! One raw image identifier (usually a file-hosting share link) is expanded into an
//! ordered list of candidate URLs. The renderer tries them in order; each load failure
//! advances to the next candidate and an exhausted list ends in a neutral placeholder
//! showing the persona's initials.

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::domain_utils::append_query_param;
use crate::model::AnalysisResult;

static SHARE_PATH_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]{25,})").unwrap());

static SHARE_QUERY_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]{25,})").unwrap());

static PROTOCOL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+:)?//").unwrap());

const DIRECT_CONTENT_BASE: &str = "https://drive.google.com/uc?export=view&id=";
const CDN_BASE: &str = "https://lh3.googleusercontent.com/d/";
const PROXY_BASE: &str = "https://images.weserv.nl/?url=";
const IMAGE_WIDTH: u32 = 512;

/// Characters a URI component leaves unescaped: alphanumerics and `-_.!~*'()`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Initials shown when the persona has no usable name
pub const DEFAULT_INITIALS: &str = "DM";

/// Content id of a file-hosting share link (`/d/<id>` or `id=<id>`)
pub fn share_link_id(url: &str) -> Option<&str> {
    SHARE_PATH_ID_REGEX
        .captures(url)
        .or_else(|| SHARE_QUERY_ID_REGEX.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Rewrite a share link to its direct-content URL; other URLs come back unchanged
pub fn direct_content_url(url: &str) -> String {
    match share_link_id(url) {
        Some(id) => format!("{}{}", DIRECT_CONTENT_BASE, id),
        None => url.to_string(),
    }
}

/// `https://host/path` -> `host/path`
pub fn strip_protocol(url: &str) -> &str {
    match PROTOCOL_REGEX.find(url) {
        Some(m) => &url[m.end()..],
        None => url,
    }
}

/// Image-proxy URL wrapping the protocol-stripped form of `url`
pub fn proxy_url(url: &str) -> String {
    let encoded = utf8_percent_encode(strip_protocol(url), URI_COMPONENT);
    format!("{}{}&w={}", PROXY_BASE, encoded, IMAGE_WIDTH)
}

/// Trim and drop one wrapping quote character at either end
pub fn clean_identifier(raw: &str) -> &str {
    let is_quote = |c: char| c == '"' || c == '\'';
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(is_quote).unwrap_or(trimmed);
    trimmed.strip_suffix(is_quote).unwrap_or(trimmed)
}

/// Cache-busting token: the current time on a hard reset, otherwise derived from the
/// domain so ordinary re-renders request identical URLs.
pub fn cache_bust_token(domain: &str, hard_reset: bool, now_ms: i64) -> String {
    if hard_reset {
        now_ms.to_string()
    } else {
        domain.len().to_string()
    }
}

/// Ordered, de-duplicated candidate URLs for one raw identifier, each with `v=<bust>`
pub fn build_candidates(raw: &str, bust: &str) -> Vec<String> {
    let clean = clean_identifier(raw);
    if clean.is_empty() {
        return Vec::new();
    }

    let direct = direct_content_url(clean);
    let mut candidates = vec![clean.to_string()];

    if direct != clean {
        candidates.push(direct.clone());
    }
    if let Some(id) = share_link_id(clean) {
        candidates.push(format!("{}{}=w{}", CDN_BASE, id, IMAGE_WIDTH));
    }
    candidates.push(proxy_url(&direct));
    if clean != direct {
        candidates.push(proxy_url(clean));
    }

    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }

    unique
        .into_iter()
        .map(|url| append_query_param(&url, "v", bust))
        .collect()
}

/// Up to two upper-cased initials of `name`, or [`DEFAULT_INITIALS`]
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        DEFAULT_INITIALS.to_string()
    } else {
        letters
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarState {
    /// Raw identifier is empty
    NoImage,
    /// Loading candidate `i`
    Attempting(usize),
    /// Candidate `i` loaded
    Shown(usize),
    /// Every candidate failed
    Placeholder,
}

impl AvatarState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AvatarState::Attempting(_))
    }

    pub fn shows_placeholder(&self) -> bool {
        matches!(self, AvatarState::NoImage | AvatarState::Placeholder)
    }
}

/// What the renderer displays for a persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvatarDisplay {
    Image { url: String, attempt: usize },
    Placeholder { initials: String },
}

impl fmt::Display for AvatarDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvatarDisplay::Image { url, .. } => write!(f, "{}", url),
            AvatarDisplay::Placeholder { initials } => write!(f, "placeholder ({})", initials),
        }
    }
}

/// Candidate list plus the current position in it
#[derive(Debug, Clone)]
pub struct AvatarResolver {
    raw: String,
    persona_name: String,
    bust: String,
    candidates: Vec<String>,
    state: AvatarState,
}

impl AvatarResolver {
    pub fn new(raw: &str, persona_name: &str, bust: impl Into<String>) -> Self {
        let bust = bust.into();
        let candidates = build_candidates(raw, &bust);
        let state = Self::initial_state(&candidates);
        if !candidates.is_empty() {
            info!(
                name = %persona_name,
                raw = %raw.trim(),
                candidates = candidates.len(),
                "Avatar candidates built"
            );
        }
        Self {
            raw: raw.trim().to_string(),
            persona_name: persona_name.to_string(),
            bust,
            candidates,
            state,
        }
    }

    /// Resolver over an already built candidate list
    pub fn from_candidates(persona_name: &str, candidates: Vec<String>) -> Self {
        let state = Self::initial_state(&candidates);
        Self {
            raw: candidates.first().cloned().unwrap_or_default(),
            persona_name: persona_name.to_string(),
            bust: String::new(),
            candidates,
            state,
        }
    }

    /// Resolver for the persona of a finished analysis
    pub fn for_result(result: &AnalysisResult, now_ms: i64) -> Self {
        let bust = cache_bust_token(&result.company_profile.domain, result.is_hard_reset, now_ms);
        Self::new(&result.icp_persona.avatar_id, &result.icp_persona.name, bust)
    }

    fn initial_state(candidates: &[String]) -> AvatarState {
        if candidates.is_empty() {
            AvatarState::NoImage
        } else {
            AvatarState::Attempting(0)
        }
    }

    pub fn state(&self) -> AvatarState {
        self.state
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// URL the renderer should currently display, if any
    pub fn current_source(&self) -> Option<&str> {
        match self.state {
            AvatarState::Attempting(i) | AvatarState::Shown(i) => {
                self.candidates.get(i).map(String::as_str)
            }
            AvatarState::NoImage | AvatarState::Placeholder => None,
        }
    }

    pub fn placeholder_initials(&self) -> String {
        initials(&self.persona_name)
    }

    /// Current display: the candidate being shown (or loading), else the placeholder
    pub fn display(&self) -> AvatarDisplay {
        match self.state {
            AvatarState::Attempting(i) | AvatarState::Shown(i) => match self.candidates.get(i) {
                Some(url) => AvatarDisplay::Image {
                    url: url.clone(),
                    attempt: i,
                },
                None => self.placeholder(),
            },
            AvatarState::NoImage | AvatarState::Placeholder => self.placeholder(),
        }
    }

    fn placeholder(&self) -> AvatarDisplay {
        AvatarDisplay::Placeholder {
            initials: self.placeholder_initials(),
        }
    }

    pub fn on_load_success(&mut self) -> AvatarState {
        if let AvatarState::Attempting(i) = self.state {
            self.state = AvatarState::Shown(i);
        }
        self.state
    }

    /// Advance past the failed candidate; terminal states are left unchanged
    pub fn on_load_failure(&mut self) -> AvatarState {
        if let AvatarState::Attempting(i) = self.state {
            warn!(
                name = %self.persona_name,
                attempt = i,
                url = self.candidates.get(i).map(String::as_str).unwrap_or(""),
                "Avatar candidate failed to load"
            );
            self.state = if i + 1 < self.candidates.len() {
                AvatarState::Attempting(i + 1)
            } else {
                AvatarState::Placeholder
            };
        }
        self.state
    }

    /// Rebuild and restart when the identifier, persona or bust token changed.
    /// Returns whether a reset happened.
    pub fn update(&mut self, raw: &str, persona_name: &str, bust: &str) -> bool {
        if self.raw == raw.trim() && self.persona_name == persona_name && self.bust == bust {
            return false;
        }
        *self = Self::new(raw, persona_name, bust);
        true
    }

    /// Drive the machine to a terminal state with a synchronous loader
    pub fn resolve_with<F>(&mut self, mut loads: F) -> AvatarState
    where
        F: FnMut(&str) -> bool,
    {
        while let AvatarState::Attempting(i) = self.state {
            let ok = loads(&self.candidates[i]);
            if ok {
                self.on_load_success();
            } else {
                self.on_load_failure();
            }
        }
        self.state
    }

    /// Drive the machine by fetching each candidate over HTTP. A candidate counts as
    /// loaded when it answers 2xx with an `image/*` content type.
    pub async fn probe(&mut self, client: &reqwest::Client) -> AvatarState {
        while let AvatarState::Attempting(i) = self.state {
            let url = self.candidates[i].clone();
            let loaded = match client.get(&url).send().await {
                Ok(response) => {
                    let is_image = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(|v| v.starts_with("image/"))
                        .unwrap_or(false);
                    response.status().is_success() && is_image
                }
                Err(e) => {
                    debug!("Avatar request failed for {}: {}", url, e);
                    false
                }
            };
            if loaded {
                self.on_load_success();
            } else {
                self.on_load_failure();
            }
        }
        self.state
    }
}
