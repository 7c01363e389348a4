//! Result types returned to callers of the analysis pipeline.
//!
//! Field names serialize in snake_case and are part of the cached JSON format.

use serde::{Deserialize, Serialize};

use crate::run_supervisor::RunToken;

/// One user-initiated analysis. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub url: String,
    pub run: RunToken,
    /// Skip the cache read and force-refresh the reference dataset
    pub bypass_cache: bool,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>, run: RunToken, bypass_cache: bool) -> Self {
        Self {
            url: url.into(),
            run,
            bypass_cache,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub tagline: String,
    pub domain: String,
    pub primary_color: String,
    pub industry_tag: String,
    pub summary: String,
    pub logo_prompt: String,
    pub generated_logo: String,
    pub hero_image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcpPersona {
    pub name: String,
    pub role: String,
    pub avatar_id: String,
    pub bio_snack: String,
    pub pain_points: Vec<String>,
    pub location: String,
    pub company_size: String,
    pub interests: Vec<String>,
    pub preferred_channel: Vec<String>,
    pub avoid_channel: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueHook {
    pub one_liner: String,
    pub social_media_headline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub total_leads: u32,
    pub confidence_score: u32,
}

/// Complete analysis output. Always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company_profile: CompanyProfile,
    pub icp_persona: IcpPersona,
    pub value_hook: ValueHook,
    pub market_data: MarketData,
    #[serde(default)]
    pub is_hard_reset: bool,
}
