//! Logging setup and console summaries
//!
//! Diagnostics go through `tracing` to stderr; results are printed to stdout so they
//! can be piped.

use std::fmt::Write as _;
use tracing_subscriber::EnvFilter;

use crate::avatar::AvatarDisplay;
use crate::model::AnalysisResult;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,  // Warnings and errors only (default)
    Detailed = 1, // Pipeline steps: cache, classifier mode, hero/city/persona selection
    Debug = 2,    // Everything, including request-level details
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "spades_icp=warn",
            VerbosityLevel::Detailed => "spades_icp=info",
            VerbosityLevel::Debug => "spades_icp=debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `-v` flags.
pub fn init_logging(verbosity: VerbosityLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// Human-readable rendering of one analysis result
pub fn format_analysis_summary(result: &AnalysisResult, avatar: &AvatarDisplay, source: &str) -> String {
    let company = &result.company_profile;
    let persona = &result.icp_persona;
    let mut out = String::new();

    let _ = writeln!(out, "\n=== ICP ANALYSIS ({}) ===", source);
    let _ = writeln!(out, "Company:        {} ({})", company.name, company.domain);
    let _ = writeln!(out, "Tagline:        {}", company.tagline);
    let _ = writeln!(out, "Industry:       {}", company.industry_tag);
    let _ = writeln!(out, "Summary:        {}", company.summary);
    let _ = writeln!(out, "Logo:           {}", company.generated_logo);
    let _ = writeln!(out, "Hero image:     {}", company.hero_image);
    let _ = writeln!(out);
    let _ = writeln!(out, "Persona:        {}, {}", persona.name, persona.role);
    let _ = writeln!(out, "Avatar:         {}", avatar);
    let _ = writeln!(out, "Location:       {}", persona.location);
    let _ = writeln!(out, "Company size:   {}", persona.company_size);
    let _ = writeln!(out, "Bio:            {}", persona.bio_snack);
    let _ = writeln!(out, "Pain points:    {}", join_or_dash(&persona.pain_points));
    let _ = writeln!(out, "Interests:      {}", join_or_dash(&persona.interests));
    let _ = writeln!(out, "Reach via:      {}", join_or_dash(&persona.preferred_channel));
    let _ = writeln!(out, "Avoid:          {}", join_or_dash(&persona.avoid_channel));
    let _ = writeln!(
        out,
        "Market:         {} leads, {}% confidence",
        result.market_data.total_leads, result.market_data.confidence_score
    );
    let _ = writeln!(out, "==========================");
    out
}

pub fn print_analysis_summary(result: &AnalysisResult, avatar: &AvatarDisplay, source: &str) {
    print!("{}", format_analysis_summary(result, avatar, source));
}
