//! Analysis orchestration
//!
//! [`AnalysisPipeline::analyze`] turns one URL into a fully populated
//! [`AnalysisResult`]: metadata and the persona dataset are fetched concurrently, the
//! classifier (when a credential is configured) picks the persona and refines the copy,
//! and the deterministic fallbacks fill in everything else. Only an unparseable URL is
//! an error; every other failure degrades to defaults.
//!
//! [`AnalysisPipeline::start`] is the caller-level flow around it: issue a run token,
//! consult the result cache, run the analysis, drop results of superseded runs and
//! cache fresh ones.

use anyhow::Context;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::avatar::{AvatarDisplay, AvatarResolver};
use crate::classifier::{ClassificationContext, ClassifierClient};
use crate::config::{AppConfig, ResultConfig};
use crate::dataset::{DatasetLoader, ReferenceRow};
use crate::domain_utils::{cache_key_domain, hostname, parse_target_url};
use crate::geo::resolve_city;
use crate::metadata::{resolve_logo, select_hero_image, MetadataFetcher};
use crate::model::{
    AnalysisRequest, AnalysisResult, CompanyProfile, IcpPersona, MarketData, ValueHook,
};
use crate::org_normalizer::derive_company_name;
use crate::result_cache::ResultCache;
use crate::run_supervisor::{RunSupervisor, RunToken};

/// Maximum length of a tagline taken from the site description
const TAGLINE_MAX_CHARS: usize = 100;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid URL '{input}': {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
}

/// What a caller-level run produced
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Served from the result cache
    Cached(AnalysisResult),
    /// Freshly computed and written to the cache
    Fresh(AnalysisResult),
    /// A newer run started (or the pipeline was reset) before this one finished
    Superseded,
}

impl RunOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            RunOutcome::Cached(result) | RunOutcome::Fresh(result) => Some(result),
            RunOutcome::Superseded => None,
        }
    }

    pub fn into_result(self) -> Option<AnalysisResult> {
        match self {
            RunOutcome::Cached(result) | RunOutcome::Fresh(result) => Some(result),
            RunOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, RunOutcome::Superseded)
    }
}

/// Persona row whose id matches `selected_id` (trimmed, case-insensitive), else the
/// first row. `None` only for an empty dataset.
pub fn select_persona<'a>(
    rows: &'a [ReferenceRow],
    selected_id: Option<&str>,
) -> Option<&'a ReferenceRow> {
    selected_id
        .and_then(|id| rows.iter().find(|row| row.matches_id(id)))
        .or_else(|| rows.first())
}

pub struct AnalysisPipeline {
    client: reqwest::Client,
    metadata: MetadataFetcher,
    dataset: DatasetLoader,
    classifier: Option<ClassifierClient>,
    cache: ResultCache,
    supervisor: RunSupervisor,
    result_config: ResultConfig,
}

impl AnalysisPipeline {
    /// Build a pipeline with its own HTTP client. `api_key` of `None` (or blank)
    /// disables the classification step.
    pub fn new(config: &AppConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.request_timeout_secs))
            .user_agent(config.http.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, config, api_key))
    }

    /// Build a pipeline reading the credential from the configured environment variable
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(config, config.classifier.api_key())
    }

    pub fn with_client(client: reqwest::Client, config: &AppConfig, api_key: Option<String>) -> Self {
        let classifier = match ClassifierClient::from_config(client.clone(), config, api_key) {
            Ok(classifier) => Some(classifier),
            Err(e) => {
                info!("Classification disabled: {}", e);
                None
            }
        };

        Self {
            metadata: MetadataFetcher::new(client.clone(), config.sources.metadata_endpoint.clone()),
            dataset: DatasetLoader::new(client.clone(), config.sources.dataset_url.clone()),
            client,
            classifier,
            cache: ResultCache::from_config(&config.cache),
            supervisor: RunSupervisor::new(),
            result_config: config.result.clone(),
        }
    }

    /// Replace the classifier client (or disable classification with `None`)
    pub fn with_classifier(mut self, classifier: Option<ClassifierClient>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn dataset(&self) -> &DatasetLoader {
        &self.dataset
    }

    pub fn supervisor(&self) -> &RunSupervisor {
        &self.supervisor
    }

    pub fn classification_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    /// Warm the persona dataset snapshot. Returns the number of rows loaded.
    pub async fn preload(&self) -> usize {
        self.dataset.load(false).await.len()
    }

    /// Walk the persona's avatar candidates over HTTP and report what ends up shown
    pub async fn resolve_avatar(&self, result: &AnalysisResult) -> AvatarDisplay {
        let mut resolver = AvatarResolver::for_result(result, Utc::now().timestamp_millis());
        let state = resolver.probe(&self.client).await;
        debug!(state = ?state, "Avatar resolved");
        resolver.display()
    }

    /// Forget the current run; anything still in flight will be discarded
    pub fn reset(&self) {
        self.supervisor.reset();
    }

    /// Caller-level run: cache check (unless `hard_reset`), analysis, supersession
    /// checkpoints and cache write.
    pub async fn start(&self, input: &str, hard_reset: bool) -> Result<RunOutcome, PipelineError> {
        parse_target_url(input).map_err(|source| PipelineError::InvalidUrl {
            input: input.to_string(),
            source,
        })?;

        let run = self.supervisor.begin();
        let domain = cache_key_domain(input);
        info!(run = %run, domain = %domain, hard_reset = hard_reset, "Starting analysis");

        if !hard_reset {
            if let Some(cached) = self.cache.get(&domain).await {
                return Ok(self
                    .supervisor
                    .checkpoint(run, "cache", cached)
                    .map(RunOutcome::Cached)
                    .unwrap_or(RunOutcome::Superseded));
            }
        }

        let request = AnalysisRequest::new(input.trim(), run, hard_reset);
        let result = self.analyze(&request).await?;

        let Some(result) = self.supervisor.checkpoint(run, "fresh", result) else {
            return Ok(RunOutcome::Superseded);
        };

        Ok(self.commit(run, &domain, result).await)
    }

    /// Write a checkpointed result to the cache. The run must still be current once the
    /// write finishes for the result to be returned.
    async fn commit(&self, run: RunToken, domain: &str, result: AnalysisResult) -> RunOutcome {
        if let Err(e) = self.cache.put(domain, &result).await {
            warn!(domain = %domain, "Failed to cache analysis result: {}", e);
        }
        self.supervisor
            .checkpoint(run, "cache write", result)
            .map(RunOutcome::Fresh)
            .unwrap_or(RunOutcome::Superseded)
    }

    /// Produce a complete result for one request. Fails only on an unparseable URL.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, PipelineError> {
        let url = parse_target_url(&request.url).map_err(|source| PipelineError::InvalidUrl {
            input: request.url.clone(),
            source,
        })?;
        let host = hostname(&url);
        let target = url.as_str();

        let (metadata, rows) = tokio::join!(
            self.metadata.fetch(target),
            self.dataset.load(request.bypass_cache)
        );
        let metadata = metadata.as_ref();
        if metadata.is_none() {
            debug!(run = %request.run, "No site metadata for {}, using hostname defaults", host);
        }

        let name = derive_company_name(metadata, &host);
        let description = metadata.and_then(|meta| meta.description());
        let mut tagline = description
            .map(|d| d.chars().take(TAGLINE_MAX_CHARS).collect::<String>())
            .unwrap_or_else(|| format!("Strategic growth for {}.", name));
        let mut summary = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} is a market leader in their vertical.", name));
        let mut logo_prompt = format!("Minimalist logo for {}", name);
        let generated_logo = resolve_logo(metadata, &host);
        let hero = select_hero_image(metadata, &host);

        let mut selected_id: Option<String> = None;
        let mut detected_country: Option<String> = None;
        let mut dynamic_pool: Option<Vec<String>> = None;

        match &self.classifier {
            Some(classifier) => {
                let context = ClassificationContext {
                    website: target,
                    company: &name,
                    description: &summary,
                    catalog: rows.as_slice(),
                };
                match classifier.classify(&context).await {
                    Ok(judgement) => {
                        judgement.log_diagnostics();
                        if let Some(country) = judgement.country() {
                            info!(country = %country, "Detected country");
                            detected_country = Some(country.to_string());
                            dynamic_pool = judgement.city_pool();
                        }
                        selected_id = judgement.selected_id().map(str::to_string);
                        if let Some(refined) = judgement.refined_tagline() {
                            tagline = refined.to_string();
                        }
                        if let Some(refined) = judgement.refined_summary() {
                            summary = refined.to_string();
                        }
                        if let Some(prompt) = judgement.logo_prompt() {
                            logo_prompt = prompt.to_string();
                        }
                    }
                    Err(e) => {
                        warn!(run = %request.run, "Classifier call failed, falling back to default selection: {}", e);
                    }
                }
            }
            None => debug!("Classification disabled, using default persona selection"),
        }

        let city = resolve_city(&url, detected_country.as_deref(), dynamic_pool.as_deref());
        let persona = match select_persona(rows.as_slice(), selected_id.as_deref()) {
            Some(row) => row.clone(),
            None => {
                warn!("Persona dataset is empty, using built-in default persona");
                ReferenceRow::fallback()
            }
        };

        info!(
            run = %request.run,
            selected_id = selected_id.as_deref().unwrap_or(""),
            matched_row_id = %persona.id,
            image = %persona.avatar_identifier,
            city = %city.city,
            city_strategy = %city.strategy,
            hard_reset = request.bypass_cache,
            "Persona selected"
        );

        Ok(AnalysisResult {
            company_profile: CompanyProfile {
                name,
                tagline,
                domain: host,
                primary_color: self.result_config.primary_color.clone(),
                industry_tag: persona.industry,
                summary,
                logo_prompt,
                generated_logo,
                hero_image: hero.url,
            },
            icp_persona: IcpPersona {
                name: persona.persona_first_name,
                role: persona.job_title,
                avatar_id: persona.avatar_identifier,
                bio_snack: persona.bio,
                pain_points: persona.challenges,
                location: city.city,
                company_size: persona.company_size,
                interests: persona.interests,
                preferred_channel: persona.preferred_channels,
                avoid_channel: persona.avoid_channels,
            },
            value_hook: ValueHook::default(),
            market_data: MarketData {
                total_leads: self.result_config.total_leads,
                confidence_score: self.result_config.confidence_score,
            },
            is_hard_reset: request.bypass_cache,
        })
    }
}
