//! Persona classification through an external generative service
//!
//! The service receives a fixed instruction plus a context blob (website, company,
//! description and the persona catalog) and answers with a JSON
//! [`ClassifierJudgement`]: B2B/B2C mode, the selected persona id, the fields it
//! matched on and, when the site names a country, a pool of major cities.
//!
//! Transient failures are retried through [`RetryHelper`]; exhaustion is reported as
//! a [`ClassifierError`] and the caller falls back to defaults.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::dataset::ReferenceRow;
use crate::retry::{is_transient_status, RetryHelper, RetryPolicy, Transient};

/// Fixed instruction sent with every classification request
pub const SYSTEM_INSTRUCTION: &str = r#"
# ROLE
You match companies to buyer personas. Pick exactly one persona id from the provided database.

# STEP 1: CLASSIFY
Decide whether the company sells to businesses (b2b) or to individual consumers (b2c).
- b2b: software, ERP, consulting, logistics and other services bought by companies.
- b2c: retail, gaming, lifestyle, consumer apps, beverages and other products bought by people.

# STEP 2: GEOGRAPHY
Look for explicit country mentions in the context (footer, contact details, city and country pairs).
- If one authoritative country is present, return it as "detected_country".
- When a country is returned, also return 3-5 "major_cities" (capital and main business hubs) of that country.

# STEP 3: MATCH
- b2b: match only on job title, industry and professional challenges. Never use interests or hobbies.
- b2c: match only on personal interests. Never use job titles, challenges or company size.

# REFINEMENT
- refined_tagline: at most 12 words.
- refined_summary: 2-3 sentences on what the company does and who it serves.
- logo_prompt: short visual description of the brand's logo icon.

# OUTPUT (JSON only)
{
  "mode": "b2b" | "b2c",
  "reason": "short reason for the classification",
  "selected_id": "exact id from the database",
  "matched_on": ["fields used for matching"],
  "top_matches": [{"id": "ID", "score": 0.95}],
  "detected_country": "full country name or null",
  "major_cities": ["City A", "City B", "City C"],
  "refined_tagline": "...",
  "refined_summary": "...",
  "logo_prompt": "..."
}
"#;

/// Field-name fragments a B2B match must not cite
const B2B_FORBIDDEN_FIELDS: &[&str] = &["interest", "hobby"];

/// Field-name fragments a B2C match must not cite
const B2C_FORBIDDEN_FIELDS: &[&str] = &["title", "job", "challenge", "company"];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("no classifier credential configured")]
    MissingCredential,

    #[error("classifier request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier returned malformed output: {0}")]
    Malformed(String),
}

impl ClassifierError {
    /// HTTP status of the failure, `None` for network-level failures
    pub fn status(&self) -> Option<u16> {
        match self {
            ClassifierError::Network(e) => e.status().map(|s| s.as_u16()),
            ClassifierError::Status { status, .. } => Some(*status),
            ClassifierError::MissingCredential | ClassifierError::Malformed(_) => None,
        }
    }
}

impl Transient for ClassifierError {
    /// Malformed output carries no status and is retried like a network failure
    fn is_transient(&self) -> bool {
        match self {
            ClassifierError::MissingCredential => false,
            other => is_transient_status(other.status()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessMode {
    B2b,
    #[default]
    B2c,
}

impl BusinessMode {
    /// `b2b` in any case is B2B; anything else is B2C
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("b2b") {
            BusinessMode::B2b
        } else {
            BusinessMode::B2c
        }
    }
}

impl<'de> Deserialize<'de> for BusinessMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(BusinessMode::from_label)
            .unwrap_or_default())
    }
}

impl std::fmt::Display for BusinessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusinessMode::B2b => write!(f, "b2b"),
            BusinessMode::B2c => write!(f, "b2c"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMatch {
    pub id: String,
    #[serde(default)]
    pub score: f64,
}

/// Structured answer of the classification service. Consumed once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierJudgement {
    #[serde(default)]
    pub mode: BusinessMode,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub selected_id: Option<String>,
    #[serde(default, rename = "matched_on", deserialize_with = "null_as_empty")]
    pub matched_on_fields: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub top_matches: Vec<TopMatch>,
    #[serde(default)]
    pub detected_country: Option<String>,
    #[serde(default)]
    pub major_cities: Option<Vec<String>>,
    #[serde(default)]
    pub refined_tagline: Option<String>,
    #[serde(default)]
    pub refined_summary: Option<String>,
    #[serde(default)]
    pub logo_prompt: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ClassifierJudgement {
    pub fn selected_id(&self) -> Option<&str> {
        non_blank(self.selected_id.as_deref())
    }

    /// Detected country, ignoring blanks and a literal "null"
    pub fn country(&self) -> Option<&str> {
        non_blank(self.detected_country.as_deref()).filter(|c| !c.eq_ignore_ascii_case("null"))
    }

    /// Non-blank city names from `major_cities`, if any
    pub fn city_pool(&self) -> Option<Vec<String>> {
        let cities: Vec<String> = self
            .major_cities
            .as_deref()?
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if cities.is_empty() {
            None
        } else {
            Some(cities)
        }
    }

    pub fn refined_tagline(&self) -> Option<&str> {
        non_blank(self.refined_tagline.as_deref())
    }

    pub fn refined_summary(&self) -> Option<&str> {
        non_blank(self.refined_summary.as_deref())
    }

    pub fn logo_prompt(&self) -> Option<&str> {
        non_blank(self.logo_prompt.as_deref())
    }

    /// Matched-on fields that break the mode's field restriction.
    ///
    /// B2B matches must not cite interest/hobby fields; B2C matches must not cite
    /// job title, challenge or company fields.
    pub fn field_restriction_violations(&self) -> Vec<&str> {
        let forbidden = match self.mode {
            BusinessMode::B2b => B2B_FORBIDDEN_FIELDS,
            BusinessMode::B2c => B2C_FORBIDDEN_FIELDS,
        };
        self.matched_on_fields
            .iter()
            .filter(|field| {
                let lower = field.to_lowercase();
                forbidden.iter().any(|fragment| lower.contains(fragment))
            })
            .map(String::as_str)
            .collect()
    }

    /// Log mode, matches and any field-restriction violation. The judgement is
    /// accepted either way.
    pub fn log_diagnostics(&self) {
        info!(
            mode = %self.mode,
            reason = self.reason.as_deref().unwrap_or(""),
            "Classifier mode"
        );

        let violations = self.field_restriction_violations();
        if !violations.is_empty() {
            error!(
                mode = %self.mode,
                fields = %violations.join(","),
                "Classifier matched on fields forbidden for this mode"
            );
        }

        let top_matches = self
            .top_matches
            .iter()
            .map(|m| format!("{}:{}", m.id, m.score))
            .collect::<Vec<_>>()
            .join(",");
        info!(
            mode = %self.mode,
            selected_id = self.selected_id().unwrap_or(""),
            top_matches = %top_matches,
            matched_on = %self.matched_on_fields.join(","),
            "Classifier selection"
        );
    }
}

/// Catalog entry sent to the service; only the fields matching may use
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry<'a> {
    id: &'a str,
    job_title: &'a str,
    industry: &'a str,
    challenges: &'a [String],
    interests: &'a [String],
}

/// Everything the classifier sees about one company
#[derive(Debug, Clone, Copy)]
pub struct ClassificationContext<'a> {
    pub website: &'a str,
    pub company: &'a str,
    pub description: &'a str,
    pub catalog: &'a [ReferenceRow],
}

impl ClassificationContext<'_> {
    /// Render the free-text context blob
    pub fn render(&self) -> String {
        let catalog: Vec<CatalogEntry<'_>> = self
            .catalog
            .iter()
            .map(|row| CatalogEntry {
                id: &row.id,
                job_title: &row.job_title,
                industry: &row.industry,
                challenges: &row.challenges,
                interests: &row.interests,
            })
            .collect();
        let catalog_json = serde_json::to_string(&catalog).unwrap_or_else(|_| "[]".to_string());

        format!(
            "Website: {}\nCompany: {}\nDescription: {}\nDatabase: {}",
            self.website, self.company, self.description, catalog_json
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Extract and parse the judgement JSON from a generate-content response body
pub fn parse_generate_response(body: &str) -> Result<ClassifierJudgement, ClassifierError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::Malformed(format!("response envelope: {}", e)))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ClassifierError::Malformed("empty response text".to_string()));
    }

    serde_json::from_str(strip_code_fence(&text))
        .map_err(|e| ClassifierError::Malformed(format!("judgement JSON: {}", e)))
}

/// Some models wrap JSON in a ```json fence despite the requested mime type
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Client for the generative classification API
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    retry: RetryHelper,
}

impl ClassifierClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            retry: RetryHelper::new(policy),
        }
    }

    /// Build a client from configuration. A missing or blank credential is an error;
    /// the pipeline treats it as "classification disabled".
    pub fn from_config(
        client: reqwest::Client,
        config: &AppConfig,
        api_key: Option<String>,
    ) -> Result<Self, ClassifierError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ClassifierError::MissingCredential)?;
        Ok(Self::new(
            client,
            config.sources.classifier_endpoint.clone(),
            config.sources.classifier_model.clone(),
            api_key,
            RetryPolicy::from_config(&config.classifier),
        ))
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Classify the company and select a persona, retrying transient failures
    pub async fn classify(
        &self,
        context: &ClassificationContext<'_>,
    ) -> Result<ClassifierJudgement, ClassifierError> {
        let prompt = context.render();
        self.retry.with_retry(|| self.generate(&prompt)).await
    }

    async fn generate(&self, prompt: &str) -> Result<ClassifierJudgement, ClassifierError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![RequestPart {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!("Calling classifier model {}", self.model);

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        parse_generate_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn judgement(value: serde_json::Value) -> ClassifierJudgement {
        serde_json::from_value(value).expect("valid judgement")
    }

    #[test]
    fn test_parse_full_judgement() {
        let j = judgement(json!({
            "mode": "b2b",
            "reason": "Sells ERP",
            "selected_id": "P2",
            "matched_on": ["jobTitle", "industry"],
            "top_matches": [{"id": "P2", "score": 0.9}, {"id": "P1", "score": 0.4}],
            "detected_country": "Germany",
            "major_cities": ["Berlin", " ", "Munich"],
            "refined_tagline": "ERP for builders",
            "refined_summary": "They sell ERP.",
            "logo_prompt": "A crane"
        }));
        assert_eq!(j.mode, BusinessMode::B2b);
        assert_eq!(j.selected_id(), Some("P2"));
        assert_eq!(j.top_matches.len(), 2);
        assert_eq!(j.country(), Some("Germany"));
        assert_eq!(j.city_pool(), Some(vec!["Berlin".to_string(), "Munich".to_string()]));
    }

    #[test]
    fn test_nulls_and_missing_fields() {
        let j = judgement(json!({
            "mode": "b2c",
            "matched_on": null,
            "top_matches": null,
            "detected_country": "null",
            "major_cities": []
        }));
        assert!(j.matched_on_fields.is_empty());
        assert!(j.selected_id().is_none());
        assert!(j.country().is_none());
        assert!(j.city_pool().is_none());
        assert!(j.refined_tagline().is_none());
    }

    #[test]
    fn test_b2b_field_restriction() {
        let ok = judgement(json!({"mode": "b2b", "matched_on": ["Job Title", "Industry", "Challenges"]}));
        assert!(ok.field_restriction_violations().is_empty());

        let bad = judgement(json!({"mode": "b2b", "matched_on": ["industry", "Interests", "hobby"]}));
        assert_eq!(bad.field_restriction_violations(), vec!["Interests", "hobby"]);
    }

    #[test]
    fn test_b2c_field_restriction() {
        let ok = judgement(json!({"mode": "b2c", "matched_on": ["interests"]}));
        assert!(ok.field_restriction_violations().is_empty());

        let bad = judgement(json!({"mode": "b2c", "matched_on": ["jobTitle", "companySize", "interests"]}));
        assert_eq!(bad.field_restriction_violations(), vec!["jobTitle", "companySize"]);
    }

    #[test]
    fn test_context_render_includes_catalog_fields_only() {
        let rows = vec![ReferenceRow::fallback()];
        let context = ClassificationContext {
            website: "https://acme.com/",
            company: "Acme",
            description: "Rockets",
            catalog: &rows,
        };
        let text = context.render();
        assert!(text.starts_with("Website: https://acme.com/\nCompany: Acme\nDescription: Rockets\nDatabase: ["));
        assert!(text.contains("\"jobTitle\":\"Head of Growth\""));
        assert!(text.contains("\"interests\":[\"Productivity\"]"));
        assert!(!text.contains("bio"));
        assert!(!text.contains("avatar"));
    }

    #[test]
    fn test_parse_generate_response() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"mode\":\"b2c\",\"selected_id\":\"P3\"}" }] }
            }]
        })
        .to_string();
        let j = parse_generate_response(&body).unwrap();
        assert_eq!(j.mode, BusinessMode::B2c);
        assert_eq!(j.selected_id(), Some("P3"));
    }

    #[test]
    fn test_parse_generate_response_with_fence() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```json\n{\"mode\":\"b2b\"}\n```" }] }
            }]
        })
        .to_string();
        assert_eq!(parse_generate_response(&body).unwrap().mode, BusinessMode::B2b);
    }

    #[test]
    fn test_malformed_responses() {
        assert!(matches!(parse_generate_response("not json"), Err(ClassifierError::Malformed(_))));
        assert!(matches!(
            parse_generate_response(r#"{"candidates": []}"#),
            Err(ClassifierError::Malformed(_))
        ));
        assert!(matches!(
            parse_generate_response(&wrap_text("[1, 2]")),
            Err(ClassifierError::Malformed(_))
        ));
    }

    fn wrap_text(text: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
    }

    #[test]
    fn test_mode_is_lenient_and_keeps_judgement() {
        let upper = parse_generate_response(&wrap_text(
            r#"{"mode":"B2B","selected_id":"P2","detected_country":"Germany"}"#,
        ))
        .unwrap();
        assert_eq!(upper.mode, BusinessMode::B2b);
        assert_eq!(upper.selected_id(), Some("P2"));
        assert_eq!(upper.country(), Some("Germany"));

        let unknown = parse_generate_response(&wrap_text(r#"{"mode":"b2x","selected_id":"P1"}"#)).unwrap();
        assert_eq!(unknown.mode, BusinessMode::B2c);
        assert_eq!(unknown.selected_id(), Some("P1"));

        let missing = parse_generate_response(&wrap_text(r#"{"refined_tagline":"Hi"}"#)).unwrap();
        assert_eq!(missing.mode, BusinessMode::B2c);
        assert_eq!(missing.refined_tagline(), Some("Hi"));

        let null = parse_generate_response(&wrap_text(r#"{"mode":null}"#)).unwrap();
        assert_eq!(null.mode, BusinessMode::B2c);
    }

    #[test]
    fn test_error_transience() {
        let server_error = ClassifierError::Status { status: 503, body: String::new() };
        let rate_limited = ClassifierError::Status { status: 429, body: String::new() };
        let not_found = ClassifierError::Status { status: 404, body: String::new() };
        assert!(server_error.is_transient());
        assert!(rate_limited.is_transient());
        assert!(!not_found.is_transient());
        assert!(ClassifierError::Malformed("x".to_string()).is_transient());
        assert_eq!(ClassifierError::Malformed("x".to_string()).status(), None);
        assert!(!ClassifierError::MissingCredential.is_transient());
    }

    #[test]
    fn test_from_config_requires_credential() {
        let config = AppConfig::embedded().unwrap();
        let client = reqwest::Client::new();
        assert!(matches!(
            ClassifierClient::from_config(client.clone(), &config, None),
            Err(ClassifierError::MissingCredential)
        ));
        assert!(ClassifierClient::from_config(client.clone(), &config, Some("  ".into())).is_err());
        assert!(ClassifierClient::from_config(client, &config, Some("key".into())).is_ok());
    }
}
