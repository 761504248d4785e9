//! AI subtask advisor.
//!
//! The advisor asks a generative-text service to break a task into a small
//! list of subtasks. Every failure comes back as an [`AdvisorError`] value so
//! the editing flow around it keeps working.
//!
//! The remote call sits behind [`SubtaskGenerator`]; [`GeminiClient`] is the
//! production implementation.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{AdvisorError, AdvisorResult};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LANGUAGE: &str = "Russian";
pub const DEFAULT_SUBTASK_COUNT: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PLACEHOLDER_KEYS: [&str; 2] = ["undefined", "YOUR_API_KEY"];

/// True when `key` looks like a usable access credential.
pub fn credential_is_configured(key: Option<&str>) -> bool {
    match key.map(str::trim) {
        Some(key) => !key.is_empty() && !PLACEHOLDER_KEYS.contains(&key),
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub language: String,
    pub count: usize,
    pub timeout: Duration,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            count: DEFAULT_SUBTASK_COUNT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AdvisorSettings {
    /// Reads `ai.*` keys; the key falls back to `ZENITH_API_KEY`, then `API_KEY`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let api_key = cfg
            .get("ai.api_key")
            .or_else(|| std::env::var("ZENITH_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok());

        let count = match cfg.get("ai.subtasks") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid ai.subtasks value: {raw}"))?,
            None => defaults.count,
        };
        let timeout = match cfg.get("ai.timeout") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid ai.timeout value: {raw}"))?,
            ),
            None => defaults.timeout,
        };

        Ok(Self {
            api_key,
            model: cfg.get("ai.model").unwrap_or(defaults.model),
            endpoint: cfg.get("ai.endpoint").unwrap_or(defaults.endpoint),
            language: cfg.get("ai.language").unwrap_or(defaults.language),
            count,
            timeout,
        })
    }

    pub fn is_configured(&self) -> bool {
        credential_is_configured(self.api_key.as_deref())
    }
}

/// One request for subtask suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskRequest {
    pub title: String,
    pub description: String,
    pub language: String,
    pub count: usize,
}

impl SubtaskRequest {
    pub fn prompt(&self) -> String {
        format!(
            "You are a professional project manager. Break the task into {count} subtasks \
             written in {language}.\nTask: {title}\nDescription: {description}\n\
             Return a JSON array of strings.",
            count = self.count,
            language = self.language,
            title = self.title,
            description = self.description,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub items: Vec<String>,
    /// Computation units the call consumed.
    pub tokens: u64,
}

/// Transport for subtask generation. One call per invocation, no retries.
#[async_trait]
pub trait SubtaskGenerator: Send + Sync {
    async fn generate(&self, request: &SubtaskRequest) -> AdvisorResult<Suggestions>;
}

pub struct Advisor {
    settings: AdvisorSettings,
    generator: Arc<dyn SubtaskGenerator>,
}

impl Advisor {
    pub fn new(settings: AdvisorSettings, generator: Arc<dyn SubtaskGenerator>) -> Self {
        Self {
            settings,
            generator,
        }
    }

    /// Advisor backed by the Gemini REST API.
    pub fn gemini(settings: AdvisorSettings) -> anyhow::Result<Self> {
        let client = GeminiClient::new(&settings)?;
        Ok(Self::new(settings, Arc::new(client)))
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    #[instrument(skip(self, description), fields(title_len = title.len()))]
    pub async fn suggest(&self, title: &str, description: &str) -> AdvisorResult<Suggestions> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AdvisorError::Validation(
                "a title is required to suggest subtasks".to_string(),
            ));
        }
        if !self.is_configured() {
            warn!("AI access key missing; skipping remote call");
            return Err(AdvisorError::NotConfigured);
        }

        let request = SubtaskRequest {
            title: title.to_string(),
            description: description.to_string(),
            language: self.settings.language.clone(),
            count: self.settings.count,
        };

        match self.generator.generate(&request).await {
            Ok(suggestions) => {
                info!(
                    count = suggestions.items.len(),
                    tokens = suggestions.tokens,
                    "received subtask suggestions"
                );
                Ok(suggestions)
            }
            Err(err) => {
                warn!(error = %err, "subtask suggestion failed");
                Err(err)
            }
        }
    }
}

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(settings: &AdvisorSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed building HTTP client for the AI service")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl SubtaskGenerator for GeminiClient {
    async fn generate(&self, request: &SubtaskRequest) -> AdvisorResult<Suggestions> {
        let body = request_body(request).to_string();
        debug!(model = %self.model, "sending subtask request");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AdvisorError::NetworkFailure(format!("request timeout: {err}"))
                } else if err.is_connect() {
                    AdvisorError::NetworkFailure(format!("connection failed: {err}"))
                } else {
                    AdvisorError::NetworkFailure(format!("request failed: {err}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| AdvisorError::NetworkFailure(format!("failed reading response: {err}")))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }

        parse_response(&text)
    }
}

fn request_body(request: &SubtaskRequest) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": request.prompt() }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn parse_response(body: &str) -> AdvisorResult<Suggestions> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|err| {
        AdvisorError::ServiceError(format!("unexpected response from AI service: {err}"))
    })?;

    let text: String = parsed
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

    Ok(Suggestions {
        items: parse_suggestions(&text),
        tokens: parsed
            .usage_metadata
            .map(|usage| usage.total_token_count)
            .unwrap_or(0),
    })
}

fn classify_failure(status: u16, body: &str) -> AdvisorError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    if matches!(status, 401 | 403) || message.contains("API key") {
        return AdvisorError::InvalidCredential;
    }
    AdvisorError::ServiceError(format!("HTTP {status}: {message}"))
}

fn bullet_prefix() -> Option<&'static Regex> {
    static BULLET: OnceLock<Option<Regex>> = OnceLock::new();
    BULLET
        .get_or_init(|| {
            Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*(?:\[[ xX]\]\s*)?")
                .map_err(|e| warn!(error = %e, "internal regex compile failure"))
                .ok()
        })
        .as_ref()
}

fn strip_bullet(line: &str) -> String {
    match bullet_prefix() {
        Some(re) => re.replace(line, "").trim().to_string(),
        None => line.trim().to_string(),
    }
}

/// Model output as a list. A JSON string array is taken as is; anything else
/// is read line by line with list bullets removed.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(values) = serde_json::from_str::<Vec<Value>>(unfenced) {
        return values
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect();
    }

    unfenced
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .collect()
}
