//! Suggestion generation with a two-tier strategy: the remote generative
//! provider when configured, the deterministic local table otherwise. The
//! orchestrator absorbs every remote failure, so prediction never fails
//! because of the optional provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use psyche_core::assessment::{
    CONCERN_LIMIT, CONCERN_THRESHOLD, Language, Severity, SymptomScores, notable_concerns,
};
use psyche_core::suggestion::{build_prompt, clamp_suggestion, local_suggestion};

use crate::config::SuggestionConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One slow provider call must not stall the request; a timeout is treated
/// like any other provider failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures internal to the suggestion subsystem. Logged, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no provider credential configured")]
    Unconfigured,
    #[error("suggestion request failed: {0}")]
    Request(String),
    #[error("suggestion provider returned an empty response")]
    EmptyResponse,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Calls the Gemini `generateContent` REST endpoint with a severity- and
/// locale-specific prompt. One synchronous attempt, no internal retry.
pub struct RemoteSuggestionProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl RemoteSuggestionProvider {
    pub fn from_config(config: &SuggestionConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone(), GEMINI_BASE_URL)
    }

    fn new(api_key: String, model: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build suggestion HTTP client"),
            api_key,
            model,
            base_url: base_url.to_string(),
        }
    }

    pub async fn generate(
        &self,
        severity: Severity,
        language: Language,
        scores: &SymptomScores,
    ) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Unconfigured);
        }

        let concerns = notable_concerns(scores, CONCERN_THRESHOLD, CONCERN_LIMIT);
        let prompt = build_prompt(severity, language, &concerns);

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest {
                contents: vec![RequestContent {
                    parts: vec![RequestPart { text: prompt }],
                }],
            })
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect();
        let text = clamp_suggestion(&text);
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Chooses the suggestion strategy. Remote is attempted only when enabled
/// and credentialed; any remote failure falls back to the local table. The
/// returned text is always non-empty.
pub struct SuggestionOrchestrator {
    remote: Option<RemoteSuggestionProvider>,
}

impl SuggestionOrchestrator {
    pub fn from_config(config: &SuggestionConfig) -> Self {
        let remote = (config.enabled && !config.api_key.is_empty())
            .then(|| RemoteSuggestionProvider::from_config(config));
        if remote.is_some() {
            tracing::info!(model = %config.model, "Remote suggestions enabled");
        } else {
            tracing::info!("Remote suggestions disabled; using local suggestion table");
        }
        Self { remote }
    }

    pub async fn suggest(
        &self,
        severity: Severity,
        language: Language,
        scores: &SymptomScores,
    ) -> String {
        if let Some(remote) = &self.remote {
            match remote.generate(severity, language, scores).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(error = %e, "Remote suggestion failed; falling back to local table");
                }
            }
        }
        local_suggestion(severity, language).to_string()
    }
}
