//! Gemini `generateContent` client used as the secondary analyzer

use crate::analyzer::{build_prompt, SecondaryAnalyzer};
use async_trait::async_trait;
use civitas_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Settings for [`GeminiAnalyzer`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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
    text: Option<String>,
}

/// Secondary analyzer backed by the Gemini REST API
pub struct GeminiAnalyzer {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build Gemini HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl SecondaryAnalyzer for GeminiAnalyzer {
    async fn prompt(&self, text: &str) -> Result<String> {
        let prompt = build_prompt(text);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "Gemini returned {}: {}",
                status, detail
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Invalid Gemini response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Error::upstream("Gemini response contained no text"))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
