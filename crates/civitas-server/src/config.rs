//! Service configuration
//!
//! Loaded from a YAML file in which every field has a default, so a missing
//! file yields a working development setup (in-memory store, public Reddit).
//! Secrets never live in the file; sections name the environment variables
//! that hold them.

use civitas_classifiers::{DeviceType, ModelConfig, DEFAULT_REPO_ID};
use civitas_core::{Error, Result};
use civitas_moderation::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use civitas_moderation::{GeminiConfig, PipelinePolicy};
use civitas_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::reddit::RedditConfig;

/// Longest token sequence a BERT-base encoder accepts
pub const MAX_POSITION_EMBEDDINGS: usize = 512;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub classifier: ClassifierSettings,

    #[serde(default)]
    pub policy: PipelinePolicy,

    #[serde(default)]
    pub gemini: GeminiSettings,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings::default(),
            policy: PipelinePolicy::default(),
            gemini: GeminiSettings::default(),
            store: StoreConfig::default(),
            reddit: RedditConfig::default(),
            cors_origins: default_cors_origins(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Where the primary classifier comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    #[serde(default)]
    pub revision: Option<String>,

    /// Load from this directory instead of the hub
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    #[serde(default)]
    pub device: DeviceType,

    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            repo_id: default_repo_id(),
            revision: None,
            local_path: None,
            device: DeviceType::default(),
            max_length: default_max_length(),
        }
    }
}

impl ClassifierSettings {
    pub fn model_config(&self) -> ModelConfig {
        let config = match &self.local_path {
            Some(path) => ModelConfig::from_local(path),
            None => {
                let config = ModelConfig::from_hf(&self.repo_id);
                match &self.revision {
                    Some(revision) => config.with_revision(revision),
                    None => config,
                }
            }
        };
        config
            .with_device(self.device)
            .with_max_length(self.max_length)
    }
}

/// Secondary analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl GeminiSettings {
    /// Client config with the key read through `lookup`.
    ///
    /// A missing key is not fatal: every escalation then degrades to the
    /// API-error assessment, which is logged once here.
    pub fn client_config(
        &self,
        timeout: Duration,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> GeminiConfig {
        let api_key = lookup(&self.api_key_env).unwrap_or_else(|| {
            warn!(
                "{} is not set; escalations will record API errors",
                self.api_key_env
            );
            String::new()
        });
        GeminiConfig::new(api_key)
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_timeout(timeout)
    }
}

impl ServiceConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)?
        } else {
            info!("{} not found, using default configuration", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("Invalid YAML: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if self.http_timeout_secs == 0 {
            return Err(Error::config("http_timeout_secs must be greater than 0"));
        }
        if self.classifier.max_length == 0 {
            return Err(Error::config("classifier.max_length must be greater than 0"));
        }
        if self.classifier.max_length > MAX_POSITION_EMBEDDINGS {
            return Err(Error::config(format!(
                "classifier.max_length must be at most {}, got {}",
                MAX_POSITION_EMBEDDINGS, self.classifier.max_length
            )));
        }
        Ok(())
    }
}

fn default_repo_id() -> String {
    DEFAULT_REPO_ID.to_string()
}

fn default_max_length() -> usize {
    MAX_POSITION_EMBEDDINGS
}

fn default_gemini_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "https://civitas-ai.netlify.app".to_string(),
        "https://civitas-backend.onrender.com".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_http_timeout_secs() -> u64 {
    30
}
