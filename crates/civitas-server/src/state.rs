//! Shared application state

use civitas_classifiers::{BertSequenceClassifier, Classifier};
use civitas_core::{Error, Result};
use civitas_moderation::{GeminiAnalyzer, ModerationPipeline, SecondaryAnalyzer};
use civitas_store::RecordStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use crate::config::ServiceConfig;
use crate::reddit::RedditClient;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Classify-then-escalate decision logic
    pub pipeline: Arc<ModerationPipeline>,

    /// Where moderation records are persisted
    pub store: Arc<dyn RecordStore>,

    /// Sample text source for the frontend
    pub reddit: Arc<RedditClient>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        pipeline: ModerationPipeline,
        store: Arc<dyn RecordStore>,
        reddit: RedditClient,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            reddit: Arc::new(reddit),
            metrics_handle,
        }
    }

    /// Build every collaborator named in `config`.
    ///
    /// Loading the classifier downloads the model on first run, which can take
    /// a while.
    pub async fn from_config(config: &ServiceConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let model_config = config.classifier.model_config();
        info!("Loading classifier {}", model_config.display_name());
        let classifier = tokio::task::spawn_blocking(move || BertSequenceClassifier::load(&model_config))
            .await
            .map_err(|e| Error::internal(format!("Classifier loader panicked: {}", e)))??;
        info!("Classifier labels: {:?}", classifier.labels());
        let classifier: Arc<dyn Classifier> = Arc::new(classifier);

        let gemini = config
            .gemini
            .client_config(config.http_timeout(), |name| std::env::var(name).ok());
        info!("Secondary analyzer: Gemini model {}", gemini.model);
        let analyzer: Arc<dyn SecondaryAnalyzer> = Arc::new(GeminiAnalyzer::new(gemini)?);

        let pipeline = ModerationPipeline::new(classifier, analyzer, config.policy.clone());
        info!(
            "Acceptance policy: label {} with confidence >= {}",
            config.policy.safe_label, config.policy.acceptance_threshold
        );

        let store = config.store.build(http.clone())?;
        let reddit = RedditClient::new(config.reddit.clone(), http)?;

        Ok(Self::new(pipeline, store, reddit, metrics_handle))
    }
}
