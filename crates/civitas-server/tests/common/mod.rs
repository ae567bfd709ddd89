//! Test harness for the HTTP surface

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use civitas_classifiers::{ClassificationResult, Classifier};
use civitas_core::{Error, ModerationRecord, Result};
use civitas_moderation::{ModerationPipeline, PipelinePolicy, SecondaryAnalyzer};
use civitas_server::{cors_layer, create_router, AppState, RedditClient, RedditConfig};
use civitas_store::{MemoryRecordStore, RecordStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Classifier with a fixed answer
pub struct FixedClassifier {
    label: &'static str,
    score: f32,
    fail: bool,
    calls: AtomicU32,
}

impl FixedClassifier {
    pub fn new(label: &'static str, score: f32) -> Self {
        Self {
            label,
            score,
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("LABEL_0", 0.0)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(Error::classifier("inference failed"));
        }
        Ok(ClassificationResult::new(self.label, self.score))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Analyzer with a canned reply, or a transport failure when `None`
pub struct CannedAnalyzer {
    reply: Option<&'static str>,
    calls: AtomicU32,
}

impl CannedAnalyzer {
    pub fn replying(reply: &'static str) -> Self {
        Self {
            reply: Some(reply),
            calls: AtomicU32::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SecondaryAnalyzer for CannedAnalyzer {
    async fn prompt(&self, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.reply
            .map(str::to_string)
            .ok_or_else(|| Error::upstream("connection refused"))
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Store whose every operation fails
pub struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn create(&self, _record: &ModerationRecord) -> Result<String> {
        Err(Error::store("database unavailable"))
    }

    async fn list_all(&self) -> Result<Vec<ModerationRecord>> {
        Err(Error::store("database unavailable"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub classifier: Arc<FixedClassifier>,
    pub analyzer: Arc<CannedAnalyzer>,
    pub store: Arc<MemoryRecordStore>,
}

impl TestApp {
    pub fn new(classifier: FixedClassifier, analyzer: CannedAnalyzer) -> Self {
        Self::with_reddit(classifier, analyzer, "http://127.0.0.1:9")
    }

    pub fn with_reddit(
        classifier: FixedClassifier,
        analyzer: CannedAnalyzer,
        reddit_base_url: &str,
    ) -> Self {
        let classifier = Arc::new(classifier);
        let analyzer = Arc::new(analyzer);
        let store = Arc::new(MemoryRecordStore::new());
        let router = router(
            classifier.clone(),
            analyzer.clone(),
            store.clone(),
            reddit_base_url,
        );
        Self {
            router,
            classifier,
            analyzer,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn router(
    classifier: Arc<dyn Classifier>,
    analyzer: Arc<dyn SecondaryAnalyzer>,
    store: Arc<dyn RecordStore>,
    reddit_base_url: &str,
) -> Router {
    let pipeline = ModerationPipeline::new(classifier, analyzer, PipelinePolicy::default());
    let reddit = RedditClient::new(
        RedditConfig {
            public_base_url: reddit_base_url.to_string(),
            ..RedditConfig::default()
        },
        reqwest::Client::new(),
    )
    .unwrap();
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let state = AppState::new(pipeline, store, reddit, metrics_handle);
    create_router(state, cors_layer(&[ALLOWED_ORIGIN.to_string()]).unwrap())
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
