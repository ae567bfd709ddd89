//! Classifier trait and common types

use async_trait::async_trait;
use civitas_core::Result;

/// Trait for all text classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Classification label
    pub label: String,

    /// Confidence score (0.0-1.0)
    pub score: f32,

    /// Additional metadata
    pub metadata: ClassificationMetadata,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            metadata: ClassificationMetadata::default(),
            latency_us: 0,
        }
    }

    /// Check if score meets or exceeds threshold
    pub fn exceeds_threshold(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default)]
pub struct ClassificationMetadata {
    /// Model name or version
    pub model: Option<String>,

    /// All class scores (for multi-class classifiers)
    pub all_scores: Option<Vec<(String, f32)>>,
}
