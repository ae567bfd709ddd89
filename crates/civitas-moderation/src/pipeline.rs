//! Moderation decision pipeline
//!
//! One text in, one [`ModerationRecord`] out:
//!
//! 1. Classify with the primary classifier.
//! 2. Accept the result when the [`PipelinePolicy`] trusts it.
//! 3. Otherwise escalate to the secondary analyzer. Its failures degrade to
//!    sentinel assessments and never fail the request.
//!
//! Persistence is left to the caller.

use crate::analyzer::SecondaryAnalyzer;
use crate::assessment::parse_reply;
use crate::policy::PipelinePolicy;
use civitas_classifiers::{ClassificationResult, Classifier};
use civitas_core::{ModerationRecord, Result, SecondaryAssessment};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Classifier-then-analyzer moderation pipeline
#[derive(Clone)]
pub struct ModerationPipeline {
    classifier: Arc<dyn Classifier>,
    analyzer: Arc<dyn SecondaryAnalyzer>,
    policy: PipelinePolicy,
}

impl ModerationPipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        analyzer: Arc<dyn SecondaryAnalyzer>,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            classifier,
            analyzer,
            policy,
        }
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Evaluate one non-empty text.
    ///
    /// Primary classifier errors are returned as-is.
    pub async fn evaluate(&self, text: &str) -> Result<ModerationRecord> {
        debug_assert!(!text.is_empty(), "caller must reject empty text");

        let start = Instant::now();
        metrics::counter!("civitas_requests_total").increment(1);

        let primary = match self.classifier.classify(text).await {
            Ok(result) => result,
            Err(e) => {
                metrics::counter!("civitas_errors_total", "stage" => "primary").increment(1);
                tracing::error!("Primary classifier '{}' failed: {}", self.classifier.name(), e);
                return Err(e);
            }
        };

        metrics::histogram!("civitas_primary_latency_us").record(primary.latency_us as f64);

        let record = if self.policy.accepts(&primary) {
            debug!(
                "Accepted primary result - Label: {}, Score: {:.3} ({})",
                primary.label,
                primary.score,
                provenance(&primary)
            );
            ModerationRecord::flagged(text, primary.label, primary.score)
        } else {
            debug!(
                "Escalating to {} - Label: {}, Score: {:.3} ({})",
                self.analyzer.name(),
                primary.label,
                primary.score,
                provenance(&primary)
            );
            let assessment = self.assess(text).await;
            ModerationRecord::escalated(text, primary.label, primary.score, assessment)
        };

        metrics::counter!("civitas_decisions_total", "action" => record.action().as_str())
            .increment(1);
        metrics::histogram!("civitas_pipeline_latency_us")
            .record(start.elapsed().as_micros() as f64);

        Ok(record)
    }

    async fn assess(&self, text: &str) -> SecondaryAssessment {
        match self.analyzer.prompt(text).await {
            Ok(reply) => {
                let assessment = parse_reply(&reply);
                if assessment.is_sentinel() {
                    metrics::counter!("civitas_escalation_failures_total", "kind" => "parse")
                        .increment(1);
                }
                assessment
            }
            Err(e) => {
                warn!("Secondary analyzer '{}' failed: {}", self.analyzer.name(), e);
                metrics::counter!("civitas_escalation_failures_total", "kind" => "api")
                    .increment(1);
                SecondaryAssessment::api_error()
            }
        }
    }
}

/// Which model produced a primary result and how long it took
fn provenance(result: &ClassificationResult) -> String {
    format!(
        "model: {}, latency: {}us",
        result.metadata.model.as_deref().unwrap_or("unknown"),
        result.latency_us
    )
}
