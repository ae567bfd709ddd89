//! Acceptance policy for primary classifier output

use civitas_classifiers::ClassificationResult;
use civitas_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Label MetaHateBERT emits for the class accepted without escalation
pub const DEFAULT_SAFE_LABEL: &str = "LABEL_1";

/// Minimum confidence to accept the primary result directly
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.8;

/// Decides when the primary classifier is trusted on its own.
///
/// Both values are tied to the label scheme of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePolicy {
    /// Label that, with enough confidence, skips escalation
    #[serde(default = "default_safe_label")]
    pub safe_label: String,

    /// Inclusive confidence threshold in `[0, 1]`
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            safe_label: default_safe_label(),
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

impl PipelinePolicy {
    pub fn new(safe_label: impl Into<String>, acceptance_threshold: f32) -> Result<Self> {
        let policy = Self {
            safe_label: safe_label.into(),
            acceptance_threshold,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy values are usable
    pub fn validate(&self) -> Result<()> {
        if self.safe_label.trim().is_empty() {
            return Err(Error::config("policy.safe_label must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(Error::config(format!(
                "policy.acceptance_threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        Ok(())
    }

    /// Whether the primary result is accepted without escalation
    pub fn accepts(&self, result: &ClassificationResult) -> bool {
        result.label == self.safe_label && result.exceeds_threshold(self.acceptance_threshold)
    }
}

fn default_safe_label() -> String {
    DEFAULT_SAFE_LABEL.to_string()
}

fn default_acceptance_threshold() -> f32 {
    DEFAULT_ACCEPTANCE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_confident_safe_label() {
        let policy = PipelinePolicy::default();
        assert!(policy.accepts(&ClassificationResult::new("LABEL_1", 0.92)));
        assert!(policy.accepts(&ClassificationResult::new("LABEL_1", 0.8)));
    }

    #[test]
    fn test_rejects_low_confidence_or_other_label() {
        let policy = PipelinePolicy::default();
        assert!(!policy.accepts(&ClassificationResult::new("LABEL_1", 0.79)));
        assert!(!policy.accepts(&ClassificationResult::new("LABEL_0", 0.99)));
        assert!(!policy.accepts(&ClassificationResult::new("LABEL_0", 0.55)));
    }

    #[test]
    fn test_custom_policy() {
        let policy = PipelinePolicy::new("no_hate", 0.6).unwrap();
        assert!(policy.accepts(&ClassificationResult::new("no_hate", 0.61)));
        assert!(!policy.accepts(&ClassificationResult::new("LABEL_1", 0.99)));
    }

    #[test]
    fn test_validation() {
        assert!(PipelinePolicy::new("LABEL_1", 1.5).is_err());
        assert!(PipelinePolicy::new("LABEL_1", -0.1).is_err());
        assert!(PipelinePolicy::new("  ", 0.5).is_err());
        assert!(PipelinePolicy::new("LABEL_1", 0.0).is_ok());
    }

    #[test]
    fn test_yaml_defaults() {
        let policy: PipelinePolicy = serde_yaml::from_str("acceptance_threshold: 0.9").unwrap();
        assert_eq!(policy.safe_label, "LABEL_1");
        assert_eq!(policy.acceptance_threshold, 0.9);
    }
}
