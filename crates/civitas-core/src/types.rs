//! Core types for Civitas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary used when the secondary analyzer's reply could not be parsed
pub const PARSING_ERROR_SENTIMENT: &str = "parsing error";

/// Summary used when the secondary analyzer could not be reached
pub const API_ERROR_SENTIMENT: &str = "API error";

/// What the pipeline decided to do with a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    /// Primary classifier was confident; no secondary analysis
    Flagged,
    /// Secondary analyzer was invoked
    Escalated,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flagged => "flagged",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the secondary (generative) analysis.
///
/// `score` is the inappropriateness score the analyzer reported, nominally
/// `0..=100` but stored as given. It is `None` for the sentinel assessments
/// substituted when the analyzer fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryAssessment {
    pub score: Option<i64>,
    pub sentiment: String,
}

impl SecondaryAssessment {
    /// Create an assessment from a parsed analyzer reply
    pub fn new(score: Option<i64>, sentiment: impl Into<String>) -> Self {
        Self {
            score,
            sentiment: sentiment.into(),
        }
    }

    /// Sentinel for a reply that was not the expected JSON structure
    pub fn parsing_error() -> Self {
        Self::new(None, PARSING_ERROR_SENTIMENT)
    }

    /// Sentinel for a transport or service failure
    pub fn api_error() -> Self {
        Self::new(None, API_ERROR_SENTIMENT)
    }

    /// Whether this is one of the two sentinel values
    pub fn is_sentinel(&self) -> bool {
        self.score.is_none()
            && (self.sentiment == PARSING_ERROR_SENTIMENT || self.sentiment == API_ERROR_SENTIMENT)
    }
}

/// A moderation decision for one input text.
///
/// The action is derived from the presence of a secondary assessment, so a
/// flagged record can never carry one and an escalated record always does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRepr", try_from = "RecordRepr")]
pub struct ModerationRecord {
    id: String,
    text: String,
    label: String,
    confidence: f32,
    secondary_assessment: Option<SecondaryAssessment>,
    created_at: DateTime<Utc>,
}

impl ModerationRecord {
    /// Record accepted on the primary classifier's output alone
    pub fn flagged(text: impl Into<String>, label: impl Into<String>, confidence: f32) -> Self {
        Self::build(text.into(), label.into(), confidence, None)
    }

    /// Record for which the secondary analyzer was invoked
    pub fn escalated(
        text: impl Into<String>,
        label: impl Into<String>,
        confidence: f32,
        assessment: SecondaryAssessment,
    ) -> Self {
        Self::build(text.into(), label.into(), confidence, Some(assessment))
    }

    fn build(
        text: String,
        label: String,
        confidence: f32,
        secondary_assessment: Option<SecondaryAssessment>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            label,
            confidence,
            secondary_assessment,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn action(&self) -> ModerationAction {
        if self.secondary_assessment.is_some() {
            ModerationAction::Escalated
        } else {
            ModerationAction::Flagged
        }
    }

    pub fn secondary_assessment(&self) -> Option<&SecondaryAssessment> {
        self.secondary_assessment.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Flat wire/storage shape of a record
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    id: String,
    text: String,
    label: String,
    confidence: f32,
    action: ModerationAction,
    secondary_assessment: Option<SecondaryAssessment>,
    created_at: DateTime<Utc>,
}

impl From<ModerationRecord> for RecordRepr {
    fn from(record: ModerationRecord) -> Self {
        let action = record.action();
        Self {
            id: record.id,
            text: record.text,
            label: record.label,
            confidence: record.confidence,
            action,
            secondary_assessment: record.secondary_assessment,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<RecordRepr> for ModerationRecord {
    type Error = String;

    fn try_from(repr: RecordRepr) -> std::result::Result<Self, Self::Error> {
        match (repr.action, repr.secondary_assessment.is_some()) {
            (ModerationAction::Flagged, true) => {
                return Err(format!(
                    "record {} is flagged but carries a secondary assessment",
                    repr.id
                ))
            }
            (ModerationAction::Escalated, false) => {
                return Err(format!(
                    "record {} is escalated but has no secondary assessment",
                    repr.id
                ))
            }
            _ => {}
        }

        Ok(Self {
            id: repr.id,
            text: repr.text,
            label: repr.label,
            confidence: repr.confidence,
            secondary_assessment: repr.secondary_assessment,
            created_at: repr.created_at,
        })
    }
}
