//! Parsing of free-form secondary analyzer replies

use civitas_core::SecondaryAssessment;
use serde::Deserialize;

/// JSON object the analyzer is asked to produce
#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    score: Option<i64>,
    sentiment: String,
}

/// Remove a surrounding fenced code block, if any
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();

    let Some(body) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };

    match body.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

/// Turn a raw reply into an assessment.
///
/// Anything that is not a JSON object with a string `sentiment` and an
/// optional integer `score` degrades to the parsing-error sentinel. Scores
/// outside `0..=100` are kept as given.
pub fn parse_reply(reply: &str) -> SecondaryAssessment {
    let body = strip_code_fence(reply);

    let verdict: Verdict = match serde_json::from_str(body) {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!("Failed to parse analyzer reply ({}): {:?}", e, body);
            return SecondaryAssessment::parsing_error();
        }
    };

    if let Some(score) = verdict.score.filter(|s| !(0..=100).contains(s)) {
        tracing::warn!("Analyzer score outside 0-100: {}", score);
    }

    SecondaryAssessment::new(verdict.score, verdict.sentiment)
}
