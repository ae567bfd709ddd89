//! Mock collaborators for pipeline tests
//!
//! Configurable implementations of the Classifier and SecondaryAnalyzer
//! traits that count how often they are called.

#![allow(dead_code)]

use async_trait::async_trait;
use civitas_classifiers::{ClassificationResult, Classifier};
use civitas_core::{Error, Result};
use civitas_moderation::SecondaryAnalyzer;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// A classifier returning a fixed label and score
pub struct MockClassifier {
    label: String,
    score: f32,
    fail: bool,
    call_count: AtomicU32,
}

impl MockClassifier {
    pub fn new(label: &str, score: f32) -> Self {
        Self {
            label: label.to_string(),
            score,
            fail: false,
            call_count: AtomicU32::new(0),
        }
    }

    /// A classifier whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("LABEL_0", 0.0)
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(Error::classifier("model exploded"));
        }
        Ok(ClassificationResult::new(self.label.clone(), self.score))
    }

    fn name(&self) -> &str {
        "mock-classifier"
    }
}

/// An analyzer replaying a canned reply or failure
pub struct MockAnalyzer {
    reply: std::result::Result<String, String>,
    call_count: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockAnalyzer {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            call_count: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            call_count: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecondaryAnalyzer for MockAnalyzer {
    async fn prompt(&self, text: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().unwrap().push(text.to_string());
        self.reply.clone().map_err(Error::upstream)
    }

    fn name(&self) -> &str {
        "mock-analyzer"
    }
}
