//! MetaHateBERT integration tests
//!
//! These download the model from HuggingFace and are ignored by default.
//! Run with `cargo test -p civitas-classifiers -- --ignored`.

use civitas_classifiers::{BertSequenceClassifier, Classifier, ModelConfig};

async fn load_default() -> BertSequenceClassifier {
    tokio::task::spawn_blocking(|| BertSequenceClassifier::load(&ModelConfig::default()))
        .await
        .unwrap()
        .expect("Failed to load MetaHateBERT")
}

#[tokio::test]
#[ignore = "downloads model weights"]
async fn test_load_exposes_binary_labels() {
    let classifier = load_default().await;
    assert_eq!(classifier.labels().len(), 2);
    assert_eq!(classifier.name(), "irlab-udc/MetaHateBERT");
}

#[tokio::test]
#[ignore = "downloads model weights"]
async fn test_classify_returns_probability() {
    let classifier = load_default().await;

    let result = classifier
        .classify("Have a lovely day, neighbour!")
        .await
        .unwrap();

    assert!(classifier.labels().contains(&result.label));
    assert!((0.0..=1.0).contains(&result.score));
    assert!(result.score >= 0.5, "argmax of two classes is at least 0.5");

    let total: f32 = result
        .metadata
        .all_scores
        .unwrap()
        .iter()
        .map(|(_, p)| p)
        .sum();
    assert!((total - 1.0).abs() < 1e-3);
}

#[tokio::test]
#[ignore = "downloads model weights"]
async fn test_long_input_is_truncated() {
    let classifier = load_default().await;
    let text = "word ".repeat(2_000);

    let result = classifier.classify(&text).await;
    assert!(result.is_ok(), "long input failed: {:?}", result.err());
}
