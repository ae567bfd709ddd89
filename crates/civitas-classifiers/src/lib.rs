//! Civitas Classifiers
//!
//! Primary text classifiers for the moderation pipeline.
//!
//! The production classifier is a BERT sequence classifier (MetaHateBERT by
//! default) running on Candle. Weights and tokenizer are fetched from the
//! Hugging Face hub or read from a local directory.

pub mod bert;
pub mod classifier;
pub mod model_loader;

pub use bert::BertSequenceClassifier;
pub use classifier::{ClassificationMetadata, ClassificationResult, Classifier};
pub use model_loader::{DeviceType, ModelConfig, ModelFiles, ModelSource, DEFAULT_REPO_ID};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bert::BertSequenceClassifier;
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::model_loader::{DeviceType, ModelConfig, ModelSource};
}
