//! Civitas Moderation
//!
//! The moderation decision pipeline: trust the primary classifier when it is
//! confidently safe, otherwise escalate to a generative secondary analyzer
//! and merge both into a single record.

pub mod analyzer;
pub mod assessment;
pub mod gemini;
pub mod pipeline;
pub mod policy;

pub use analyzer::SecondaryAnalyzer;
pub use gemini::{GeminiAnalyzer, GeminiConfig};
pub use pipeline::ModerationPipeline;
pub use policy::PipelinePolicy;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analyzer::SecondaryAnalyzer;
    pub use crate::pipeline::ModerationPipeline;
    pub use crate::policy::PipelinePolicy;
}
