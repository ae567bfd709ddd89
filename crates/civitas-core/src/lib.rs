//! Civitas Core
//!
//! Core types and error handling shared across Civitas components.
//!
//! This crate provides:
//! - The moderation record persisted for every analyzed text
//! - Secondary assessments and their sentinel values
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ModerationAction, ModerationRecord, SecondaryAssessment};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ModerationAction, ModerationRecord, SecondaryAssessment};
}
