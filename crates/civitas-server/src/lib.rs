//! Civitas Server
//!
//! HTTP surface of the moderation service: text analysis, the stored record
//! listing, a liveness check, Prometheus metrics and a Reddit sample fetcher.

pub mod config;
pub mod error;
pub mod reddit;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use reddit::{RedditAuth, RedditClient, RedditConfig, RedditPost};
pub use routes::{cors_layer, create_router};
pub use state::AppState;
