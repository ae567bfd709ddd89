//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use civitas_core::{Error, ModerationAction, ModerationRecord, Result, SecondaryAssessment};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::reddit::{RedditPost, DEFAULT_LIMIT, DEFAULT_SUBREDDIT};
use crate::state::AppState;

pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let api_routes = Router::new().route("/fetch-reddit", get(fetch_reddit));

    Router::new()
        .route("/analyze", post(analyze))
        .route("/flagged", get(flagged))
        // GET routes also answer HEAD
        .route("/ping", get(ping))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, with credentials allowed
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| Error::config(format!("Invalid CORS origin {}: {}", origin, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub post_id: String,
    pub label: String,
    pub score: f32,
    pub action: ModerationAction,
    pub gemini_sentiment: Option<SecondaryAssessment>,
    pub gemini_score: Option<i64>,
}

impl AnalyzeResponse {
    fn new(post_id: String, record: &ModerationRecord) -> Self {
        let assessment = record.secondary_assessment().cloned();
        Self {
            post_id,
            label: record.label().to_string(),
            score: record.confidence(),
            action: record.action(),
            gemini_score: assessment.as_ref().and_then(|a| a.score),
            gemini_sentiment: assessment,
        }
    }
}

async fn analyze(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> std::result::Result<Json<AnalyzeResponse>, ApiError> {
    let text = match payload {
        Ok(Json(request)) => request.text.unwrap_or_default(),
        Err(rejection) => {
            debug!("Rejected /analyze body: {}", rejection);
            String::new()
        }
    };
    if text.is_empty() {
        return Err(ApiError::BadRequest("No text provided".to_string()));
    }

    let record = state.pipeline.evaluate(&text).await?;
    let post_id = state.store.create(&record).await?;
    metrics::counter!("civitas_records_stored_total").increment(1);
    info!("Stored {} record {}", record.action(), post_id);

    Ok(Json(AnalyzeResponse::new(post_id, &record)))
}

async fn flagged(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<ModerationRecord>>, ApiError> {
    let records = state.store.list_all().await?;
    debug!("Listing {} records", records.len());
    Ok(Json(records))
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "Server is running" }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

#[derive(Debug, Deserialize)]
pub struct FetchRedditParams {
    #[serde(default = "default_subreddit")]
    pub subreddit: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_subreddit() -> String {
    DEFAULT_SUBREDDIT.to_string()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchRedditResponse {
    pub subreddit: String,
    pub posts: Vec<RedditPost>,
}

async fn fetch_reddit(
    State(state): State<AppState>,
    Query(params): Query<FetchRedditParams>,
) -> std::result::Result<Json<FetchRedditResponse>, ApiError> {
    let posts = state
        .reddit
        .fetch_new(&params.subreddit, params.limit)
        .await
        .map_err(ApiError::RedditFetch)?;

    Ok(Json(FetchRedditResponse {
        subreddit: params.subreddit,
        posts,
    }))
}
