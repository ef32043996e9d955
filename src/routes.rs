use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::db::{Database, Feed};
use crate::error::StoreError;
use crate::normalizer::{NormalizedEntry, SourceStatus};

pub struct AppState {
    pub db: Arc<Database>,
    pub aggregator: Arc<Aggregator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/feeds", get(list_feeds).post(create_feed))
        .route("/feeds/:id", get(show_feed).delete(delete_feed))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct IndexView {
    pub feeds: Vec<Feed>,
    pub entries: Vec<NormalizedEntry>,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Serialize)]
pub struct FeedView {
    pub feed: Feed,
    pub entries: Vec<NormalizedEntry>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewFeed {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub enum AppError {
    NotFound,
    Store(StoreError),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Feed not found.".to_string()),
            AppError::Store(err) => {
                let status = match &err {
                    StoreError::BlankTitle | StoreError::BlankUrl => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    StoreError::DuplicateUrl(_) => StatusCode::CONFLICT,
                    StoreError::Database(_) => {
                        error!("Database error: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
            AppError::Internal(err) => {
                error!("Request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", err))
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Json<IndexView>, AppError> {
    let feeds = state.db.get_all_feeds().await?;
    let urls = state.db.feed_urls().await?;

    let timeline = state.aggregator.timeline(&urls).await;

    Ok(Json(IndexView {
        feeds,
        entries: timeline.entries,
        sources: timeline.sources,
    }))
}

pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Feed>>, AppError> {
    Ok(Json(state.db.get_all_feeds().await?))
}

pub async fn create_feed(
    State(state): State<Arc<AppState>>,
    Json(new_feed): Json<NewFeed>,
) -> Result<impl IntoResponse, AppError> {
    let feed = state.db.create_feed(&new_feed.title, &new_feed.url).await?;
    info!("Feed added: {} ({})", feed.title, feed.url);
    Ok((StatusCode::CREATED, Json(feed)))
}

pub async fn show_feed(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<i64>,
) -> Result<Json<FeedView>, AppError> {
    let feed = state
        .db
        .get_feed(feed_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let outcome = state.aggregator.normalizer().normalize_source(&feed.url).await;
    let error = outcome.status().error;

    Ok(Json(FeedView {
        feed,
        entries: outcome.entries,
        error,
    }))
}

pub async fn delete_feed(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_feed(feed_id).await? {
        return Err(AppError::NotFound);
    }
    info!("Feed {} deleted", feed_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "OK"
}
