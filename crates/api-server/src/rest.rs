//! REST handlers for recommendation requests and operational endpoints.

use crate::context::{ContextHandle, ServingContext};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use streamline_core::config::Strategy;
use streamline_core::{ItemId, RecoError, UserId};
use streamline_models::{Recommendations, Recommender};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Largest `k` a single request may ask for.
const MAX_K: usize = 100;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: ContextHandle,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(context: ContextHandle) -> Self {
        Self {
            context,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendedItem {
    pub id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub request_id: Uuid,
    pub user_id: UserId,
    pub strategy: Strategy,
    pub recommendations: Vec<RecommendedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub generated_at: DateTime<Utc>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// GET /recommend/:user_id?k=
///
/// Top-k items for a user, shaped with catalog metadata.
pub async fn recommend(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendResponse>, ApiError> {
    metrics::counter!("api.recommend.requests").increment(1);

    let Some(context) = state.context.current() else {
        metrics::counter!("api.not_ready").increment(1);
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "model_not_ready",
            "Model not ready",
        ));
    };

    let k = params.k.unwrap_or(context.default_k);
    if k == 0 || k > MAX_K {
        warn!(user_id, k, "Rejected cutoff");
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_k",
            format!("k must be between 1 and {MAX_K}"),
        ));
    }

    let recommendations = match context.model.recommend(user_id, &context.interactions, k) {
        Ok(recommendations) => recommendations,
        Err(RecoError::UnknownUser { .. }) => {
            debug!(user_id, "User outside trained range");
            return Err(api_error(
                StatusCode::NOT_FOUND,
                "unknown_user",
                format!("User {user_id} was not seen during training"),
            ));
        }
        Err(e) => {
            error!(error = %e, user_id, "Recommendation failed");
            metrics::counter!("api.errors").increment(1);
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "recommendation_failed",
                "Internal processing error",
            ));
        }
    };

    let items = shape(&context, &recommendations);
    let message = if items.is_empty() {
        metrics::counter!("api.recommend.empty").increment(1);
        Some("No recommendations available for this user".to_string())
    } else {
        None
    };

    Ok(Json(RecommendResponse {
        request_id: Uuid::new_v4(),
        user_id,
        strategy: context.model.strategy(),
        recommendations: items,
        message,
        generated_at: Utc::now(),
    }))
}

/// Attach catalog metadata to each recommended id. Missing metadata leaves
/// the display fields out.
fn shape(context: &ServingContext, recommendations: &Recommendations) -> Vec<RecommendedItem> {
    let describe = |id: ItemId, score: Option<f64>| {
        let movie = context.catalog.lookup(id);
        RecommendedItem {
            id,
            title: movie.map(|m| m.title.clone()),
            genres: movie.and_then(|m| m.genres.clone()),
            score,
        }
    };

    match recommendations {
        Recommendations::Items(ids) => ids.iter().map(|&id| describe(id, None)).collect(),
        Recommendations::Indices(scored) => scored
            .iter()
            .filter_map(|s| {
                context
                    .model
                    .item_id_for_index(s.index)
                    .map(|id| describe(id, Some(s.score)))
            })
            .collect(),
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let context = state.context.current();
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_ready: context.is_some(),
        strategy: context.as_ref().map(|c| c.model.strategy()),
        trained_at: context.as_ref().map(|c| c.trained_at),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: 200 once a trained model is installed.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.context.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}
