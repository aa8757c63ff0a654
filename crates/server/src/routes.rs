//! Admin/read surface over the intelligence engine. Individual scoring
//! errors stay operational telemetry; only orchestration-boundary failures
//! surface here, with a correlation id.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dealsense_core::domain::churn::ChurnRiskLevel;
use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::user::UserId;
use dealsense_core::errors::{ApplicationError, InterfaceError};
use dealsense_db::DbPool;
use dealsense_engine::Intelligence;
use serde::Deserialize;

use crate::health;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Intelligence>,
    pub pool: DbPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/buyers/{buyer_id}/products/{product_id}/score", get(score_match))
        .route("/buyers/{buyer_id}/propensity", get(get_propensity))
        .route("/buyers/{buyer_id}/propensity/invalidate", post(invalidate_propensity))
        .route("/buyers/{buyer_id}/predictions/generate", post(generate_buyer_predictions))
        .route("/products/{product_id}/matches/generate", post(generate_product_matches))
        .route("/matches/regenerate", post(regenerate_matches))
        .route("/sellers/{seller_id}/score", post(score_seller))
        .route("/sellers/recalculate", post(recalculate_sellers))
        .route("/predictions/generate", post(generate_predictions))
        .route("/churn/detect", post(detect_churn))
        .route("/churn/at-risk", get(at_risk_buyers))
        .route("/churn/stats", get(churn_stats))
        .with_state(state)
}

/// Application errors mapped onto user-safe responses; the correlation id
/// links the response to the warn-level log line.
pub struct ApiError(InterfaceError);

impl ApiError {
    fn from_app(err: ApplicationError) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::warn!(
            event_name = "system.api.request_failed",
            correlation_id = %correlation_id,
            error = %err,
            "request failed at the orchestration boundary"
        );
        Self(err.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, correlation_id) = match &self.0 {
            InterfaceError::BadRequest { correlation_id, .. } => {
                (StatusCode::BAD_REQUEST, correlation_id.clone())
            }
            InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
            }
            InterfaceError::Internal { correlation_id, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
            }
        };
        let body = Json(serde_json::json!({
            "error": self.0.user_message(),
            "correlation_id": correlation_id,
        }));
        (status, body).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        Self::from_app(err)
    }
}

async fn score_match(
    State(state): State<AppState>,
    Path((buyer_id, product_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scored = state
        .engine
        .matching
        .score_match(&UserId(buyer_id), &ProductId(product_id))
        .await?;
    Ok(Json(serde_json::json!({
        "score": scored.score,
        "breakdown": scored.breakdown,
        "insights": scored.insights,
    })))
}

#[derive(Debug, Deserialize)]
struct PropensityQuery {
    category: Option<String>,
}

async fn get_propensity(
    State(state): State<AppState>,
    Path(buyer_id): Path<String>,
    Query(query): Query<PropensityQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let score = state
        .engine
        .propensity
        .get_propensity(&UserId(buyer_id), query.category.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(&score).unwrap_or_default()))
}

async fn invalidate_propensity(
    State(state): State<AppState>,
    Path(buyer_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let invalidated = state.engine.propensity.invalidate(&UserId(buyer_id)).await?;
    Ok(Json(serde_json::json!({ "invalidated": invalidated })))
}

async fn generate_buyer_predictions(
    State(state): State<AppState>,
    Path(buyer_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = state.engine.reorder.generate_predictions_for_buyer(&UserId(buyer_id)).await?;
    Ok(Json(serde_json::json!({ "predictions_created": created })))
}

async fn generate_product_matches(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created =
        state.engine.matching.generate_matches_for_product(&ProductId(product_id)).await?;
    Ok(Json(serde_json::json!({ "matches_created": created })))
}

async fn regenerate_matches(
    State(state): State<AppState>,
) -> Result<Json<dealsense_engine::MatchSweep>, ApiError> {
    Ok(Json(state.engine.matching.regenerate_all_matches().await?))
}

async fn score_seller(
    State(state): State<AppState>,
    Path(seller_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let score = state.engine.sellers.calculate_seller_scores(&UserId(seller_id)).await?;
    Ok(Json(serde_json::to_value(&score).unwrap_or_default()))
}

async fn recalculate_sellers(
    State(state): State<AppState>,
) -> Result<Json<dealsense_engine::SellerSweep>, ApiError> {
    Ok(Json(state.engine.sellers.recalculate_all_seller_scores().await?))
}

async fn generate_predictions(
    State(state): State<AppState>,
) -> Result<Json<dealsense_engine::PredictionSweep>, ApiError> {
    Ok(Json(state.engine.reorder.generate_predictions().await?))
}

async fn detect_churn(
    State(state): State<AppState>,
) -> Result<Json<dealsense_engine::ChurnSweep>, ApiError> {
    Ok(Json(state.engine.churn.detect_all_churn_signals().await?))
}

#[derive(Debug, Deserialize)]
struct AtRiskQuery {
    min_level: Option<String>,
    limit: Option<i64>,
}

async fn at_risk_buyers(
    State(state): State<AppState>,
    Query(query): Query<AtRiskQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let min_level = query
        .min_level
        .as_deref()
        .map(|raw| {
            ChurnRiskLevel::parse(raw).ok_or_else(|| {
                ApiError::from_app(ApplicationError::Domain(
                    dealsense_core::errors::DomainError::InvariantViolation(format!(
                        "unknown risk level: {raw}"
                    )),
                ))
            })
        })
        .transpose()?
        .unwrap_or(ChurnRiskLevel::Medium);

    let signals = state
        .engine
        .churn
        .get_at_risk_buyers(min_level, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(serde_json::to_value(&signals).unwrap_or_default()))
}

async fn churn_stats(
    State(state): State<AppState>,
) -> Result<Json<dealsense_core::domain::churn::ChurnStats>, ApiError> {
    Ok(Json(state.engine.churn.get_churn_stats().await?))
}
