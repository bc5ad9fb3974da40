use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    ingest::{IngestError, LocationUpdate},
    store::StoreError,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{ChildLocationResponse, ChildQuery};

/// 儿童设备的 HTTP 上报入口，与 WebSocket 通道共用同一条摄入管道
#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Json(update): Json<LocationUpdate>,
) -> impl IntoResponse {
    match state.core.ingest(update).await {
        Ok(ack) => (StatusCode::OK, success_to_api_response(ack)),
        Err(IngestError::Validation(msg)) => (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, msg),
        ),
        Err(IngestError::ChildNotFound(_)) => (
            StatusCode::OK,
            error_to_api_response(error_codes::NOT_FOUND, "Child not found.".to_string()),
        ),
        Err(IngestError::Persistence(e)) => {
            tracing::error!("Error updating child location: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to update child location.".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_child_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ChildQuery>,
) -> impl IntoResponse {
    match state.store.get_for_parent(&query.child_id, &claims.sub).await {
        Ok(record) => (
            StatusCode::OK,
            success_to_api_response(ChildLocationResponse::from(record)),
        ),
        Err(StoreError::NotFound(_)) => (
            StatusCode::OK,
            error_to_api_response(error_codes::NOT_FOUND, "Child not found.".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to load child location: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load child location.".to_string(),
                ),
            )
        }
    }
}
