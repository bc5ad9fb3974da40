use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    store::StoreError,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{AlertListResponse, AlertQuery};

#[axum::debug_handler]
pub async fn get_child_alerts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AlertQuery>,
) -> impl IntoResponse {
    // 归属校验兼取当前状态，别家的孩子一律 NOT_FOUND
    let record = match state.store.get_for_parent(&query.child_id, &claims.sub).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::NOT_FOUND, "Child not found.".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load child for alerts: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load alerts.".to_string(),
                ),
            );
        }
    };

    match state.store.list_alerts(&query.child_id).await {
        Ok(alerts) => (
            StatusCode::OK,
            success_to_api_response(AlertListResponse {
                child_id: record.id,
                current_status: record.status,
                latitude: record.last_latitude,
                longitude: record.last_longitude,
                current_zone: record.current_zone,
                alerts,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to list alerts: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load alerts.".to_string(),
                ),
            )
        }
    }
}
