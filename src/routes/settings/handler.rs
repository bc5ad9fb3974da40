use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{Settings, UpdateSettingsRequest};

#[axum::debug_handler]
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    match Settings::fetch(&state.pool, &claims.sub).await {
        Ok(settings) => (StatusCode::OK, success_to_api_response(settings)),
        Err(e) => {
            tracing::error!("Failed to load settings: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load settings.".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSettingsRequest>,
) -> impl IntoResponse {
    if !(1..=3).contains(&req.risk_sensitivity) {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "risk_sensitivity must be between 1 and 3.".to_string(),
            ),
        );
    }
    if !(10..=600).contains(&req.alert_frequency) {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "alert_frequency must be between 10 and 600 seconds.".to_string(),
            ),
        );
    }

    match Settings::upsert(&state.pool, &claims.sub, &req).await {
        Ok(settings) => (StatusCode::OK, success_to_api_response(settings)),
        Err(e) => {
            tracing::error!("Failed to save settings: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to save settings.".to_string(),
                ),
            )
        }
    }
}
