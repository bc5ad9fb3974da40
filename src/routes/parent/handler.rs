use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    realtime::ChildSnapshot,
    routes::settings::model::Settings,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::DashboardResponse;

#[axum::debug_handler]
pub async fn parent_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    let records = match state.store.list_for_parent(&claims.sub).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to list children for dashboard: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load dashboard.".to_string(),
                ),
            );
        }
    };

    let mut children = Vec::with_capacity(records.len());
    for record in records {
        let alerts = match state.store.list_alerts(&record.id).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!("Failed to load alerts for child {}: {}", record.id, e);
                Vec::new()
            }
        };
        children.push(ChildSnapshot::from_record(&record, alerts));
    }

    let settings = match Settings::fetch(&state.pool, &claims.sub).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings for dashboard: {}", e);
            Settings::default()
        }
    };

    (
        StatusCode::OK,
        success_to_api_response(DashboardResponse { children, settings }),
    )
}
