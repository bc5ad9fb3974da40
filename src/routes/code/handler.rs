use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{
    AccessCode, GenerateCodeResponse, VerifyCodeRequest, VerifyCodeResponse, random_code,
};

#[axum::debug_handler]
pub async fn generate_child_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    if !state.code_limiter.try_acquire(&claims.sub).await {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::RATE_LIMIT,
                "Too many code requests. Please wait a minute.".to_string(),
            ),
        );
    }

    // 已有活跃码直接返回，避免同一家长攒出一堆有效码
    match AccessCode::find_active_for_parent(&state.pool, &claims.sub).await {
        Ok(Some(existing)) => {
            return (
                StatusCode::OK,
                success_to_api_response(GenerateCodeResponse {
                    code: existing.code,
                    expires_at: existing.expires_at,
                }),
            );
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to look up access codes: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to generate code.".to_string(),
                ),
            );
        }
    }

    let expires_at = Utc::now() + Duration::seconds(state.config.code_expiration_secs);
    // 撞码重试，11 位数字空间下冲突基本不会发生
    for _ in 0..3 {
        let code = random_code();
        match AccessCode::insert(&state.pool, &code, &claims.sub, expires_at).await {
            Ok(created) => {
                tracing::info!("Access code generated for parent {}", claims.sub);
                return (
                    StatusCode::OK,
                    success_to_api_response(GenerateCodeResponse {
                        code: created.code,
                        expires_at: created.expires_at,
                    }),
                );
            }
            Err(e)
                if e.to_string().contains("unique constraint")
                    || e.to_string().contains("duplicate key") =>
            {
                continue;
            }
            Err(e) => {
                tracing::error!("Failed to insert access code: {}", e);
                break;
            }
        }
    }

    (
        StatusCode::OK,
        error_to_api_response(
            error_codes::INTERNAL_ERROR,
            "Failed to generate code.".to_string(),
        ),
    )
}

#[axum::debug_handler]
pub async fn verify_child_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> impl IntoResponse {
    if req.child_name.trim().is_empty() {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "childName is required.".to_string(),
            ),
        );
    }

    let access = match AccessCode::find_valid(&state.pool, req.code.trim()).await {
        Ok(Some(access)) => access,
        Ok(None) => {
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::NOT_FOUND,
                    "Invalid or expired code.".to_string(),
                ),
            );
        }
        Err(e) => {
            tracing::error!("Failed to look up access code: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to verify code.".to_string(),
                ),
            );
        }
    };

    let child = match state
        .store
        .create(&access.parent_id, req.child_name.trim())
        .await
    {
        Ok(child) => child,
        Err(e) => {
            tracing::error!("Failed to create child record: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to verify code.".to_string(),
                ),
            );
        }
    };

    if let Err(e) = AccessCode::mark_used(&state.pool, &access.code).await {
        // 绑定已经成功，码回收失败只记日志
        tracing::warn!("Failed to mark access code as used: {}", e);
    }

    tracing::info!(
        "Child {} linked to parent {} via access code",
        child.id,
        access.parent_id
    );
    (
        StatusCode::OK,
        success_to_api_response(VerifyCodeResponse {
            child_id: child.id,
            parent_id: child.parent_id,
            name: child.name,
        }),
    )
}
