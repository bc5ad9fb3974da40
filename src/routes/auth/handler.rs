use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{
        Claims, error_codes, error_to_api_response, generate_token, hash_password,
        success_to_api_response, verify_password,
    },
};

use super::model::{AuthResponse, CheckAuthResponse, LoginRequest, Parent, SignupRequest};

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> impl IntoResponse {
    // 基本格式校验
    if !req.email.contains('@') || req.email.len() > 254 {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "A valid email address is required.".to_string(),
            ),
        );
    }
    if req.password.len() < 6 {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Password must be at least 6 characters.".to_string(),
            ),
        );
    }
    if req.name.trim().is_empty() {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Name is required.".to_string(),
            ),
        );
    }

    let password_hash = match hash_password(&req.password) {
        Ok(hash) => hash,
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to create account.".to_string(),
                ),
            );
        }
    };

    match Parent::create(&state.pool, &req.email, req.name.trim(), &password_hash).await {
        Ok(parent) => match generate_token(&parent.id, &state.config) {
            Ok((token, expires_at)) => (
                StatusCode::OK,
                success_to_api_response(AuthResponse {
                    parent_id: parent.id,
                    name: parent.name,
                    token,
                    expires_at,
                }),
            ),
            Err(_) => (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to issue token.".to_string(),
                ),
            ),
        },
        Err(e) => {
            if e.to_string().contains("unique constraint")
                || e.to_string().contains("duplicate key")
            {
                (
                    StatusCode::OK,
                    error_to_api_response(
                        error_codes::USER_EXISTS,
                        "An account with this email already exists.".to_string(),
                    ),
                )
            } else {
                tracing::error!("Failed to create parent account: {}", e);
                (
                    StatusCode::OK,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to create account.".to_string(),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let parent = match Parent::find_by_email(&state.pool, &req.email).await {
        Ok(Some(parent)) => parent,
        Ok(None) => {
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::AUTH_FAILED,
                    "Invalid email or password.".to_string(),
                ),
            );
        }
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Database error.".to_string(),
                ),
            );
        }
    };

    match verify_password(&req.password, &parent.password_hash) {
        Ok(true) => (),
        Ok(false) => {
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::AUTH_FAILED,
                    "Invalid email or password.".to_string(),
                ),
            );
        }
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Database error.".to_string(),
                ),
            );
        }
    }

    match generate_token(&parent.id, &state.config) {
        Ok((token, expires_at)) => (
            StatusCode::OK,
            success_to_api_response(AuthResponse {
                parent_id: parent.id,
                name: parent.name,
                token,
                expires_at,
            }),
        ),
        Err(_) => (
            StatusCode::OK,
            error_to_api_response(
                error_codes::INTERNAL_ERROR,
                "Failed to issue token.".to_string(),
            ),
        ),
    }
}

#[axum::debug_handler]
pub async fn check_auth(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    match Parent::find_by_id(&state.pool, &claims.sub).await {
        Ok(Some(parent)) => (
            StatusCode::OK,
            success_to_api_response(CheckAuthResponse {
                parent_id: parent.id,
                email: parent.email,
                name: parent.name,
            }),
        ),
        Ok(None) => (
            StatusCode::OK,
            error_to_api_response(error_codes::NOT_FOUND, "Account not found.".to_string()),
        ),
        Err(e) => {
            tracing::error!("check-auth lookup failed: {}", e);
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Database error.".to_string(),
                ),
            )
        }
    }
}
