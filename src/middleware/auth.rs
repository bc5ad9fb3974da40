use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::utils::{error_codes, error_to_api_response, verify_token};

/// 校验 Bearer token，并把 Claims 注入请求扩展供 handler 使用
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        return error_to_api_response::<()>(
            error_codes::AUTH_FAILED,
            "Missing authorization token.".to_string(),
        )
        .into_response();
    };

    match verify_token(token, &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            error_to_api_response::<()>(
                error_codes::AUTH_FAILED,
                "Invalid or expired token.".to_string(),
            )
            .into_response()
        }
    }
}
