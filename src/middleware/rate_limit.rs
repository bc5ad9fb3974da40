use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: Config) -> Self {
        Self {
            redis: Arc::new(redis),
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, StatusCode> {
        // 反代头优先，直连时退回连接信息里的原始IP
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .or_else(|| remote_ip.as_deref())
            .unwrap_or("unknown")
            .trim()
            .to_string();

        let key = format!("rate_limit:{}", ip);
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        // INCR + EXPIRE 固定窗口计数
        let count: i32 = conn
            .incr(&key, 1)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        if count == 1 {
            let _: () = conn
                .expire(&key, self.config.rate_limit_window().as_secs() as i64)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        }

        if count > self.config.rate_limit_requests as i32 {
            tracing::warn!("Rate limit exceeded for ip {}", ip);
            return Ok((
                StatusCode::OK,
                error_to_api_response::<()>(
                    error_codes::RATE_LIMIT,
                    format!(
                        "Too many requests. Please retry after {} seconds.",
                        self.config.rate_limit_window().as_secs()
                    ),
                ),
            )
                .into_response());
        }

        Ok(next.run(req).await)
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    limiter.check_rate_limit(req, next).await
}

/// 接入码生成配额：每家长固定窗口计数，进程内即可，无需跨实例共享
pub struct CodeAttemptLimiter {
    windows: Mutex<HashMap<String, (Instant, u32)>>,
    window: Duration,
    quota: u32,
}

impl CodeAttemptLimiter {
    pub fn new(window: Duration, quota: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            quota,
        }
    }

    /// 计一次尝试；窗口内超出配额返回 false
    pub async fn try_acquire(&self, parent_id: &str) -> bool {
        self.try_acquire_at(parent_id, Instant::now()).await
    }

    async fn try_acquire_at(&self, parent_id: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(parent_id.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.quota {
            return false;
        }
        entry.1 += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_is_enforced_within_window() {
        let limiter = CodeAttemptLimiter::new(Duration::from_secs(60), 5);
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.try_acquire_at("p-1", start).await);
        }
        assert!(!limiter.try_acquire_at("p-1", start).await);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = CodeAttemptLimiter::new(Duration::from_secs(60), 5);
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.try_acquire_at("p-1", start).await);
        }
        assert!(!limiter.try_acquire_at("p-1", start).await);

        let later = start + Duration::from_secs(61);
        assert!(limiter.try_acquire_at("p-1", later).await);
    }

    #[tokio::test]
    async fn parents_are_counted_independently() {
        let limiter = CodeAttemptLimiter::new(Duration::from_secs(60), 1);
        let start = Instant::now();
        assert!(limiter.try_acquire_at("p-1", start).await);
        assert!(!limiter.try_acquire_at("p-1", start).await);
        assert!(limiter.try_acquire_at("p-2", start).await);
    }
}
