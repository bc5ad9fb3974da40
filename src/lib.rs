use std::sync::Arc;

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

pub mod config;
pub mod middleware;
pub mod utils;

pub mod geo;
pub mod ingest;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod safety;
pub mod store;

use ingest::RealtimeIngestionCore;
use middleware::CodeAttemptLimiter;
use realtime::SessionRegistry;
use store::ChildStateStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub store: Arc<dyn ChildStateStore>,
    pub core: Arc<RealtimeIngestionCore>,
    pub registry: Arc<SessionRegistry>,
    pub code_limiter: Arc<CodeAttemptLimiter>,
}
