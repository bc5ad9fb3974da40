use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub code_attempt_window_secs: u64,
    pub code_attempt_quota: u32,
    pub code_expiration_secs: i64,
    pub server_host: String,
    pub server_port: u16,
    pub location_iq_api_key: String,
    pub location_iq_base_url: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub geo_timeout_secs: u64,
    pub safety_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")?
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .unwrap_or_default()
                .parse()
                .unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(100),
            code_attempt_window_secs: env::var("CODE_ATTEMPT_WINDOW")
                .unwrap_or_default()
                .parse()
                .unwrap_or(60),
            code_attempt_quota: env::var("CODE_ATTEMPT_QUOTA")
                .unwrap_or_default()
                .parse()
                .unwrap_or(5),
            // 接入码 4 分钟过期
            code_expiration_secs: env::var("CODE_EXPIRATION")
                .unwrap_or_default()
                .parse()
                .unwrap_or(240),
            location_iq_api_key: env::var("LOCATIONIQ_API_KEY")?,
            location_iq_base_url: env::var("LOCATIONIQ_BASE_URL")
                .unwrap_or_else(|_| "https://us1.locationiq.com".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY")?,
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            geo_timeout_secs: env::var("GEO_TIMEOUT")
                .unwrap_or_default()
                .parse()
                .unwrap_or(4),
            safety_timeout_secs: env::var("SAFETY_TIMEOUT")
                .unwrap_or_default()
                .parse()
                .unwrap_or(15),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn code_attempt_window(&self) -> Duration {
        Duration::from_secs(self.code_attempt_window_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo_timeout_secs)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_secs(self.safety_timeout_secs)
    }
}
