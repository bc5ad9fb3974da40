use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// 一次性接入码，家长生成，儿童设备用来完成绑定
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct AccessCode {
    pub code: String,
    pub parent_id: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
    #[serde(rename = "childName")]
    pub child_name: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    #[serde(rename = "childId")]
    pub child_id: String,
    #[serde(rename = "parentId")]
    pub parent_id: String,
    pub name: String,
}

/// 11 位纯数字
pub fn random_code() -> String {
    let mut rng = rand::rng();
    (0..11)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

impl AccessCode {
    /// 同一家长已有未过期未使用的码时直接复用
    pub async fn find_active_for_parent(
        pool: &PgPool,
        parent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AccessCode>(
            r#"
            SELECT code, parent_id, expires_at, used
            FROM child_access_codes
            WHERE parent_id = $1 AND used = false AND expires_at > NOW()
            ORDER BY expires_at DESC
            LIMIT 1
            "#,
        )
        .bind(parent_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn insert(
        pool: &PgPool,
        code: &str,
        parent_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AccessCode>(
            r#"
            INSERT INTO child_access_codes (code, parent_id, expires_at, used)
            VALUES ($1, $2, $3, false)
            RETURNING code, parent_id, expires_at, used
            "#,
        )
        .bind(code)
        .bind(parent_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// 只命中未使用且未过期的码
    pub async fn find_valid(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AccessCode>(
            r#"
            SELECT code, parent_id, expires_at, used
            FROM child_access_codes
            WHERE code = $1 AND used = false AND expires_at > NOW()
            "#,
        )
        .bind(code)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_used(pool: &PgPool, code: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE child_access_codes SET used = true WHERE code = $1")
            .bind(code)
            .execute(pool)
            .await?;
        Ok(())
    }
}
