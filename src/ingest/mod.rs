use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{GeoContextResolver, GeofenceEvaluator, PROVIDER_ERROR_ZONE};
use crate::models::{Alert, AlertType, Priority};
use crate::realtime::{ChildSnapshot, OutboundEvent, SessionRegistry};
use crate::safety::{CrowdDensity, SafetyAnalyzer, SafetyContext, Sensitivity};
use crate::store::{ChildStateDelta, ChildStateStore, StoreError};

/// 设备上送的一次位置更新，只在管道内短暂存在
#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdate {
    #[serde(rename = "childId")]
    pub child_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub nearest_poi: Option<String>,
    #[serde(default)]
    pub poi_type: Option<String>,
    #[serde(default)]
    pub crowd_density: Option<serde_json::Value>,
    #[serde(default)]
    pub crime_score: Option<f64>,
    #[serde(default)]
    pub is_familiar: Option<bool>,
    #[serde(default)]
    pub parent_sensitivity: Option<Sensitivity>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    /// 坐标必有，其余上下文信号有多少带多少
    fn safety_context(&self) -> SafetyContext {
        SafetyContext {
            latitude: self.latitude,
            longitude: self.longitude,
            floor: None,
            accuracy: self.accuracy,
            nearest_poi: self.nearest_poi.clone(),
            poi_type: self.poi_type.clone(),
            crowd_density: self.crowd_density.as_ref().and_then(CrowdDensity::from_signal),
            crime_score: self.crime_score,
            is_familiar: self.is_familiar,
            parent_sensitivity: self.parent_sensitivity,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),
    #[error("Child not found.")]
    ChildNotFound(String),
    #[error("Failed to update child location.")]
    Persistence(String),
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => IngestError::ChildNotFound(id),
            StoreError::Persistence(msg) => IngestError::Persistence(msg),
        }
    }
}

/// 成功回执，设备端直接用 zone 渲染反馈
#[derive(Debug, Clone, Serialize)]
pub struct IngestAck {
    pub message: String,
    #[serde(rename = "currentZone")]
    pub current_zone: String,
    #[serde(rename = "nearbyPlace")]
    pub nearby_place: String,
}

/// 位置摄入与扇出的唯一权威管道
pub struct RealtimeIngestionCore {
    store: Arc<dyn ChildStateStore>,
    resolver: Arc<dyn GeoContextResolver>,
    analyzer: Arc<dyn SafetyAnalyzer>,
    geofence: GeofenceEvaluator,
    registry: Arc<SessionRegistry>,
    geo_timeout: Duration,
    safety_timeout: Duration,
}

impl RealtimeIngestionCore {
    pub fn new(
        store: Arc<dyn ChildStateStore>,
        resolver: Arc<dyn GeoContextResolver>,
        analyzer: Arc<dyn SafetyAnalyzer>,
        geofence: GeofenceEvaluator,
        registry: Arc<SessionRegistry>,
        geo_timeout: Duration,
        safety_timeout: Duration,
    ) -> Self {
        Self {
            store,
            resolver,
            analyzer,
            geofence,
            registry,
            geo_timeout,
            safety_timeout,
        }
    }

    pub async fn ingest(&self, update: LocationUpdate) -> Result<IngestAck, IngestError> {
        // 1. 校验，失败不产生任何副作用
        validate(&update)?;

        // 2. 身份解析，未知 child 直接丢弃
        let record = self.store.get(&update.child_id).await.map_err(|e| match e {
            StoreError::NotFound(id) => IngestError::ChildNotFound(id),
            other => IngestError::Persistence(other.to_string()),
        })?;

        // 3. 反向地理编码（尽力而为），失败降级为占位标签，绝不阻断提交
        let geo = match tokio::time::timeout(
            self.geo_timeout,
            self.resolver.resolve(update.latitude, update.longitude),
        )
        .await
        {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(e)) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                crate::geo::GeoContext {
                    zone: PROVIDER_ERROR_ZONE.to_string(),
                    nearby_place: None,
                }
            }
            Err(_) => {
                tracing::warn!("Reverse geocoding timed out after {:?}", self.geo_timeout);
                crate::geo::GeoContext {
                    zone: PROVIDER_ERROR_ZONE.to_string(),
                    nearby_place: None,
                }
            }
        };

        // 4. 围栏求值（纯函数）
        let (new_status, mut new_alerts) = self.geofence.evaluate(
            &update.child_id,
            update.latitude,
            update.longitude,
            record.status,
        );

        // 5. 安全分析（尽力而为，受超时预算约束），每次接受的更新都做，失败转为低优告警
        let context = update.safety_context();
        match tokio::time::timeout(self.safety_timeout, self.analyzer.analyze(&context)).await {
            Ok(Ok(narration)) => {
                new_alerts.push(Alert::new(
                    &update.child_id,
                    AlertType::Safety,
                    narration.risk_level.into(),
                    narration.narrative_alert,
                    narration.recommended_action,
                ));
            }
            Ok(Err(e)) => {
                tracing::warn!("Safety analysis failed: {}", e);
                new_alerts.push(Alert::new(
                    &update.child_id,
                    AlertType::SystemWarning,
                    Priority::Low,
                    format!("Safety analysis unavailable: {e}"),
                    vec![],
                ));
            }
            Err(_) => {
                tracing::warn!(
                    "Safety analysis timed out after {:?}",
                    self.safety_timeout
                );
                new_alerts.push(Alert::new(
                    &update.child_id,
                    AlertType::SystemWarning,
                    Priority::Low,
                    "Safety analysis timed out.".to_string(),
                    vec![],
                ));
            }
        }

        // 6. 原子提交
        let delta = ChildStateDelta {
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            zone: geo.zone.clone(),
            status: new_status,
            observed_at: update.timestamp.unwrap_or_else(Utc::now),
        };
        let outcome = self
            .store
            .commit(&update.child_id, delta, new_alerts.clone())
            .await?;

        if !outcome.applied {
            // 已有更新的数据落库，本次提交整体忽略，也不对外扇出
            tracing::debug!(
                "Stale update for child {} ignored at commit",
                update.child_id
            );
            let nearby_place = geo.nearby_place_or_default();
            return Ok(IngestAck {
                message: "Stale location update ignored.".to_string(),
                current_zone: geo.zone,
                nearby_place,
            });
        }

        // 7. 扇出：快照 + 每条新告警一个事件；无人订阅是合法的静默
        let history = self.store.list_alerts(&update.child_id).await?;
        let snapshot =
            OutboundEvent::ChildUpdated(ChildSnapshot::from_record(&outcome.record, history));
        let delivered = self
            .registry
            .publish(&outcome.record.parent_id, &snapshot)
            .await;
        for alert in new_alerts {
            self.registry
                .publish(
                    &outcome.record.parent_id,
                    &OutboundEvent::NewAlert {
                        child_id: update.child_id.clone(),
                        alert,
                    },
                )
                .await;
        }
        if delivered == 0 {
            tracing::debug!(
                "No session bound to parent {}, events dropped",
                outcome.record.parent_id
            );
        }

        // 8. 回执
        let nearby_place = geo.nearby_place_or_default();
        Ok(IngestAck {
            message: "Location updated successfully.".to_string(),
            current_zone: geo.zone,
            nearby_place,
        })
    }
}

fn validate(update: &LocationUpdate) -> Result<(), IngestError> {
    if update.child_id.trim().is_empty() {
        return Err(IngestError::Validation(
            "childId, latitude, and longitude are required.".to_string(),
        ));
    }
    if !update.latitude.is_finite() || !(-90.0..=90.0).contains(&update.latitude) {
        return Err(IngestError::Validation(
            "latitude must be between -90 and 90.".to_string(),
        ));
    }
    if !update.longitude.is_finite() || !(-180.0..=180.0).contains(&update.longitude) {
        return Err(IngestError::Validation(
            "longitude must be between -180 and 180.".to_string(),
        ));
    }
    if let Some(accuracy) = update.accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(IngestError::Validation(
                "accuracy must be non-negative.".to_string(),
            ));
        }
    }
    Ok(())
}
