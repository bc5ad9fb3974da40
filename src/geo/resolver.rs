use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// 反向地理编码拿不到任何行政区划时的占位标签
pub const UNRESOLVED_ZONE: &str = "Unknown Zone";
/// 提供方报错或超时时的占位标签，与“查不到”区分开
pub const PROVIDER_ERROR_ZONE: &str = "Unknown Zone (API Error)";

const DEFAULT_NEARBY_PLACE: &str = "City Mall";

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("reverse geocoding request failed: {0}")]
    Http(String),
    #[error("reverse geocoding response unreadable: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct GeoContext {
    pub zone: String,
    pub nearby_place: Option<String>,
}

impl GeoContext {
    pub fn nearby_place_or_default(&self) -> String {
        self.nearby_place
            .clone()
            .unwrap_or_else(|| DEFAULT_NEARBY_PLACE.to_string())
    }
}

#[async_trait]
pub trait GeoContextResolver: Send + Sync {
    async fn resolve(&self, lat: f64, lon: f64) -> Result<GeoContext, GeoError>;
}

#[derive(Debug, Deserialize, Default)]
pub struct ReverseGeocodeAddress {
    pub hostel: Option<String>,
    pub town: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub road: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReverseGeocodeBody {
    pub address: Option<ReverseGeocodeAddress>,
    pub display_name: Option<String>,
}

/// 行政标签优先级固定：hostel > town > city > county > state > country > display_name
pub fn context_from_body(body: &ReverseGeocodeBody) -> GeoContext {
    let zone = body
        .address
        .as_ref()
        .and_then(|a| {
            a.hostel
                .clone()
                .or_else(|| a.town.clone())
                .or_else(|| a.city.clone())
                .or_else(|| a.county.clone())
                .or_else(|| a.state.clone())
                .or_else(|| a.country.clone())
        })
        .or_else(|| body.display_name.clone())
        .unwrap_or_else(|| UNRESOLVED_ZONE.to_string());

    let nearby_place = body
        .address
        .as_ref()
        .and_then(|a| a.city.clone().or_else(|| a.town.clone()).or_else(|| a.road.clone()));

    GeoContext { zone, nearby_place }
}

/// LocationIQ reverse.php 封装，调用方负责超时预算
pub struct LocationIqResolver {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LocationIqResolver {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl GeoContextResolver for LocationIqResolver {
    async fn resolve(&self, lat: f64, lon: f64) -> Result<GeoContext, GeoError> {
        let url = format!("{}/v1/reverse.php", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| GeoError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeoError::Http(format!(
                "status {}",
                response.status().as_u16()
            )));
        }

        let body: ReverseGeocodeBody = response
            .json()
            .await
            .map_err(|e| GeoError::Decode(e.to_string()))?;

        Ok(context_from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(address: Option<ReverseGeocodeAddress>, display: Option<&str>) -> ReverseGeocodeBody {
        ReverseGeocodeBody {
            address,
            display_name: display.map(str::to_string),
        }
    }

    #[test]
    fn zone_prefers_most_specific_label() {
        let ctx = context_from_body(&body(
            Some(ReverseGeocodeAddress {
                town: Some("Sehore".to_string()),
                state: Some("Madhya Pradesh".to_string()),
                ..Default::default()
            }),
            Some("Sehore, Madhya Pradesh, India"),
        ));
        assert_eq!(ctx.zone, "Sehore");
    }

    #[test]
    fn zone_falls_back_to_display_name() {
        let ctx = context_from_body(&body(None, Some("somewhere remote")));
        assert_eq!(ctx.zone, "somewhere remote");
    }

    #[test]
    fn empty_body_yields_unresolved_sentinel() {
        let ctx = context_from_body(&body(None, None));
        assert_eq!(ctx.zone, UNRESOLVED_ZONE);
        assert_eq!(ctx.nearby_place_or_default(), "City Mall");
    }

    #[test]
    fn nearby_place_prefers_city_then_town_then_road() {
        let ctx = context_from_body(&body(
            Some(ReverseGeocodeAddress {
                town: Some("Ashta".to_string()),
                road: Some("MG Road".to_string()),
                ..Default::default()
            }),
            None,
        ));
        assert_eq!(ctx.nearby_place.as_deref(), Some("Ashta"));
    }
}
