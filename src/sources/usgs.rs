//! USGS FDSN event catalog source.
//!
//! One GET per fetch: GeoJSON format, explicit time window, minimum
//! magnitude, ascending time order. The catalog legitimately returns an
//! empty feature list for quiet windows; that is data, not a failure.

use crate::config::{HttpConfig, SeismicConfig};
use crate::models::{DailyEventAggregate, UsgsResponse};
use crate::sources::http_client::HttpClient;
use crate::sources::{FetchError, QuakeSource, normalize};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::info;
use url::Url;

pub struct UsgsCatalog {
    client: HttpClient,
    endpoint: Url,
}

impl UsgsCatalog {
    pub fn new(http: &HttpConfig, config: &SeismicConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid seismic base URL {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(http)?,
            endpoint,
        })
    }
}

#[async_trait]
impl QuakeSource for UsgsCatalog {
    async fn fetch_daily(
        &self,
        days: u32,
        min_magnitude: f64,
    ) -> Result<Vec<DailyEventAggregate>, FetchError> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));

        let query = [
            ("format", "geojson".to_string()),
            ("starttime", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("endtime", end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("minmagnitude", min_magnitude.to_string()),
            ("orderby", "time-asc".to_string()),
        ];

        info!(
            "Fetching earthquake data (M >= {}) for the last {} days",
            min_magnitude, days
        );

        let resp: UsgsResponse = self
            .client
            .get_json(self.endpoint.clone(), &query)
            .await
            .map_err(|e| FetchError::SourceUnavailable(e.to_string()))?;

        let daily = normalize::group_events_daily(&resp.features);
        info!(
            "{} events across {} active days",
            resp.features.len(),
            daily.len()
        );

        Ok(daily)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_envelope_decodes() {
        let body = r#"{
            "type": "FeatureCollection",
            "metadata": {"count": 2},
            "features": [
                {"type": "Feature", "properties": {"mag": 4.2, "place": "somewhere", "time": 1704110400000}},
                {"type": "Feature", "properties": {"mag": null, "time": 1704110401000}}
            ]
        }"#;

        let resp: UsgsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.features.len(), 2);
        assert_eq!(resp.features[0].properties.mag, Some(4.2));
        assert_eq!(resp.features[1].properties.mag, None);
    }

    #[test]
    fn test_empty_feature_list_is_data() {
        let resp: UsgsResponse = serde_json::from_str(r#"{"features": []}"#).unwrap();
        assert!(normalize::group_events_daily(&resp.features).is_empty());
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let http = HttpConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            jitter_ms: 0,
            user_agent: "test".into(),
        };
        let config = SeismicConfig {
            base_url: "not a url".into(),
        };
        assert!(UsgsCatalog::new(&http, &config).is_err());
    }
}
