//! REST client for the EATMS backend.
//!
//! Covers price queries, alert CRUD, notification delivery, and the
//! traffic/weather snapshot endpoints. Auth is a `Token` header sourced
//! best-effort from the key-value store.

use std::sync::Arc;

use async_trait::async_trait;
use common::{
    DateRange, Error, MarketPrice, NotificationSink, PriceAlert, PriceAlertConfig,
    PriceAlertNotification, PriceBackend, PriceHistoryPoint, PriceQuery, PriceTrend,
    TrafficSnapshot, TransportBackend, TrendPeriod, WeatherSnapshot,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use storage::KeyValueStore;
use tracing::{debug, warn};

/// Async REST client for the EATMS API.
#[derive(Clone)]
pub struct EatmsRestClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn KeyValueStore>,
    auth_token_key: String,
}

impl EatmsRestClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: std::time::Duration,
        store: Arc<dyn KeyValueStore>,
        auth_token_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            auth_token_key: auth_token_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Auth token lookup is best-effort; a missing token sends an empty
    /// header value and lets the backend reject the request.
    async fn token(&self) -> String {
        match self.store.get(&self.auth_token_key).await {
            Ok(Some(token)) => token,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("failed to read auth token: {}", e);
                String::new()
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {} ({} params)", path, query.len());

        let resp = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Token {}", self.token().await))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", path, e)))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::fetch_status(path, status, &body));
        }

        resp.json()
            .await
            .map_err(|e| Error::Fetch(format!("{}: malformed response: {}", path, e)))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        debug!("POST {}", path);

        let resp = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Token {}", self.token().await))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", path, e)))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::fetch_status(path, status, &body));
        }

        resp.json()
            .await
            .map_err(|e| Error::Fetch(format!("{}: malformed response: {}", path, e)))
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        debug!("DELETE {}", path);

        let resp = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Token {}", self.token().await))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", path, e)))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::fetch_status(path, status, &body));
        }

        Ok(())
    }
}

fn price_query_params(query: &PriceQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(ref crop) = query.crop_type {
        params.push(("crop_type", crop.clone()));
    }
    if let Some(ref loc) = query.location_id {
        params.push(("location_id", loc.clone()));
    }
    if let Some(ref region) = query.region {
        params.push(("region", region.clone()));
    }
    if let Some(ref market) = query.market_id {
        params.push(("market_id", market.clone()));
    }
    if let Some(ref range) = query.date_range {
        params.push(("start_date", range.start.to_rfc3339()));
        params.push(("end_date", range.end.to_rfc3339()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset", offset.to_string()));
    }
    params
}

#[async_trait]
impl PriceBackend for EatmsRestClient {
    async fn current_prices(&self, query: &PriceQuery) -> Result<Vec<MarketPrice>, Error> {
        self.get_json("/api/prices/current/", &price_query_params(query))
            .await
    }

    async fn price_history(
        &self,
        crop_type: &str,
        location_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<PriceHistoryPoint>, Error> {
        let mut params = vec![
            ("crop_type", crop_type.to_string()),
            ("location_id", location_id.to_string()),
        ];
        if let Some(range) = range {
            params.push(("start_date", range.start.to_rfc3339()));
            params.push(("end_date", range.end.to_rfc3339()));
        }
        self.get_json("/api/prices/history/", &params).await
    }

    async fn price_trends(
        &self,
        crop_types: &[String],
        location_ids: &[String],
        period: TrendPeriod,
    ) -> Result<Vec<PriceTrend>, Error> {
        let params = vec![
            ("crop_types", crop_types.join(",")),
            ("location_ids", location_ids.join(",")),
            ("period", period.as_str().to_string()),
        ];
        self.get_json("/api/prices/trends/", &params).await
    }

    async fn comparative_prices(
        &self,
        crop_type: &str,
        location_ids: &[String],
    ) -> Result<Vec<MarketPrice>, Error> {
        let params = vec![
            ("crop_type", crop_type.to_string()),
            ("location_ids", location_ids.join(",")),
        ];
        self.get_json("/api/prices/comparative/", &params).await
    }

    async fn create_alert(&self, config: &PriceAlertConfig) -> Result<PriceAlert, Error> {
        self.post_json("/api/prices/alerts/", config).await
    }

    async fn delete_alert(&self, alert_id: &str) -> Result<(), Error> {
        self.delete(&format!("/api/prices/alerts/{}/", alert_id)).await
    }

    async fn list_alerts(&self) -> Result<Vec<PriceAlert>, Error> {
        self.get_json("/api/prices/alerts/", &[]).await
    }
}

#[async_trait]
impl TransportBackend for EatmsRestClient {
    async fn current_traffic(&self) -> Result<Vec<TrafficSnapshot>, Error> {
        self.get_json("/api/transport/traffic/current/", &[]).await
    }

    async fn current_weather(&self) -> Result<Vec<WeatherSnapshot>, Error> {
        self.get_json("/api/weather/current/", &[]).await
    }
}

#[async_trait]
impl NotificationSink for EatmsRestClient {
    async fn send(&self, notification: &PriceAlertNotification) -> Result<(), Error> {
        let _: serde_json::Value = self
            .post_json("/api/notifications/price-alert/", notification)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn query_params_cover_all_fields() {
        let query = PriceQuery {
            crop_type: Some("Teff".into()),
            location_id: Some("addis-01".into()),
            region: None,
            market_id: None,
            date_range: Some(DateRange {
                start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            }),
            limit: Some(100),
            offset: None,
        };

        let params = price_query_params(&query);
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["crop_type", "location_id", "start_date", "end_date", "limit"]
        );
    }

    #[test]
    fn empty_query_has_no_params() {
        assert!(price_query_params(&PriceQuery::default()).is_empty());
    }
}
