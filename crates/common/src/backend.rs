//! Collaborator traits at the external-service boundary.
//!
//! The engines only ever see these traits; the REST client implements them
//! for production and tests supply in-memory fakes.

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{
    DateRange, MarketPrice, PriceAlert, PriceAlertConfig, PriceAlertNotification,
    PriceHistoryPoint, PriceQuery, PriceTrend, TrafficSnapshot, TrendPeriod, WeatherSnapshot,
};

/// Price and alert CRUD endpoints of the EATMS backend.
#[async_trait]
pub trait PriceBackend: Send + Sync {
    async fn current_prices(&self, query: &PriceQuery) -> Result<Vec<MarketPrice>, Error>;

    /// Ordered oldest-first.
    async fn price_history(
        &self,
        crop_type: &str,
        location_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<PriceHistoryPoint>, Error>;

    async fn price_trends(
        &self,
        crop_types: &[String],
        location_ids: &[String],
        period: TrendPeriod,
    ) -> Result<Vec<PriceTrend>, Error>;

    async fn comparative_prices(
        &self,
        crop_type: &str,
        location_ids: &[String],
    ) -> Result<Vec<MarketPrice>, Error>;

    async fn create_alert(&self, config: &PriceAlertConfig) -> Result<PriceAlert, Error>;

    async fn delete_alert(&self, alert_id: &str) -> Result<(), Error>;

    async fn list_alerts(&self) -> Result<Vec<PriceAlert>, Error>;
}

/// Real-time traffic and weather snapshot providers.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    async fn current_traffic(&self) -> Result<Vec<TrafficSnapshot>, Error>;

    async fn current_weather(&self) -> Result<Vec<WeatherSnapshot>, Error>;
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &PriceAlertNotification) -> Result<(), Error>;
}
