//! Price analytics engine.
//!
//! Thin I/O layer over the pure `stats` and `alerts` modules: cache-then-
//! fetch for current prices, live fetches for history, and the periodic
//! alert evaluation loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use common::clock::Clock;
use common::{
    AlertKind, DateRange, Error, MarketPrice, NotificationSink, PriceAlert, PriceAlertConfig,
    PriceAlertNotification, PriceBackend, PriceHistoryPoint, PricePrediction, PriceQuery,
    PriceTrend, Ticker, TrendPeriod,
};
use common::config::PriceConfig;
use storage::{cache_key, ExpiringCache, KeyValueStore};
use tracing::{debug, info, warn};

const CACHE_NAMESPACE: &str = "priceCache";
const CACHE_KEY_PREFIX: &str = "price";

/// Lookback for the change-threshold alert check.
const CHANGE_LOOKBACK_HOURS: i64 = 24;

/// Engine over the price backend. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct PriceAnalyticsEngine {
    backend: Arc<dyn PriceBackend>,
    notifier: Arc<dyn NotificationSink>,
    cache: ExpiringCache<Vec<MarketPrice>>,
    clock: Arc<dyn Clock>,
    config: PriceConfig,
}

impl PriceAnalyticsEngine {
    pub async fn new(
        backend: Arc<dyn PriceBackend>,
        notifier: Arc<dyn NotificationSink>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: PriceConfig,
    ) -> Self {
        let cache = ExpiringCache::open(store, CACHE_NAMESPACE, clock.clone()).await;
        Self {
            backend,
            notifier,
            cache,
            clock,
            config,
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Current prices, cached per query for the configured TTL.
    pub async fn current_prices(&self, query: &PriceQuery) -> Result<Vec<MarketPrice>, Error> {
        let key = cache_key(CACHE_KEY_PREFIX, query);

        if let Some(prices) = self.cache.get(&key).await {
            debug!("returning {} cached prices", prices.len());
            return Ok(prices);
        }

        let prices = self.backend.current_prices(query).await?;
        self.cache
            .insert(&key, prices.clone(), Duration::from_secs(self.config.cache_ttl_secs))
            .await;
        Ok(prices)
    }

    /// Always fetched live — stale history would corrupt predictions.
    pub async fn price_history(
        &self,
        crop_type: &str,
        location_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<PriceHistoryPoint>, Error> {
        self.backend.price_history(crop_type, location_id, range).await
    }

    pub async fn price_trends(
        &self,
        crop_types: &[String],
        location_ids: &[String],
        period: TrendPeriod,
    ) -> Result<Vec<PriceTrend>, Error> {
        self.backend.price_trends(crop_types, location_ids, period).await
    }

    pub async fn comparative_prices(
        &self,
        crop_type: &str,
        location_ids: &[String],
    ) -> Result<Vec<MarketPrice>, Error> {
        self.backend.comparative_prices(crop_type, location_ids).await
    }

    /// Predict the price `days_ahead` days out from recent history.
    pub async fn predict_price(
        &self,
        crop_type: &str,
        location_id: &str,
        days_ahead: i64,
    ) -> Result<PricePrediction, Error> {
        let now = self.clock.now();
        let range = DateRange {
            start: now - chrono::Duration::days(self.config.history_window_days),
            end: now,
        };

        let history = self
            .backend
            .price_history(crop_type, location_id, Some(&range))
            .await?;

        if history.is_empty() {
            return Err(Error::Validation(format!(
                "no price history for {} at {}",
                crop_type, location_id
            )));
        }

        let start = history.len().saturating_sub(self.config.prediction_points);
        let window: Vec<f64> = history[start..].iter().map(|p| p.price).collect();

        Ok(crate::stats::build_prediction(&window, days_ahead, now.month()))
    }

    // ── Alerts ────────────────────────────────────────────────────────

    pub async fn subscribe_alert(&self, config: &PriceAlertConfig) -> Result<PriceAlert, Error> {
        self.backend.create_alert(config).await
    }

    pub async fn unsubscribe_alert(&self, alert_id: &str) -> Result<(), Error> {
        self.backend.delete_alert(alert_id).await
    }

    pub async fn alerts(&self) -> Result<Vec<PriceAlert>, Error> {
        self.backend.list_alerts().await
    }

    /// One alert evaluation pass. All failures are logged and swallowed —
    /// the loop must survive a flaky backend.
    pub async fn run_alert_cycle(&self) {
        let alerts = match self.backend.list_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!("alert cycle: failed to list alerts: {}", e);
                return;
            }
        };

        if alerts.is_empty() {
            return;
        }

        let query = PriceQuery {
            limit: Some(self.config.alert_price_batch),
            ..Default::default()
        };
        let prices = match self.current_prices(&query).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("alert cycle: failed to fetch current prices: {}", e);
                return;
            }
        };

        debug!("evaluating {} alerts against {} prices", alerts.len(), prices.len());

        for alert in alerts.iter().filter(|a| a.enabled) {
            if let Err(e) = self.evaluate_alert(alert, &prices).await {
                warn!("alert {} evaluation failed: {}", alert.id, e);
            }
        }
    }

    /// Evaluate one alert; at most one kind fires per cycle, min/max
    /// before the change threshold.
    async fn evaluate_alert(&self, alert: &PriceAlert, prices: &[MarketPrice]) -> Result<(), Error> {
        let Some(matching) = prices
            .iter()
            .find(|p| p.crop_type == alert.crop_type && p.location_id == alert.location_id)
        else {
            return Ok(());
        };
        let current_price = matching.price;

        if let Some(kind) = crate::alerts::check_static_thresholds(alert, current_price) {
            self.fire(alert, kind, current_price, None).await;
            return Ok(());
        }

        if let Some(threshold) = alert.price_change_threshold_percent {
            let now = self.clock.now();
            let range = DateRange {
                start: now - chrono::Duration::hours(CHANGE_LOOKBACK_HOURS),
                end: now,
            };
            let history = self
                .backend
                .price_history(&alert.crop_type, &alert.location_id, Some(&range))
                .await?;

            if history.len() >= 2 {
                let change = crate::alerts::percent_change(history[0].price, current_price);
                if change.abs() >= threshold {
                    self.fire(alert, AlertKind::PriceChange, current_price, Some(change))
                        .await;
                }
            }
        }

        Ok(())
    }

    async fn fire(
        &self,
        alert: &PriceAlert,
        kind: AlertKind,
        current_price: f64,
        price_change: Option<f64>,
    ) {
        let notification = PriceAlertNotification {
            alert_id: alert.id.clone(),
            kind,
            current_price,
            price_change,
            message: crate::alerts::alert_message(alert, kind, current_price, price_change),
        };

        match self.notifier.send(&notification).await {
            Ok(()) => info!("price alert fired: {} {:?}", alert.id, kind),
            Err(e) => warn!("failed to deliver alert {}: {}", alert.id, e),
        }
    }

    /// Periodic alert monitor. The caller owns the returned ticker and its
    /// start/stop lifecycle.
    pub fn alert_monitor(&self) -> Ticker {
        let engine = self.clone();
        Ticker::new(
            "price-alerts",
            Duration::from_secs(self.config.alert_interval_secs),
            move || {
                let engine = engine.clone();
                async move { engine.run_alert_cycle().await }
            },
        )
    }

    // ── Maintenance ───────────────────────────────────────────────────

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use common::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use storage::MemoryStore;

    struct FakeBackend {
        prices: Vec<MarketPrice>,
        history: Vec<PriceHistoryPoint>,
        alerts: Vec<PriceAlert>,
        price_fetches: AtomicUsize,
        fail_prices: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                prices: Vec::new(),
                history: Vec::new(),
                alerts: Vec::new(),
                price_fetches: AtomicUsize::new(0),
                fail_prices: false,
            }
        }
    }

    #[async_trait]
    impl PriceBackend for FakeBackend {
        async fn current_prices(&self, _query: &PriceQuery) -> Result<Vec<MarketPrice>, Error> {
            self.price_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_prices {
                return Err(Error::Fetch("backend down".into()));
            }
            Ok(self.prices.clone())
        }

        async fn price_history(
            &self,
            _crop_type: &str,
            _location_id: &str,
            _range: Option<&DateRange>,
        ) -> Result<Vec<PriceHistoryPoint>, Error> {
            Ok(self.history.clone())
        }

        async fn price_trends(
            &self,
            _crop_types: &[String],
            _location_ids: &[String],
            _period: TrendPeriod,
        ) -> Result<Vec<PriceTrend>, Error> {
            Ok(Vec::new())
        }

        async fn comparative_prices(
            &self,
            _crop_type: &str,
            _location_ids: &[String],
        ) -> Result<Vec<MarketPrice>, Error> {
            Ok(self.prices.clone())
        }

        async fn create_alert(&self, config: &PriceAlertConfig) -> Result<PriceAlert, Error> {
            Ok(PriceAlert {
                id: "new-alert".into(),
                crop_type: config.crop_type.clone(),
                location_id: config.location_id.clone(),
                location_name: None,
                min_price: config.min_price,
                max_price: config.max_price,
                price_change_threshold_percent: config.price_change_threshold_percent,
                enabled: config.enabled,
            })
        }

        async fn delete_alert(&self, _alert_id: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn list_alerts(&self) -> Result<Vec<PriceAlert>, Error> {
            Ok(self.alerts.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<PriceAlertNotification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, notification: &PriceAlertNotification) -> Result<(), Error> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn teff_price(price: f64) -> MarketPrice {
        MarketPrice {
            crop_type: "Teff".into(),
            location_id: "X".into(),
            price,
            unit: "quintal".into(),
            market: "Addis Mercato".into(),
            region: "Addis Ababa".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn alert(
        min: Option<f64>,
        max: Option<f64>,
        change: Option<f64>,
        enabled: bool,
    ) -> PriceAlert {
        PriceAlert {
            id: "a1".into(),
            crop_type: "Teff".into(),
            location_id: "X".into(),
            location_name: None,
            min_price: min,
            max_price: max,
            price_change_threshold_percent: change,
            enabled,
        }
    }

    async fn engine_with(
        backend: FakeBackend,
        sink: Arc<RecordingSink>,
    ) -> (PriceAnalyticsEngine, Arc<FakeBackend>, Arc<ManualClock>) {
        let backend = Arc::new(backend);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let engine = PriceAnalyticsEngine::new(
            backend.clone(),
            sink,
            Arc::new(MemoryStore::new()),
            clock.clone(),
            PriceConfig::default(),
        )
        .await;
        (engine, backend, clock)
    }

    #[tokio::test]
    async fn current_prices_hit_cache_within_ttl() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(30.0)];
        let (engine, backend, clock) =
            engine_with(backend, Arc::new(RecordingSink::default())).await;

        let query = PriceQuery {
            crop_type: Some("Teff".into()),
            ..Default::default()
        };

        engine.current_prices(&query).await.unwrap();
        engine.current_prices(&query).await.unwrap();
        assert_eq!(backend.price_fetches.load(Ordering::SeqCst), 1);

        // Past the 5-minute TTL the next call refetches.
        clock.advance(chrono::Duration::seconds(301));
        engine.current_prices(&query).await.unwrap();
        assert_eq!(backend.price_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_queries_do_not_share_cache_entries() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(30.0)];
        let (engine, backend, _clock) =
            engine_with(backend, Arc::new(RecordingSink::default())).await;

        let teff = PriceQuery {
            crop_type: Some("Teff".into()),
            ..Default::default()
        };
        let maize = PriceQuery {
            crop_type: Some("Maize".into()),
            ..Default::default()
        };

        engine.current_prices(&teff).await.unwrap();
        engine.current_prices(&maize).await.unwrap();
        assert_eq!(backend.price_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_without_fallback() {
        let mut backend = FakeBackend::new();
        backend.fail_prices = true;
        let (engine, _backend, _clock) =
            engine_with(backend, Arc::new(RecordingSink::default())).await;

        let err = engine
            .current_prices(&PriceQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn predict_price_rejects_empty_history() {
        let (engine, _backend, _clock) =
            engine_with(FakeBackend::new(), Arc::new(RecordingSink::default())).await;

        let err = engine.predict_price("Teff", "X", 7).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn predict_price_uses_most_recent_thirty_points() {
        let mut backend = FakeBackend::new();
        // 60 old points at 100, then 30 recent points at 10: only the
        // recent window should feed the prediction.
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        for i in 0..60 {
            backend.history.push(PriceHistoryPoint {
                price: 100.0,
                timestamp: t0 + chrono::Duration::days(i),
            });
        }
        for i in 60..90 {
            backend.history.push(PriceHistoryPoint {
                price: 10.0,
                timestamp: t0 + chrono::Duration::days(i),
            });
        }
        let (engine, _backend, _clock) =
            engine_with(backend, Arc::new(RecordingSink::default())).await;

        let prediction = engine.predict_price("Teff", "X", 7).await.unwrap();
        assert_eq!(prediction.predicted_price, 10.0);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[tokio::test]
    async fn min_price_alert_fires_once_with_price_and_threshold() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(18.0)];
        backend.alerts = vec![alert(Some(20.0), None, None, true)];
        let sink = Arc::new(RecordingSink::default());
        let (engine, _backend, _clock) = engine_with(backend, sink.clone()).await;

        engine.run_alert_cycle().await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, AlertKind::MinPrice);
        assert_eq!(sent[0].current_price, 18.0);
        assert!(sent[0].message.contains("18.00"));
        assert!(sent[0].message.contains("20"));
    }

    #[tokio::test]
    async fn static_thresholds_win_over_change_threshold() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(18.0)];
        // 24h history would also trip the change threshold; min must win.
        backend.history = vec![
            PriceHistoryPoint {
                price: 30.0,
                timestamp: Utc.with_ymd_and_hms(2025, 5, 31, 13, 0, 0).unwrap(),
            },
            PriceHistoryPoint {
                price: 18.0,
                timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
            },
        ];
        backend.alerts = vec![alert(Some(20.0), None, Some(5.0), true)];
        let sink = Arc::new(RecordingSink::default());
        let (engine, _backend, _clock) = engine_with(backend, sink.clone()).await;

        engine.run_alert_cycle().await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, AlertKind::MinPrice);
    }

    #[tokio::test]
    async fn change_threshold_fires_on_large_swings() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(24.0)];
        backend.history = vec![
            PriceHistoryPoint {
                price: 20.0,
                timestamp: Utc.with_ymd_and_hms(2025, 5, 31, 13, 0, 0).unwrap(),
            },
            PriceHistoryPoint {
                price: 24.0,
                timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
            },
        ];
        backend.alerts = vec![alert(None, None, Some(10.0), true)];
        let sink = Arc::new(RecordingSink::default());
        let (engine, _backend, _clock) = engine_with(backend, sink.clone()).await;

        engine.run_alert_cycle().await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, AlertKind::PriceChange);
        assert_eq!(sent[0].price_change, Some(20.0));
        assert!(sent[0].message.contains("increased by 20.0%"));
    }

    #[tokio::test]
    async fn disabled_alerts_never_fire() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(18.0)];
        backend.alerts = vec![alert(Some(20.0), None, None, false)];
        let sink = Arc::new(RecordingSink::default());
        let (engine, _backend, _clock) = engine_with(backend, sink.clone()).await;

        engine.run_alert_cycle().await;
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmatched_alerts_do_not_fire() {
        let mut backend = FakeBackend::new();
        backend.prices = vec![teff_price(18.0)];
        let mut other = alert(Some(20.0), None, None, true);
        other.crop_type = "Maize".into();
        backend.alerts = vec![other];
        let sink = Arc::new(RecordingSink::default());
        let (engine, _backend, _clock) = engine_with(backend, sink.clone()).await;

        engine.run_alert_cycle().await;
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribe_returns_created_alert() {
        let (engine, _backend, _clock) =
            engine_with(FakeBackend::new(), Arc::new(RecordingSink::default())).await;

        let created = engine
            .subscribe_alert(&PriceAlertConfig {
                crop_type: "Teff".into(),
                location_id: "X".into(),
                min_price: Some(20.0),
                max_price: None,
                price_change_threshold_percent: None,
                enabled: true,
            })
            .await
            .unwrap();

        assert_eq!(created.id, "new-alert");
        assert_eq!(created.min_price, Some(20.0));
    }
}
