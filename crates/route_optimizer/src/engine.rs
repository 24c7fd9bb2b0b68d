//! Route optimization engine.
//!
//! Validates requests, consults the result cache, pulls real-time traffic
//! and weather when asked, and hands the rest to the pure planner.

use std::sync::Arc;
use std::time::Duration;

use common::clock::Clock;
use common::config::RouteConfig;
use common::{
    Error, OptimizationGoals, OptimizationResult, RouteConstraints, Ticker, TrafficSnapshot,
    TransportBackend, TransportOrder, Vehicle, WeatherSnapshot,
};
use serde::Serialize;
use storage::{cache_key, ExpiringCache, KeyValueStore};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::planner;

const CACHE_NAMESPACE: &str = "routeOptimizationCache";
const CACHE_KEY_PREFIX: &str = "route_opt";

/// One optimization request.
#[derive(Debug, Clone, Default)]
pub struct OptimizeParams {
    pub orders: Vec<TransportOrder>,
    pub vehicles: Vec<Vehicle>,
    pub constraints: Option<RouteConstraints>,
    pub goals: Option<OptimizationGoals>,
    pub include_real_time_data: bool,
}

/// Cache key input. Keyed by counts, not identities.
// TODO: also digest order and vehicle ids; two equally-sized batches with
// identical constraints currently share a cache entry.
#[derive(Serialize)]
struct CacheKeyParams<'a> {
    orders_count: usize,
    vehicles_count: usize,
    constraints: &'a Option<RouteConstraints>,
    goals: &'a Option<OptimizationGoals>,
}

/// Engine over the transport backend. Cheap to clone; clones share the
/// cache and the latest traffic/weather snapshots.
#[derive(Clone)]
pub struct RouteOptimizationEngine {
    backend: Arc<dyn TransportBackend>,
    cache: ExpiringCache<OptimizationResult>,
    clock: Arc<dyn Clock>,
    config: RouteConfig,
    traffic: Arc<RwLock<Vec<TrafficSnapshot>>>,
    weather: Arc<RwLock<Vec<WeatherSnapshot>>>,
}

impl RouteOptimizationEngine {
    pub async fn new(
        backend: Arc<dyn TransportBackend>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: RouteConfig,
    ) -> Self {
        let cache = ExpiringCache::open(store, CACHE_NAMESPACE, clock.clone()).await;
        Self {
            backend,
            cache,
            clock,
            config,
            traffic: Arc::new(RwLock::new(Vec::new())),
            weather: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Optimize a batch of orders across a fleet.
    pub async fn optimize_routes(
        &self,
        params: &OptimizeParams,
    ) -> Result<OptimizationResult, Error> {
        let now = self.clock.now();
        planner::validate(&params.orders, &params.vehicles, now)?;

        let key = cache_key(
            CACHE_KEY_PREFIX,
            &CacheKeyParams {
                orders_count: params.orders.len(),
                vehicles_count: params.vehicles.len(),
                constraints: &params.constraints,
                goals: &params.goals,
            },
        );

        if let Some(result) = self.cache.get(&key).await {
            debug!("returning cached optimization result");
            return Ok(result);
        }

        // Real-time data is best-effort: a failed fetch plans without it
        // rather than reusing a stale snapshot.
        let weather = if params.include_real_time_data {
            self.refresh_traffic().await;
            match self.backend.current_weather().await {
                Ok(snapshots) => {
                    *self.weather.write().await = snapshots.clone();
                    snapshots
                }
                Err(e) => {
                    warn!("weather fetch failed: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let constraints = params.constraints.clone().unwrap_or_default();
        let goals = params.goals.unwrap_or_default();

        let result = planner::plan(
            &params.orders,
            &params.vehicles,
            &constraints,
            &goals,
            &weather,
            now,
        )?;

        self.cache
            .insert(&key, result.clone(), Duration::from_secs(self.config.cache_ttl_secs))
            .await;
        Ok(result)
    }

    /// Re-fetch traffic; failures keep the previous snapshots.
    pub async fn refresh_traffic(&self) {
        match self.backend.current_traffic().await {
            Ok(snapshots) => {
                debug!("traffic refreshed: {} snapshots", snapshots.len());
                *self.traffic.write().await = snapshots;
            }
            Err(e) => warn!("traffic refresh failed: {}", e),
        }
    }

    /// Re-fetch weather; failures keep the previous snapshots.
    pub async fn refresh_weather(&self) {
        match self.backend.current_weather().await {
            Ok(snapshots) => {
                debug!("weather refreshed: {} snapshots", snapshots.len());
                *self.weather.write().await = snapshots;
            }
            Err(e) => warn!("weather refresh failed: {}", e),
        }
    }

    pub async fn latest_traffic(&self) -> Vec<TrafficSnapshot> {
        self.traffic.read().await.clone()
    }

    pub async fn latest_weather(&self) -> Vec<WeatherSnapshot> {
        self.weather.read().await.clone()
    }

    /// Periodic traffic refresh task.
    pub fn traffic_refresher(&self) -> Ticker {
        let engine = self.clone();
        Ticker::new(
            "traffic-refresh",
            Duration::from_secs(self.config.traffic_refresh_secs),
            move || {
                let engine = engine.clone();
                async move { engine.refresh_traffic().await }
            },
        )
    }

    /// Periodic weather refresh task.
    pub fn weather_refresher(&self) -> Ticker {
        let engine = self.clone();
        Ticker::new(
            "weather-refresh",
            Duration::from_secs(self.config.weather_refresh_secs),
            move || {
                let engine = engine.clone();
                async move { engine.refresh_weather().await }
            },
        )
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}
