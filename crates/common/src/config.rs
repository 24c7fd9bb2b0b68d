//! Configuration types for the analytics daemon.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub price: PriceConfig,

    #[serde(default)]
    pub route: RouteConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// EATMS backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the EATMS REST backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Key-value store key holding the bearer token.
    #[serde(default = "default_auth_token_key")]
    pub auth_token_key: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Price analytics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// TTL for cached current-price responses.
    #[serde(default = "default_price_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Alert evaluation interval.
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,

    /// How many recent prices to fetch per alert evaluation pass.
    #[serde(default = "default_alert_price_batch")]
    pub alert_price_batch: u32,

    /// How far back prediction history reaches (days).
    #[serde(default = "default_history_window_days")]
    pub history_window_days: i64,

    /// How many of the most recent history points feed the prediction.
    #[serde(default = "default_prediction_points")]
    pub prediction_points: usize,
}

/// Route optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// TTL for cached optimization results.
    #[serde(default = "default_route_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Traffic snapshot refresh interval.
    #[serde(default = "default_traffic_refresh")]
    pub traffic_refresh_secs: u64,

    /// Weather snapshot refresh interval.
    #[serde(default = "default_weather_refresh")]
    pub weather_refresh_secs: u64,
}

/// Durable key-value storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for persisted cache maps and the auth token.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://api.eatms.et".into()
}
fn default_auth_token_key() -> String {
    "authToken".into()
}
fn default_request_timeout() -> u64 {
    15
}

fn default_price_cache_ttl() -> u64 {
    300
}
fn default_alert_interval() -> u64 {
    60
}
fn default_alert_price_batch() -> u32 {
    100
}
fn default_history_window_days() -> i64 {
    90
}
fn default_prediction_points() -> usize {
    30
}

fn default_route_cache_ttl() -> u64 {
    600
}
fn default_traffic_refresh() -> u64 {
    300
}
fn default_weather_refresh() -> u64 {
    1800
}

fn default_data_dir() -> String {
    "data".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token_key: default_auth_token_key(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_price_cache_ttl(),
            alert_interval_secs: default_alert_interval(),
            alert_price_batch: default_alert_price_batch(),
            history_window_days: default_history_window_days(),
            prediction_points: default_prediction_points(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_route_cache_ttl(),
            traffic_refresh_secs: default_traffic_refresh(),
            weather_refresh_secs: default_weather_refresh(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            price: PriceConfig::default(),
            route: RouteConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
