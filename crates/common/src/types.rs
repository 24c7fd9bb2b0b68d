//! Domain types shared across the engines.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Geography ─────────────────────────────────────────────────────────

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Inclusive date range used in history and trend queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ── Market price types ────────────────────────────────────────────────

/// A market price snapshot as returned by GET /api/prices/current/.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrice {
    pub crop_type: String,
    pub location_id: String,
    pub price: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub region: String,
    pub timestamp: DateTime<Utc>,
}

/// One point of a per-(crop, location) price series, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// A trend summary as returned by the backend's trend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTrend {
    pub crop_type: String,
    pub location_id: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub average_price: f64,
}

/// Aggregation window for trend queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl TrendPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Day => "day",
            TrendPeriod::Week => "week",
            TrendPeriod::Month => "month",
            TrendPeriod::Year => "year",
        }
    }
}

/// Query parameters for current-price lookups. Also the cache key input,
/// so field order must stay stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

// ── Price alerts ──────────────────────────────────────────────────────

/// User-supplied alert definition, posted to the backend on subscribe.
///
/// At least one of `min_price`, `max_price`,
/// `price_change_threshold_percent` must be set for the alert to ever fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlertConfig {
    pub crop_type: String,
    pub location_id: String,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub price_change_threshold_percent: Option<f64>,
    pub enabled: bool,
}

/// A registered alert as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: String,
    pub crop_type: String,
    pub location_id: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub price_change_threshold_percent: Option<f64>,
    #[serde(default)]
    pub enabled: bool,
}

/// Which alert condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    MinPrice,
    MaxPrice,
    PriceChange,
}

/// Fire-and-forget message delivered to the notification transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlertNotification {
    pub alert_id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change: Option<f64>,
    pub message: String,
}

/// Price forecast derived from historical data. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePrediction {
    pub predicted_price: f64,
    /// In [0, 1], floored at 0.3.
    pub confidence: f64,
    pub factors: Vec<String>,
}

// ── Transport types ───────────────────────────────────────────────────

/// A pending transport order awaiting vehicle assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportOrder {
    pub id: String,
    pub pickup_location: GeoPoint,
    pub delivery_location: GeoPoint,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    /// Cargo weight in kg. Must be > 0 (validated at optimization time).
    pub weight: f64,
    #[serde(default)]
    pub required_by: Option<DateTime<Utc>>,
}

/// An available vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub location: GeoPoint,
    /// Load capacity in kg. Must be > 0 (validated at optimization time).
    pub capacity: f64,
    pub available_from: DateTime<Utc>,
    /// Liters per km; planner default applies when absent.
    #[serde(default)]
    pub fuel_consumption_rate: Option<f64>,
    /// ETB per hour; planner default applies when absent.
    #[serde(default)]
    pub driver_hourly_rate: Option<f64>,
    #[serde(default)]
    pub depot: Option<String>,
}

/// A computed route. Immutable once produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub vehicle_id: String,
    pub waypoints: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub traffic_delay_min: f64,
    pub weather_impact_factor: f64,
    pub estimated_cost: f64,
}

/// Per-schedule cost breakdown in ETB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fuel: f64,
    pub tolls: f64,
    pub driver: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Start,
    Pickup,
    Delivery,
}

/// One stop along a planned route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub location: GeoPoint,
    pub address: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub estimated_time: DateTime<Utc>,
}

/// One (vehicle, order-batch) assignment from a single optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySchedule {
    /// First order of the batch; multi-order batches are routed but only
    /// nominally attributed to their first order.
    pub order_id: String,
    pub vehicle_id: String,
    pub route: Route,
    pub estimated_arrival: DateTime<Utc>,
    pub estimated_departure: DateTime<Utc>,
    pub duration_min: f64,
    pub distance_km: f64,
    pub cost: CostBreakdown,
    pub stops: Vec<RouteStop>,
    /// All orders assigned to this schedule, in pickup order.
    pub assigned_order_ids: Vec<String>,
}

/// Output of one optimization invocation. Transient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub schedules: Vec<DeliverySchedule>,
    pub unassigned_orders: Vec<TransportOrder>,
    pub total_cost: f64,
    pub total_distance: f64,
    pub total_duration: f64,
    /// Vehicle id → percent. Distance/capacity proxy, not a true load factor.
    pub vehicle_utilization: HashMap<String, f64>,
    /// In [0, 100]; 0 when no goals are requested.
    pub optimization_score: f64,
}

/// A start/end window a vehicle may serve orders within.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Optional constraints on an optimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConstraints {
    #[serde(default)]
    pub max_working_hours: Option<f64>,
    #[serde(default)]
    pub max_distance_per_day: Option<f64>,
    /// Per-vehicle capacity overrides, keyed by vehicle id.
    #[serde(default)]
    pub vehicle_capacity: HashMap<String, f64>,
    /// Per-vehicle serviceable time windows, keyed by vehicle id.
    #[serde(default)]
    pub time_windows: HashMap<String, Vec<TimeWindow>>,
    #[serde(default)]
    pub avoid_tolls: bool,
    #[serde(default)]
    pub prefer_highways: bool,
}

/// Which sub-scores contribute to the optimization score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OptimizationGoals {
    #[serde(default)]
    pub minimize_cost: bool,
    #[serde(default)]
    pub minimize_time: bool,
    #[serde(default)]
    pub maximize_utilization: bool,
    #[serde(default)]
    pub prioritize_eco_routes: bool,
}

// ── Real-time data snapshots ──────────────────────────────────────────

/// A traffic snapshot from the traffic provider. The payload is
/// provider-defined; only presence feeds the route heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub severity: Option<f64>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// A weather snapshot from the weather provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
