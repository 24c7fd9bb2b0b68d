//! Pure route planning.
//!
//! Greedy nearest-first assignment of orders to vehicles plus the cost and
//! timing heuristics. Everything here is a function of its inputs and the
//! caller's clock, so the whole planner tests without I/O.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use common::{
    CostBreakdown, DeliverySchedule, Error, GeoPoint, OptimizationGoals, OptimizationResult,
    Route, RouteConstraints, RouteStop, StopKind, TrafficSnapshot, TransportOrder, Vehicle,
    WeatherSnapshot,
};
use tracing::debug;

use crate::geo;

/// Hard cap per vehicle per run.
const MAX_ORDERS_PER_VEHICLE: usize = 3;

/// Flat assumed average speed.
const AVG_SPEED_KMH: f64 = 60.0;

/// Diesel, ETB per liter.
const FUEL_PRICE_ETB_PER_L: f64 = 35.0;
const DEFAULT_FUEL_L_PER_KM: f64 = 0.15;

const TOLL_ETB_PER_KM: f64 = 2.0;
const DEFAULT_DRIVER_ETB_PER_HOUR: f64 = 100.0;

/// Coarse per-km route cost estimate used for the route record itself.
const ROUTE_ESTIMATE_ETB_PER_KM: f64 = 5.0;

/// Minutes of delay added per full 100 km of route.
const TRAFFIC_DELAY_MIN_PER_100_KM: f64 = 5.0;

/// Flat speed-reduction factor applied when any weather data is present.
const WEATHER_IMPACT_FACTOR: f64 = 0.1;

/// Spacing between consecutive stops on a schedule.
const STOP_SPACING_MIN: i64 = 30;

/// Reject inputs the planner cannot produce a meaningful result for.
pub fn validate(
    orders: &[TransportOrder],
    vehicles: &[Vehicle],
    now: DateTime<Utc>,
) -> Result<(), Error> {
    if orders.is_empty() {
        return Err(Error::Validation(
            "at least one transport order is required".into(),
        ));
    }
    if vehicles.is_empty() {
        return Err(Error::Validation("at least one vehicle is required".into()));
    }

    for order in orders {
        if !(order.weight > 0.0) {
            return Err(Error::Validation(format!(
                "order {}: weight must be greater than 0",
                order.id
            )));
        }
        if !point_is_finite(order.pickup_location) || !point_is_finite(order.delivery_location) {
            return Err(Error::Validation(format!(
                "order {}: pickup and delivery locations must be finite coordinates",
                order.id
            )));
        }
        if let Some(required_by) = order.required_by {
            if required_by < now {
                return Err(Error::Validation(format!(
                    "order {}: required time cannot be in the past",
                    order.id
                )));
            }
        }
    }

    for vehicle in vehicles {
        if !(vehicle.capacity > 0.0) {
            return Err(Error::Validation(format!(
                "vehicle {}: capacity must be greater than 0",
                vehicle.id
            )));
        }
        if !point_is_finite(vehicle.location) {
            return Err(Error::Validation(format!(
                "vehicle {}: location must be finite coordinates",
                vehicle.id
            )));
        }
    }

    Ok(())
}

fn point_is_finite(p: GeoPoint) -> bool {
    p.latitude.is_finite() && p.longitude.is_finite()
}

/// Assign orders to vehicles and price the resulting routes.
///
/// Vehicles are visited in order of availability; each takes up to three of
/// the nearest orders that fit its capacity and time windows. Orders no
/// vehicle takes come back in `unassigned_orders`.
pub fn plan(
    orders: &[TransportOrder],
    vehicles: &[Vehicle],
    constraints: &RouteConstraints,
    goals: &OptimizationGoals,
    weather: &[WeatherSnapshot],
    now: DateTime<Utc>,
) -> Result<OptimizationResult, Error> {
    let mut unassigned: Vec<TransportOrder> = orders.to_vec();
    let mut schedules: Vec<DeliverySchedule> = Vec::new();

    let mut by_availability: Vec<&Vehicle> = vehicles.iter().collect();
    by_availability.sort_by_key(|v| v.available_from);

    for vehicle in by_availability {
        if unassigned.is_empty() {
            break;
        }

        let batch = select_batch(vehicle, &unassigned, constraints);
        if batch.is_empty() {
            continue;
        }

        let schedule = build_schedule(vehicle, &batch, weather, now)?;
        debug!(
            "vehicle {} takes {} orders over {:.1} km",
            vehicle.id,
            batch.len(),
            schedule.distance_km
        );

        unassigned.retain(|o| !schedule.assigned_order_ids.iter().any(|id| id == &o.id));
        schedules.push(schedule);
    }

    let utilization = vehicle_utilization(&schedules, vehicles);
    let score = optimization_score(&schedules, &utilization, goals);

    let total_cost: f64 = schedules.iter().map(|s| s.cost.total).sum();
    let total_distance: f64 = schedules.iter().map(|s| s.distance_km).sum();
    let total_duration: f64 = schedules.iter().map(|s| s.duration_min).sum();

    if !total_cost.is_finite() || !total_distance.is_finite() || !total_duration.is_finite() {
        return Err(Error::Optimization(
            "planner produced non-finite totals".into(),
        ));
    }

    Ok(OptimizationResult {
        schedules,
        unassigned_orders: unassigned,
        total_cost,
        total_distance,
        total_duration,
        vehicle_utilization: utilization,
        optimization_score: score,
    })
}

/// Up to three orders that fit the vehicle, nearest pickup first.
fn select_batch<'a>(
    vehicle: &Vehicle,
    pool: &'a [TransportOrder],
    constraints: &RouteConstraints,
) -> Vec<&'a TransportOrder> {
    let capacity = constraints
        .vehicle_capacity
        .get(&vehicle.id)
        .copied()
        .unwrap_or(vehicle.capacity);

    let mut suitable: Vec<&TransportOrder> = pool
        .iter()
        .filter(|order| {
            order.weight <= capacity && within_time_windows(order, vehicle, constraints)
        })
        .collect();

    suitable.sort_by(|a, b| {
        let da = geo::haversine_km(vehicle.location, a.pickup_location);
        let db = geo::haversine_km(vehicle.location, b.pickup_location);
        da.total_cmp(&db)
    });

    suitable.truncate(MAX_ORDERS_PER_VEHICLE);
    suitable
}

/// An order fits a vehicle's time windows when the vehicle has none, the
/// order has no deadline, or the deadline falls inside some window.
fn within_time_windows(
    order: &TransportOrder,
    vehicle: &Vehicle,
    constraints: &RouteConstraints,
) -> bool {
    let Some(windows) = constraints.time_windows.get(&vehicle.id) else {
        return true;
    };
    let Some(required_by) = order.required_by else {
        return true;
    };
    windows
        .iter()
        .any(|w| w.start <= required_by && required_by <= w.end)
}

fn build_schedule(
    vehicle: &Vehicle,
    batch: &[&TransportOrder],
    weather: &[WeatherSnapshot],
    now: DateTime<Utc>,
) -> Result<DeliverySchedule, Error> {
    let mut waypoints = Vec::with_capacity(1 + batch.len() * 2);
    waypoints.push(vehicle.location);
    waypoints.extend(batch.iter().map(|o| o.pickup_location));
    waypoints.extend(batch.iter().map(|o| o.delivery_location));

    let distance_km = geo::path_km(&waypoints);
    let duration_min = distance_km / AVG_SPEED_KMH * 60.0;

    let route = Route {
        id: format!("route_{}_{}", vehicle.id, now.timestamp_millis()),
        vehicle_id: vehicle.id.clone(),
        waypoints,
        distance_km,
        duration_min,
        traffic_delay_min: traffic_delay_min(distance_km),
        weather_impact_factor: weather_impact(weather),
        estimated_cost: distance_km * ROUTE_ESTIMATE_ETB_PER_KM,
    };

    let cost = route_cost(&route, vehicle);
    let departure = vehicle.available_from.max(now);
    let arrival = now
        + Duration::milliseconds((duration_min * 60_000.0) as i64);
    let stops = route_stops(vehicle, batch, departure);

    Ok(DeliverySchedule {
        order_id: batch[0].id.clone(),
        vehicle_id: vehicle.id.clone(),
        estimated_arrival: arrival,
        estimated_departure: departure,
        duration_min,
        distance_km,
        cost,
        stops,
        assigned_order_ids: batch.iter().map(|o| o.id.clone()).collect(),
        route,
    })
}

/// Five minutes of delay per full 100 km.
pub fn traffic_delay_min(distance_km: f64) -> f64 {
    (distance_km / 100.0).floor() * TRAFFIC_DELAY_MIN_PER_100_KM
}

/// Flat factor, applied only when weather data is available at all.
pub fn weather_impact(weather: &[WeatherSnapshot]) -> f64 {
    if weather.is_empty() {
        0.0
    } else {
        WEATHER_IMPACT_FACTOR
    }
}

fn route_cost(route: &Route, vehicle: &Vehicle) -> CostBreakdown {
    let fuel_rate = vehicle.fuel_consumption_rate.unwrap_or(DEFAULT_FUEL_L_PER_KM);
    let hourly_rate = vehicle.driver_hourly_rate.unwrap_or(DEFAULT_DRIVER_ETB_PER_HOUR);

    let fuel = route.distance_km * fuel_rate * FUEL_PRICE_ETB_PER_L;
    let tolls = route.distance_km * TOLL_ETB_PER_KM;
    let driver = route.duration_min / 60.0 * hourly_rate;

    CostBreakdown {
        fuel,
        tolls,
        driver,
        total: fuel + tolls + driver,
    }
}

/// Start, then all pickups, then all deliveries, at flat 30-minute spacing
/// from departure.
fn route_stops(
    vehicle: &Vehicle,
    batch: &[&TransportOrder],
    departure: DateTime<Utc>,
) -> Vec<RouteStop> {
    let mut stops = Vec::with_capacity(1 + batch.len() * 2);

    stops.push(RouteStop {
        id: format!("start_{}", vehicle.id),
        kind: StopKind::Start,
        location: vehicle.location,
        address: vehicle.depot.clone().unwrap_or_else(|| "Vehicle Depot".into()),
        order_id: None,
        scheduled_time: departure,
        estimated_time: departure,
    });

    for (i, order) in batch.iter().enumerate() {
        let at = departure + Duration::minutes(i as i64 * STOP_SPACING_MIN);
        stops.push(RouteStop {
            id: format!("pickup_{}", order.id),
            kind: StopKind::Pickup,
            location: order.pickup_location,
            address: order
                .pickup_address
                .clone()
                .unwrap_or_else(|| "Pickup Location".into()),
            order_id: Some(order.id.clone()),
            scheduled_time: at,
            estimated_time: at,
        });
    }

    for (i, order) in batch.iter().enumerate() {
        let at = departure + Duration::minutes((batch.len() + i) as i64 * STOP_SPACING_MIN);
        stops.push(RouteStop {
            id: format!("delivery_{}", order.id),
            kind: StopKind::Delivery,
            location: order.delivery_location,
            address: order
                .delivery_address
                .clone()
                .unwrap_or_else(|| "Delivery Location".into()),
            order_id: Some(order.id.clone()),
            scheduled_time: at,
            estimated_time: at,
        });
    }

    stops
}

/// Distance-over-capacity proxy, in percent, for every input vehicle.
/// Not a load factor; the formula is deliberately kept as-is.
fn vehicle_utilization(
    schedules: &[DeliverySchedule],
    vehicles: &[Vehicle],
) -> HashMap<String, f64> {
    let mut utilization = HashMap::with_capacity(vehicles.len());

    for vehicle in vehicles {
        let trips: Vec<&DeliverySchedule> = schedules
            .iter()
            .filter(|s| s.vehicle_id == vehicle.id)
            .collect();
        let total_capacity = vehicle.capacity * trips.len() as f64;
        let used: f64 = trips.iter().map(|s| s.route.distance_km).sum();

        let percent = if total_capacity > 0.0 {
            used / total_capacity * 100.0
        } else {
            0.0
        };
        utilization.insert(vehicle.id.clone(), percent);
    }

    utilization
}

/// Average of the sub-scores for each requested goal, rounded. No goals or
/// no schedules scores 0.
fn optimization_score(
    schedules: &[DeliverySchedule],
    utilization: &HashMap<String, f64>,
    goals: &OptimizationGoals,
) -> f64 {
    if schedules.is_empty() {
        return 0.0;
    }

    let n = schedules.len() as f64;
    let mut factors = Vec::new();

    if goals.minimize_cost {
        let avg_cost = schedules.iter().map(|s| s.cost.total).sum::<f64>() / n;
        factors.push((100.0 - avg_cost / 10.0).max(0.0));
    }

    if goals.minimize_time {
        let avg_duration = schedules.iter().map(|s| s.duration_min).sum::<f64>() / n;
        factors.push((100.0 - avg_duration / 60.0).max(0.0));
    }

    if goals.maximize_utilization {
        let avg_utilization = utilization.values().sum::<f64>() / n;
        factors.push(avg_utilization.min(100.0));
    }

    if factors.is_empty() {
        return 0.0;
    }

    (factors.iter().sum::<f64>() / factors.len() as f64).round()
}
