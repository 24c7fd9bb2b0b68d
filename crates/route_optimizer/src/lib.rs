//! Route optimization engine crate.
//!
//! Greedy order-to-vehicle assignment with cost, timing, and utilization
//! heuristics, plus cached results and real-time data refreshers.

pub mod engine;
pub mod geo;
pub mod planner;

pub use engine::{OptimizeParams, RouteOptimizationEngine};
