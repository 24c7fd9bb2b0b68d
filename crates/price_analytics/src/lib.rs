//! Price analytics engine crate.
//!
//! Current/historical/predicted market prices plus threshold alerts.

pub mod alerts;
pub mod engine;
pub mod stats;

pub use engine::PriceAnalyticsEngine;
