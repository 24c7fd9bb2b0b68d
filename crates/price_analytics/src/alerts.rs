//! Pure alert-threshold evaluation and message templating.
//!
//! The engine's polling loop handles I/O; everything here is a function of
//! its arguments so the firing rules test without fakes.

use common::{AlertKind, PriceAlert};

/// Check the static min/max thresholds against a current price.
///
/// Min is checked before max; at most one kind results. The change
/// threshold needs history and is evaluated by the caller only when
/// neither static threshold matched.
pub fn check_static_thresholds(alert: &PriceAlert, current_price: f64) -> Option<AlertKind> {
    if let Some(min) = alert.min_price {
        if current_price <= min {
            return Some(AlertKind::MinPrice);
        }
    }
    if let Some(max) = alert.max_price {
        if current_price >= max {
            return Some(AlertKind::MaxPrice);
        }
    }
    None
}

/// Percent change from the earliest observed price to the current one.
pub fn percent_change(earliest: f64, current: f64) -> f64 {
    (current - earliest) / earliest * 100.0
}

/// Human-readable message for a fired alert. Prices in ETB.
pub fn alert_message(
    alert: &PriceAlert,
    kind: AlertKind,
    current_price: f64,
    price_change: Option<f64>,
) -> String {
    let crop = &alert.crop_type;
    let location = alert.location_name.as_deref().unwrap_or("Market");

    match kind {
        AlertKind::MinPrice => format!(
            "{} price in {} has fallen to {:.2} ETB (below your minimum threshold of {} ETB)",
            crop,
            location,
            current_price,
            alert.min_price.unwrap_or(0.0)
        ),
        AlertKind::MaxPrice => format!(
            "{} price in {} has risen to {:.2} ETB (above your maximum threshold of {} ETB)",
            crop,
            location,
            current_price,
            alert.max_price.unwrap_or(0.0)
        ),
        AlertKind::PriceChange => {
            let change = price_change.unwrap_or(0.0);
            let direction = if change > 0.0 { "increased" } else { "decreased" };
            format!(
                "{} price in {} has {} by {:.1}% to {:.2} ETB",
                crop,
                location,
                direction,
                change.abs(),
                current_price
            )
        }
    }
}
