//! Pure price statistics.
//!
//! Deterministic math over a price window: split-half trend, coefficient
//! of variation, and a linear trend extrapolation. Deliberately simple —
//! this is a trend-following heuristic, not a time-series model.

use common::PricePrediction;

/// Confidence never drops below this floor, however volatile the market.
const CONFIDENCE_FLOOR: f64 = 0.3;

/// Window used for the recent-spike factor check.
const SPIKE_WINDOW: usize = 7;

pub fn mean(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    prices.iter().sum::<f64>() / prices.len() as f64
}

/// Percent change between the averages of the first and second half of the
/// window. Fewer than 2 points has no direction: 0.
pub fn trend_percent(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let mid = prices.len() / 2;
    let first_avg = mean(&prices[..mid]);
    let second_avg = mean(&prices[mid..]);

    (second_avg - first_avg) / first_avg * 100.0
}

/// Coefficient of variation (population stddev / mean). Fewer than 2
/// points: 0.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let avg = mean(prices);
    let variance = prices.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / prices.len() as f64;

    variance.sqrt() / avg
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Rule-based explanation set for a prediction.
///
/// `month` is 1-indexed (1 = January), taken from the caller's clock so
/// seasonal factors stay testable.
pub fn price_factors(trend: f64, volatility: f64, window: &[f64], month: u32) -> Vec<String> {
    let mut factors = Vec::new();

    if trend > 5.0 {
        factors.push("Increasing demand".to_string());
    }
    if trend < -5.0 {
        factors.push("Decreasing demand".to_string());
    }
    if volatility > 0.2 {
        factors.push("High market volatility".to_string());
    }
    if volatility < 0.05 {
        factors.push("Stable market conditions".to_string());
    }

    // Ethiopian crop calendar: meher harvest lands around year end.
    if (3..=5).contains(&month) {
        factors.push("Post-harvest surplus".to_string());
    }
    if month == 12 || month <= 2 {
        factors.push("Pre-harvest scarcity".to_string());
    }

    let recent = &window[window.len().saturating_sub(SPIKE_WINDOW)..];
    if !recent.is_empty() {
        let max = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = recent.iter().cloned().fold(f64::INFINITY, f64::min);
        if min > 0.0 && (max - min) / min > 0.15 {
            factors.push("Recent price volatility".to_string());
        }
    }

    factors
}

/// Build a prediction from a non-empty price window.
///
/// The observed percent trend is assumed to continue linearly at 1% of the
/// trend per day ahead.
pub fn build_prediction(window: &[f64], days_ahead: i64, month: u32) -> PricePrediction {
    let avg = mean(window);
    let trend = trend_percent(window);
    let vol = volatility(window);

    let trend_factor = 1.0 + trend * days_ahead as f64 * 0.01;

    PricePrediction {
        predicted_price: round2(avg * trend_factor),
        confidence: round2((1.0 - vol).max(CONFIDENCE_FLOOR)),
        factors: price_factors(trend, vol, window, month),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_window() -> Vec<f64> {
        // Ten points at 10, ten at 12: split-half trend of exactly 20%.
        let mut w = vec![10.0; 10];
        w.extend(vec![12.0; 10]);
        w
    }

    #[test]
    fn degenerate_windows_have_no_trend_or_volatility() {
        assert_eq!(trend_percent(&[]), 0.0);
        assert_eq!(trend_percent(&[42.0]), 0.0);
        assert_eq!(volatility(&[]), 0.0);
        assert_eq!(volatility(&[42.0]), 0.0);
    }

    #[test]
    fn single_point_predicts_itself_with_full_confidence() {
        let p = build_prediction(&[42.0], 7, 6);
        assert_eq!(p.predicted_price, 42.0);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn step_window_trend_and_prediction() {
        let window = step_window();
        assert!((trend_percent(&window) - 20.0).abs() < 1e-9);
        assert!((mean(&window) - 11.0).abs() < 1e-9);

        // mean 11, trend 20%, one day ahead: 11 * (1 + 20 * 0.01) = 13.2.
        let p = build_prediction(&window, 1, 6);
        assert!((p.predicted_price - 13.2).abs() < 1e-9);

        // stddev is 1, mean 11: volatility ~0.0909, confidence ~0.91.
        assert!((p.confidence - 0.91).abs() < 1e-9);
    }

    #[test]
    fn flat_window_predicts_the_mean_for_any_horizon() {
        let window = vec![10.0; 12];
        for days in [1, 7, 30] {
            let p = build_prediction(&window, days, 6);
            assert_eq!(p.predicted_price, 10.0);
        }
    }

    #[test]
    fn prediction_drift_grows_with_horizon() {
        let window = step_window();
        let avg = mean(&window);
        let mut last_drift = 0.0;
        for days in [1, 3, 7, 14] {
            let p = build_prediction(&window, days, 6);
            let drift = (p.predicted_price - avg).abs();
            assert!(drift > last_drift, "drift must grow with days_ahead");
            last_drift = drift;
        }
    }

    #[test]
    fn trend_factors() {
        let rising = price_factors(10.0, 0.01, &[10.0; 7], 7);
        assert!(rising.contains(&"Increasing demand".to_string()));
        assert!(rising.contains(&"Stable market conditions".to_string()));

        let falling = price_factors(-10.0, 0.3, &[10.0; 7], 7);
        assert!(falling.contains(&"Decreasing demand".to_string()));
        assert!(falling.contains(&"High market volatility".to_string()));
    }

    #[test]
    fn seasonal_factors_follow_the_calendar() {
        for month in 3..=5 {
            assert!(price_factors(0.0, 0.1, &[10.0], month)
                .contains(&"Post-harvest surplus".to_string()));
        }
        for month in [12, 1, 2] {
            assert!(price_factors(0.0, 0.1, &[10.0], month)
                .contains(&"Pre-harvest scarcity".to_string()));
        }
        let july = price_factors(0.0, 0.1, &[10.0], 7);
        assert!(!july.contains(&"Post-harvest surplus".to_string()));
        assert!(!july.contains(&"Pre-harvest scarcity".to_string()));
    }

    #[test]
    fn recent_spike_factor_uses_last_seven_points() {
        // Spread (12 - 10) / 10 = 20% > 15% threshold.
        let mut window = vec![10.0; 20];
        window.extend([10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 12.0]);
        assert!(price_factors(0.0, 0.1, &window, 7)
            .contains(&"Recent price volatility".to_string()));

        // Early spike outside the last 7 points does not count.
        let mut early = vec![10.0, 20.0];
        early.extend(vec![10.0; 7]);
        assert!(!price_factors(0.0, 0.1, &early, 7)
            .contains(&"Recent price volatility".to_string()));
    }
}
