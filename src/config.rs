//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::AnalyticsConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &AnalyticsConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.api.base_url.trim().is_empty() {
        issues.push("api.base_url must not be empty".into());
    }
    if config.api.auth_token_key.trim().is_empty() {
        issues.push("api.auth_token_key must not be empty".into());
    }
    if config.api.request_timeout_secs == 0 {
        issues.push("api.request_timeout_secs must be > 0".into());
    }

    if config.price.cache_ttl_secs == 0 {
        issues.push("price.cache_ttl_secs must be > 0".into());
    }
    if config.price.alert_interval_secs == 0 {
        issues.push("price.alert_interval_secs must be > 0".into());
    }
    if config.price.alert_price_batch == 0 {
        issues.push("price.alert_price_batch must be > 0".into());
    }
    if config.price.history_window_days <= 0 {
        issues.push("price.history_window_days must be > 0".into());
    }
    if config.price.prediction_points == 0 {
        issues.push("price.prediction_points must be > 0".into());
    }

    if config.route.cache_ttl_secs == 0 {
        issues.push("route.cache_ttl_secs must be > 0".into());
    }
    if config.route.traffic_refresh_secs == 0 {
        issues.push("route.traffic_refresh_secs must be > 0".into());
    }
    if config.route.weather_refresh_secs == 0 {
        issues.push("route.weather_refresh_secs must be > 0".into());
    }

    if config.storage.data_dir.trim().is_empty() {
        issues.push("storage.data_dir must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load daemon configuration from environment and optional config file.
pub fn load_config() -> Result<AnalyticsConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AnalyticsConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(url) = std::env::var("EATMS_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Ok(key) = std::env::var("EATMS_AUTH_TOKEN_KEY") {
        config.api.auth_token_key = key;
    }
    if let Ok(raw) = std::env::var("EATMS_REQUEST_TIMEOUT_SECS") {
        config.api.request_timeout_secs = parse_positive_u64(&raw, "EATMS_REQUEST_TIMEOUT_SECS")?;
    }
    if let Ok(dir) = std::env::var("EATMS_DATA_DIR") {
        config.storage.data_dir = dir;
    }
    if let Ok(raw) = std::env::var("PRICE_CACHE_TTL_SECS") {
        config.price.cache_ttl_secs = parse_positive_u64(&raw, "PRICE_CACHE_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("PRICE_ALERT_INTERVAL_SECS") {
        config.price.alert_interval_secs =
            parse_positive_u64(&raw, "PRICE_ALERT_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("ROUTE_CACHE_TTL_SECS") {
        config.route.cache_ttl_secs = parse_positive_u64(&raw, "ROUTE_CACHE_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("TRAFFIC_REFRESH_SECS") {
        config.route.traffic_refresh_secs = parse_positive_u64(&raw, "TRAFFIC_REFRESH_SECS")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_REFRESH_SECS") {
        config.route.weather_refresh_secs = parse_positive_u64(&raw, "WEATHER_REFRESH_SECS")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
