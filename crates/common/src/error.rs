//! Unified error type for the analytics engines.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend fetch failed: {0}")]
    Fetch(String),

    #[error("route optimization failed: {0}")]
    Optimization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Fetch error for a non-2xx backend response, with the body truncated
    /// so a huge HTML error page does not flood the logs.
    pub fn fetch_status(endpoint: &str, status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(500).collect();
        Error::Fetch(format!("{} returned {}: {}", endpoint, status, snippet))
    }
}
