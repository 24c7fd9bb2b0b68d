//! Shared domain types, errors, config, and collaborator traits for the
//! EATMS analytics engines.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod ticker;
pub mod types;

pub use backend::{NotificationSink, PriceBackend, TransportBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use ticker::Ticker;
pub use types::*;
