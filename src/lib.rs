pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod leader;
pub mod observability;
pub mod service;
pub mod types;
pub mod utils;

pub use error::{Error, ErrorCode, Result};
pub use service::tso::{Grant, TsoService};
pub use types::timestamp::{HybridClock, HybridTimestamp, TsoClock};
