//! ABOUTME: Core types, errors, IDs, and tracing utilities
//! ABOUTME: Foundation crate used by all other depot components

pub mod error;
pub mod id;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use id::Id;
pub use time::{to_rfc3339, today_date, utc_now};
