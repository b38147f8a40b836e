//! Reading model and window aggregation for the home environment monitor.
//!
//! This crate holds the types shared by the store and the service, plus the
//! pure aggregation engine that turns a window of readings into chart-sized
//! series and summary statistics.
//!
//! # Features
//!
//! - [`Reading`] and [`NewReading`] with UTC-normalized timestamps
//! - Per-minute downsampling of a reading window ([`downsample`])
//! - Per-metric descriptive statistics ([`summarize`])
//!
//! # Example
//!
//! ```
//! use homemon_types::{NewReading, Reading, summarize};
//! use time::macros::datetime;
//!
//! let readings = vec![
//!     NewReading::new(datetime!(2024-05-01 12:00:00 UTC), 21.0, 40.0, 12.0).into_reading(1),
//!     NewReading::new(datetime!(2024-05-01 12:01:00 UTC), 23.0, 44.0, 18.0).into_reading(2),
//! ];
//!
//! let stats = summarize(&readings)?;
//! assert_eq!(stats.temperature.mean, 22.0);
//! # Ok::<(), homemon_types::AggregateError>(())
//! ```

pub mod aggregate;
pub mod error;
pub mod types;

pub use aggregate::{WINDOW, downsample, round2, summarize, summarize_values, window_start};
pub use error::{AggregateError, AggregateResult};
pub use types::{Metric, NewReading, Reading, StatSummary, WindowStats};
