//! Error types for window aggregation.

use thiserror::Error;

/// Errors that can occur when aggregating a reading window.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AggregateError {
    /// Statistics were requested over a window with no readings.
    #[error("No data available.")]
    EmptyWindow,
}

/// Result type alias using homemon-types' [`AggregateError`].
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;
