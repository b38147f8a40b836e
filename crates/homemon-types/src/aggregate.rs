//! Window aggregation: per-minute downsampling and summary statistics.
//!
//! Everything here is pure and operates on borrowed snapshots. Callers fetch
//! a window from the store once and hand the slice in; nothing is cached and
//! every call recomputes from its input.
//!
//! # Downsampling
//!
//! [`downsample`] keeps at most one reading per UTC calendar minute. The
//! reading kept for a minute is the first one *encountered* in the input, not
//! the one with the smallest timestamp, so the result depends on the order
//! the store delivered readings in.
//!
//! # Statistics
//!
//! [`summarize`] computes a [`StatSummary`] for each [`Metric`]. Two rules
//! differ from the textbook definitions and are kept for compatibility with
//! existing dashboards:
//!
//! - the median is the sorted element at index `n / 2`, so `[1, 2, 3, 4]`
//!   has median `3`, not `2.5`;
//! - mode ties go to the value whose first occurrence comes first, so
//!   `[1, 1, 2, 2]` has mode `1`.
//!
//! All fields are rounded with [`round2`].

use std::collections::{HashMap, HashSet};

use time::{Duration, OffsetDateTime};

use crate::error::{AggregateError, AggregateResult};
use crate::types::{Metric, Reading, StatSummary, WindowStats};

/// Length of the trailing window served to the dashboard.
pub const WINDOW: Duration = Duration::hours(24);

/// Start of the trailing window ending at `now`.
#[must_use]
pub fn window_start(now: OffsetDateTime) -> OffsetDateTime {
    now - WINDOW
}

/// Minutes since the Unix epoch; equal for every instant in one UTC minute.
type MinuteBucket = i64;

fn minute_bucket(timestamp: OffsetDateTime) -> MinuteBucket {
    timestamp.unix_timestamp().div_euclid(60)
}

/// Reduce readings to at most one per UTC minute, in chronological order.
///
/// Readings before `window_start` are dropped. Within a minute the first
/// reading in iteration order wins. The output is sorted ascending by
/// timestamp.
///
/// # Example
///
/// ```
/// use homemon_types::{NewReading, downsample};
/// use time::macros::datetime;
///
/// let readings = vec![
///     NewReading::new(datetime!(2024-05-01 12:00:10 UTC), 20.0, 40.0, 5.0).into_reading(1),
///     NewReading::new(datetime!(2024-05-01 12:00:40 UTC), 21.0, 41.0, 6.0).into_reading(2),
///     NewReading::new(datetime!(2024-05-01 12:01:05 UTC), 22.0, 42.0, 7.0).into_reading(3),
/// ];
///
/// let series = downsample(&readings, datetime!(2024-05-01 00:00 UTC));
/// assert_eq!(series.len(), 2);
/// assert_eq!(series[0].id, Some(1));
/// ```
#[must_use]
pub fn downsample(readings: &[Reading], window_start: OffsetDateTime) -> Vec<Reading> {
    let mut seen: HashSet<MinuteBucket> = HashSet::new();

    let mut series: Vec<Reading> = readings
        .iter()
        .filter(|r| r.timestamp >= window_start)
        .filter(|r| seen.insert(minute_bucket(r.timestamp)))
        .copied()
        .collect();

    series.sort_by_key(|r| r.timestamp);
    series
}

/// Compute statistics for every metric over a window.
///
/// # Errors
///
/// Returns [`AggregateError::EmptyWindow`] if `readings` is empty.
pub fn summarize(readings: &[Reading]) -> AggregateResult<WindowStats> {
    if readings.is_empty() {
        return Err(AggregateError::EmptyWindow);
    }

    Ok(WindowStats {
        temperature: summarize_metric(readings, Metric::Temperature)?,
        humidity: summarize_metric(readings, Metric::Humidity)?,
        air_quality: summarize_metric(readings, Metric::AirQuality)?,
    })
}

fn summarize_metric(readings: &[Reading], metric: Metric) -> AggregateResult<StatSummary> {
    let values: Vec<f64> = readings.iter().map(|r| metric.value(r)).collect();
    summarize_values(&values)
}

/// Compute a [`StatSummary`] over raw values.
///
/// # Errors
///
/// Returns [`AggregateError::EmptyWindow`] if `values` is empty.
pub fn summarize_values(values: &[f64]) -> AggregateResult<StatSummary> {
    if values.is_empty() {
        return Err(AggregateError::EmptyWindow);
    }

    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[n - 1];
    // Summation error can push the mean of near-equal values past the extrema.
    let mean = (values.iter().sum::<f64>() / n as f64).clamp(min, max);
    let median = sorted[n / 2];
    let mode = first_mode(values);

    Ok(StatSummary {
        mean: round2(mean),
        median: round2(median),
        mode: round2(mode),
        range: round2(max - min),
        min: round2(min),
        max: round2(max),
    })
}

/// Most frequent value; among equally frequent values the one that occurs
/// first in `values` wins. `values` must be non-empty.
fn first_mode(values: &[f64]) -> f64 {
    // Groups in order of first occurrence: (value, count).
    let mut groups: Vec<(f64, usize)> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for &value in values {
        let slot = *index.entry(group_key(value)).or_insert_with(|| {
            groups.push((value, 0));
            groups.len() - 1
        });
        groups[slot].1 += 1;
    }

    let mut best = groups[0];
    for &group in &groups[1..] {
        if group.1 > best.1 {
            best = group;
        }
    }
    best.0
}

/// Bit pattern used to group equal values; `-0.0` and `0.0` share a group.
fn group_key(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Round to two decimal places, resolving exact halves to the even neighbour.
///
/// The value is scaled by 100 first, so the tie test applies to the scaled
/// binary value: `22.555 * 100.0` is exactly `2255.5` and rounds to `22.56`,
/// while `22.565 * 100.0` is `2256.5` and also rounds to `22.56`.
///
/// ```
/// use homemon_types::round2;
///
/// assert_eq!(round2(22.555), 22.56);
/// assert_eq!(round2(22.565), 22.56);
/// assert_eq!(round2(0.125), 0.12);
/// assert_eq!(round2(-1.005), -1.0);
/// ```
///
/// Values too large to carry a fractional hundredth are returned unchanged:
///
/// ```
/// use homemon_types::round2;
///
/// assert_eq!(round2(1e307), 1e307);
/// assert_eq!(round2(123456789012345.67), 123456789012345.67);
/// ```
#[must_use]
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // Past 2^52 every f64 is already an integer; scaling back would only add error.
    if !scaled.is_finite() || scaled.abs() >= 4_503_599_627_370_496.0 {
        return value;
    }
    scaled.round_ties_even() / 100.0
}
