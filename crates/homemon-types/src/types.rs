//! Core types for sensor readings and window statistics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

/// A reading as submitted by a sensor, before the store assigns an id.
///
/// The timestamp is client-supplied. Use [`NewReading::new`] or
/// [`NewReading::normalized`] to get a value whose timestamp is in UTC.
///
/// On the wire the instant is called `timestamp`; `dateTime` is accepted as
/// an alias so older dashboard payloads still deserialize. Deserialization
/// rejects timestamps whose UTC date falls outside years -9999..=9999, such
/// as `9999-12-31T23:00:00-05:00`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NewReading {
    /// When the sensor took the reading.
    #[cfg_attr(
        feature = "serde",
        serde(with = "utc_rfc3339", alias = "dateTime")
    )]
    pub timestamp: OffsetDateTime,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Air quality index as reported by the sensor.
    pub air_quality: f64,
}

impl NewReading {
    /// Create a new reading, normalizing the timestamp to UTC.
    ///
    /// See [`NewReading::normalized`] for timestamps with no UTC
    /// representation.
    #[must_use]
    pub fn new(
        timestamp: OffsetDateTime,
        temperature: f64,
        humidity: f64,
        air_quality: f64,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            air_quality,
        }
        .normalized()
    }

    /// Return a copy with the timestamp converted to UTC.
    ///
    /// The instant is unchanged; only its offset representation is. A
    /// timestamp whose UTC date is out of range keeps its original offset;
    /// use [`NewReading::try_normalized`] to detect that case.
    #[must_use]
    pub fn normalized(self) -> Self {
        self.try_normalized().unwrap_or(self)
    }

    /// Return a copy with the timestamp converted to UTC, or `None` if the
    /// UTC date falls outside the supported year range.
    ///
    /// ```
    /// use homemon_types::NewReading;
    /// use time::macros::datetime;
    ///
    /// let edge = NewReading::new(datetime!(9999-12-31 23:00 -5), 20.0, 40.0, 5.0);
    /// assert!(edge.try_normalized().is_none());
    /// ```
    #[must_use]
    pub fn try_normalized(self) -> Option<Self> {
        let timestamp = self.timestamp.checked_to_offset(UtcOffset::UTC)?;
        Some(Self { timestamp, ..self })
    }

    /// Attach a storage-assigned id, producing a stored [`Reading`].
    #[must_use]
    pub fn into_reading(self, id: i64) -> Reading {
        let normalized = self.normalized();
        Reading {
            id: Some(id),
            timestamp: normalized.timestamp,
            temperature: normalized.temperature,
            humidity: normalized.humidity,
            air_quality: normalized.air_quality,
        }
    }
}

/// One timestamped (temperature, humidity, air quality) triple.
///
/// Readings are immutable once stored. The `id` is opaque and assigned by
/// the store; it is `None` only for readings that were never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Reading {
    /// Storage-assigned identifier, a string on the wire.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none", with = "id_string")
    )]
    pub id: Option<i64>,
    /// When the sensor took the reading (UTC).
    #[cfg_attr(
        feature = "serde",
        serde(with = "time::serde::rfc3339", alias = "dateTime")
    )]
    pub timestamp: OffsetDateTime,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Air quality index as reported by the sensor.
    pub air_quality: f64,
}

/// RFC 3339 timestamps that must have a UTC representation.
#[cfg(feature = "serde")]
mod utc_rfc3339 {
    use serde::{Deserializer, Serializer, de};
    use time::{OffsetDateTime, UtcOffset};

    pub fn serialize<S: Serializer>(
        timestamp: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::serialize(timestamp, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let timestamp = time::serde::rfc3339::deserialize(deserializer)?;
        if timestamp.checked_to_offset(UtcOffset::UTC).is_none() {
            return Err(de::Error::custom(format_args!(
                "timestamp {timestamp} is outside the supported UTC range"
            )));
        }
        Ok(timestamp)
    }
}

/// Opaque ids travel as strings; numeric input is accepted too.
#[cfg(feature = "serde")]
mod id_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<RawId>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawId::Number(id)) => Ok(Some(id)),
            Some(RawId::Text(text)) => text.parse().map(Some).map_err(de::Error::custom),
        }
    }
}

/// The metrics summarized for every window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Metric {
    /// Temperature in degrees Celsius.
    Temperature,
    /// Relative humidity percentage.
    Humidity,
    /// Air quality index.
    AirQuality,
}

impl Metric {
    /// Project this metric's value out of a reading.
    ///
    /// ```
    /// use homemon_types::{Metric, NewReading};
    /// use time::macros::datetime;
    ///
    /// let reading = NewReading::new(datetime!(2024-05-01 12:00 UTC), 21.5, 40.0, 7.0)
    ///     .into_reading(1);
    /// assert_eq!(Metric::Humidity.value(&reading), 40.0);
    /// ```
    #[must_use]
    pub fn value(self, reading: &Reading) -> f64 {
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
            Metric::AirQuality => reading.air_quality,
        }
    }
}

/// Descriptive statistics for one metric over a window.
///
/// Every field is rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatSummary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Element at sorted index `n / 2` (the upper middle for even counts).
    pub median: f64,
    /// Most frequent value; ties go to the value seen first.
    pub mode: f64,
    /// `max - min`.
    pub range: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

/// Statistics for every metric over one window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WindowStats {
    pub temperature: StatSummary,
    pub humidity: StatSummary,
    pub air_quality: StatSummary,
}
