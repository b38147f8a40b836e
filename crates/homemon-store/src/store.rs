//! Main store implementation.

use std::path::Path;

use rusqlite::Connection;
use time::OffsetDateTime;
use tracing::{debug, info};

use homemon_types::{NewReading, Reading};

use crate::error::{Error, Result};
use crate::queries::ReadingQuery;
use crate::schema;
use crate::traits::ReadingStore;

/// SQLite-based store for home environment readings.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, millis, temperature, humidity, air_quality)| {
                Ok(Reading {
                    id: Some(id),
                    timestamp: from_millis(millis)?,
                    temperature,
                    humidity,
                    air_quality,
                })
            })
            .collect()
    }
}

impl ReadingStore for Store {
    fn insert(&mut self, reading: &NewReading) -> Result<Reading> {
        let reading = to_utc(reading)?;
        let millis = to_millis(reading.timestamp);

        self.conn.execute(
            "INSERT INTO readings (timestamp, temperature, humidity, air_quality)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                millis,
                reading.temperature,
                reading.humidity,
                reading.air_quality,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted reading {} at {}", id, reading.timestamp);

        // Report the timestamp at the precision it was stored with
        let mut stored = reading.into_reading(id);
        stored.timestamp = from_millis(millis)?;
        Ok(stored)
    }

    fn find_latest(&self) -> Result<Option<Reading>> {
        let query = ReadingQuery::new().newest_first().limit(1);
        let mut readings = self.query_readings(&query)?;
        Ok(readings.pop())
    }

    fn find_since(&self, cutoff: OffsetDateTime) -> Result<Vec<Reading>> {
        self.query_readings(&ReadingQuery::new().since(cutoff))
    }

    fn delete_before(&mut self, cutoff: OffsetDateTime) -> Result<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM readings WHERE timestamp < ?1",
            [to_millis(cutoff)],
        )?;

        info!("Deleted {} readings older than {}", deleted, cutoff);
        Ok(deleted as u64)
    }

    fn delete_all(&mut self) -> Result<u64> {
        let deleted = self.conn.execute("DELETE FROM readings", [])?;

        info!("Deleted all {} readings", deleted);
        Ok(deleted as u64)
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;

        Ok(count as u64)
    }
}

/// Normalize a reading to UTC, rejecting timestamps whose UTC date is out of
/// range. Such a reading could be written but never read back.
pub(crate) fn to_utc(reading: &NewReading) -> Result<NewReading> {
    reading.try_normalized().ok_or_else(|| {
        Error::InvalidTimestamp(format!("{} has no UTC representation", reading.timestamp))
    })
}

/// Convert a timestamp to Unix milliseconds, flooring sub-millisecond parts.
pub(crate) fn to_millis(time: OffsetDateTime) -> i64 {
    // Every representable OffsetDateTime fits in i64 milliseconds
    time.unix_timestamp_nanos().div_euclid(1_000_000) as i64
}

/// Convert Unix milliseconds back to a UTC timestamp.
pub(crate) fn from_millis(millis: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| Error::InvalidTimestamp(format!("{millis} ms: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::{datetime, offset};

    fn reading_at(timestamp: OffsetDateTime, temperature: f64) -> NewReading {
        NewReading::new(timestamp, temperature, 45.0, 12.0)
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.find_latest().unwrap().is_none());
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00 UTC);

        let first = store.insert(&reading_at(t, 20.0)).unwrap();
        let second = store.insert(&reading_at(t, 21.0)).unwrap();

        let (a, b) = (first.id.unwrap(), second.id.unwrap());
        assert!(b > a);
        assert_eq!(first.temperature, 20.0);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_insert_normalizes_to_utc() {
        let mut store = Store::open_in_memory().unwrap();
        let local = datetime!(2024-05-01 14:00 +02:00);

        let stored = store.insert(&reading_at(local, 20.0)).unwrap();
        assert_eq!(stored.timestamp, datetime!(2024-05-01 12:00 UTC));
        assert_eq!(stored.timestamp.offset(), offset!(UTC));

        let latest = store.find_latest().unwrap().unwrap();
        assert_eq!(latest.timestamp, datetime!(2024-05-01 12:00 UTC));
    }

    #[test]
    fn test_insert_truncates_to_milliseconds() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00:00.123456789 UTC);

        let stored = store.insert(&reading_at(t, 20.0)).unwrap();
        assert_eq!(stored.timestamp, datetime!(2024-05-01 12:00:00.123 UTC));
        assert_eq!(store.find_latest().unwrap().unwrap(), stored);
    }

    #[test]
    fn test_find_latest_by_timestamp_not_insertion() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00 UTC);

        store.insert(&reading_at(t + Duration::hours(1), 25.0)).unwrap();
        store.insert(&reading_at(t, 20.0)).unwrap();

        let latest = store.find_latest().unwrap().unwrap();
        assert_eq!(latest.temperature, 25.0);
    }

    #[test]
    fn test_find_latest_tie_prefers_later_insert() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00 UTC);

        store.insert(&reading_at(t, 20.0)).unwrap();
        store.insert(&reading_at(t, 21.0)).unwrap();

        let latest = store.find_latest().unwrap().unwrap();
        assert_eq!(latest.temperature, 21.0);
    }

    #[test]
    fn test_find_since_is_inclusive_and_in_insertion_order() {
        let mut store = Store::open_in_memory().unwrap();
        let cutoff = datetime!(2024-05-01 12:00 UTC);

        store.insert(&reading_at(cutoff + Duration::minutes(5), 1.0)).unwrap();
        store.insert(&reading_at(cutoff - Duration::milliseconds(1), 2.0)).unwrap();
        store.insert(&reading_at(cutoff, 3.0)).unwrap();

        let readings = store.find_since(cutoff).unwrap();
        let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![1.0, 3.0]);
    }

    #[test]
    fn test_delete_before_is_exclusive() {
        let mut store = Store::open_in_memory().unwrap();
        let cutoff = datetime!(2024-05-01 12:00 UTC);

        store.insert(&reading_at(cutoff - Duration::hours(30), 1.0)).unwrap();
        store.insert(&reading_at(cutoff - Duration::seconds(1), 2.0)).unwrap();
        store.insert(&reading_at(cutoff, 3.0)).unwrap();

        assert_eq!(store.delete_before(cutoff).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.find_latest().unwrap().unwrap().temperature, 3.0);

        // Nothing left to delete
        assert_eq!(store.delete_before(cutoff).unwrap(), 0);
    }

    #[test]
    fn test_delete_all() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00 UTC);

        for i in 0..5 {
            store.insert(&reading_at(t + Duration::minutes(i), 20.0)).unwrap();
        }

        assert_eq!(store.delete_all().unwrap(), 5);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.delete_all().unwrap(), 0);
    }

    #[test]
    fn test_query_readings_ordering() {
        let mut store = Store::open_in_memory().unwrap();
        let t = datetime!(2024-05-01 12:00 UTC);

        store.insert(&reading_at(t + Duration::minutes(2), 2.0)).unwrap();
        store.insert(&reading_at(t, 0.0)).unwrap();
        store.insert(&reading_at(t + Duration::minutes(1), 1.0)).unwrap();

        let inserted = store.query_readings(&ReadingQuery::new()).unwrap();
        let temps: Vec<f64> = inserted.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![2.0, 0.0, 1.0]);

        let newest = store
            .query_readings(&ReadingQuery::new().newest_first())
            .unwrap();
        let temps: Vec<f64> = newest.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![2.0, 1.0, 0.0]);

        let recent = store
            .query_readings(&ReadingQuery::new().since(t + Duration::minutes(1)).limit(1))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].temperature, 2.0);
    }

    #[test]
    fn test_insert_rejects_timestamp_outside_utc_range() {
        let mut store = Store::open_in_memory().unwrap();
        // Local year 9999, but UTC year 10000.
        let edge = NewReading::new(datetime!(9999-12-31 23:00 -5), 20.0, 50.0, 10.0);

        let result = store.insert(&edge);
        assert!(matches!(result, Err(Error::InvalidTimestamp(_))));
        assert_eq!(store.count().unwrap(), 0);

        // The last representable UTC hour is still accepted
        let last = NewReading::new(datetime!(9999-12-31 20:00 -3), 20.0, 50.0, 10.0);
        let stored = store.insert(&last).unwrap();
        assert_eq!(stored.timestamp, datetime!(9999-12-31 23:00 UTC));
    }

    #[test]
    fn test_open_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        drop(Store::open(&path).unwrap());

        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute("UPDATE schema_version SET version = 99", []).unwrap();
        }

        assert!(matches!(
            Store::open(&path),
            Err(Error::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn test_open_file_persists_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");
        let t = datetime!(2024-05-01 12:00 UTC);

        {
            let mut store = Store::open(&path).unwrap();
            store.insert(&reading_at(t, 19.5)).unwrap();
        }

        assert!(path.exists());

        let store = Store::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let latest = store.find_latest().unwrap().unwrap();
        assert_eq!(latest.timestamp, t);
        assert_eq!(latest.temperature, 19.5);
    }

    #[test]
    fn test_millis_conversion() {
        let t = datetime!(1969-12-31 23:59:59.9995 UTC);
        assert_eq!(to_millis(t), -1);
        assert_eq!(
            from_millis(to_millis(t)).unwrap(),
            datetime!(1969-12-31 23:59:59.999 UTC)
        );
        assert!(matches!(
            from_millis(i64::MAX),
            Err(Error::InvalidTimestamp(_))
        ));
    }
}
