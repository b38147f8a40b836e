//! Query builder for stored readings.
//!
//! # Example
//!
//! ```
//! use homemon_store::{ReadingQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = ReadingQuery::new().since(yesterday).newest_first().limit(10);
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), homemon_store::Error>(())
//! ```

use time::OffsetDateTime;

use crate::store::to_millis;

/// Result ordering for [`ReadingQuery`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOrder {
    /// Insertion order (ascending storage id).
    #[default]
    Inserted,
    /// Newest timestamp first, ties broken by the later insert.
    NewestFirst,
}

/// Fluent query builder for stored readings.
///
/// Use this to construct queries for
/// [`Store::query_readings`](crate::Store::query_readings). By default a
/// query matches everything and returns it in insertion order.
///
/// # Example
///
/// ```
/// use homemon_store::ReadingQuery;
/// use time::{Duration, OffsetDateTime};
///
/// let now = OffsetDateTime::now_utc();
///
/// // Last hour, as inserted
/// let query = ReadingQuery::new().since(now - Duration::hours(1));
///
/// // The single most recent reading
/// let latest = ReadingQuery::new().newest_first().limit(1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Include only readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Result ordering.
    pub order: ReadingOrder,
}

impl ReadingQuery {
    /// Create a query matching every reading, in insertion order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to readings timestamped at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order by timestamp descending.
    pub fn newest_first(mut self) -> Self {
        self.order = ReadingOrder::NewestFirst;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        match self.since {
            Some(since) => (
                "WHERE timestamp >= ?".to_string(),
                vec![Box::new(to_millis(since)) as Box<dyn rusqlite::ToSql>],
            ),
            None => (String::new(), Vec::new()),
        }
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = match self.order {
            ReadingOrder::Inserted => "id ASC",
            ReadingOrder::NewestFirst => "timestamp DESC, id DESC",
        };

        let mut sql = format!(
            "SELECT id, timestamp, temperature, humidity, air_quality \
             FROM readings {} ORDER BY {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}
