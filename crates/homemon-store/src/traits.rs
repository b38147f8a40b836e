//! Trait abstraction over reading storage.
//!
//! This module provides the [`ReadingStore`] trait that abstracts over the
//! SQLite [`Store`](crate::Store) and the in-memory
//! [`MockStore`](crate::MockStore). The service holds a boxed
//! `dyn ReadingStore` built once at startup and passes it to every
//! operation.

use time::OffsetDateTime;

use homemon_types::{NewReading, Reading};

use crate::error::Result;

/// Operations the aggregation facade needs from a reading collection.
///
/// Each call is independently atomic. There are no transactions spanning
/// calls, so a reading inserted right at a cutoff may or may not be seen by
/// a concurrent range query or age-based delete.
///
/// # Example
///
/// ```
/// use homemon_store::{MockStore, ReadingStore};
/// use homemon_types::NewReading;
/// use time::macros::datetime;
///
/// fn ingest(store: &mut dyn ReadingStore) -> homemon_store::Result<()> {
///     store.insert(&NewReading::new(datetime!(2024-05-01 12:00 UTC), 21.0, 40.0, 9.0))?;
///     Ok(())
/// }
///
/// let mut store = MockStore::new();
/// ingest(&mut store)?;
/// assert_eq!(store.count()?, 1);
/// # Ok::<(), homemon_store::Error>(())
/// ```
pub trait ReadingStore: Send {
    /// Append one reading and return it with its assigned id.
    fn insert(&mut self, reading: &NewReading) -> Result<Reading>;

    /// The most recent reading by timestamp, or `None` if the store is empty.
    fn find_latest(&self) -> Result<Option<Reading>>;

    /// All readings with `timestamp >= cutoff`.
    ///
    /// Results come back in a stable but unspecified order; callers that
    /// need chronological order must sort.
    fn find_since(&self, cutoff: OffsetDateTime) -> Result<Vec<Reading>>;

    /// Delete readings with `timestamp < cutoff`, returning how many went.
    fn delete_before(&mut self, cutoff: OffsetDateTime) -> Result<u64>;

    /// Delete every reading, returning how many went.
    fn delete_all(&mut self) -> Result<u64>;

    /// Number of stored readings.
    fn count(&self) -> Result<u64>;
}
