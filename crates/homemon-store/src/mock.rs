//! In-memory store for testing.
//!
//! [`MockStore`] implements [`ReadingStore`] over a `Vec`, so service code can
//! be exercised without SQLite.
//!
//! # Features
//!
//! - **Insertion order**: range queries return readings in the order they
//!   were inserted
//! - **Failure injection**: fail every operation, or only the next N

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use time::OffsetDateTime;

use homemon_types::{NewReading, Reading};

use crate::error::{Error, Result};
use crate::store::to_utc;
use crate::traits::ReadingStore;

const DEFAULT_FAIL_MESSAGE: &str = "mock store failure";

/// A `Vec`-backed reading store.
///
/// # Example
///
/// ```
/// use homemon_store::{Error, MockStore, ReadingStore};
///
/// let store = MockStore::new();
/// store.set_should_fail(true);
/// assert!(matches!(store.count(), Err(Error::Unavailable(_))));
///
/// store.set_should_fail(false);
/// assert_eq!(store.count()?, 0);
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct MockStore {
    readings: Vec<Reading>,
    next_id: i64,
    should_fail: AtomicBool,
    fail_message: String,
    remaining_failures: AtomicU32,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            readings: Vec::new(),
            next_id: 1,
            should_fail: AtomicBool::new(false),
            fail_message: DEFAULT_FAIL_MESSAGE.to_string(),
            remaining_failures: AtomicU32::new(0),
        }
    }

    /// Create a store that fails every operation with `message`.
    pub fn unavailable(message: &str) -> Self {
        let mut store = Self::new();
        store.fail_message = message.to_string();
        store.should_fail.store(true, Ordering::Relaxed);
        store
    }

    /// Create a store pre-populated with `readings`, in order.
    pub fn with_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = NewReading>,
    {
        let mut store = Self::new();
        for reading in readings {
            store.push(&reading);
        }
        store
    }

    /// Make every subsequent operation fail (or stop failing).
    ///
    /// Failures carry the message given to [`MockStore::unavailable`], or a
    /// generic one.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` operations, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Number of transient failures still pending.
    pub fn remaining_failures(&self) -> u32 {
        self.remaining_failures.load(Ordering::Relaxed)
    }

    /// Stored readings in insertion order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    fn push(&mut self, reading: &NewReading) -> Reading {
        let stored = reading.into_reading(self.next_id);
        self.next_id += 1;
        self.readings.push(stored);
        stored
    }

    fn check_should_fail(&self) -> Result<()> {
        let pending = self.remaining_failures.load(Ordering::Relaxed);
        if pending > 0 {
            self.remaining_failures.store(pending - 1, Ordering::Relaxed);
            return Err(Error::Unavailable(self.fail_message.clone()));
        }

        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::Unavailable(self.fail_message.clone()))
        } else {
            Ok(())
        }
    }
}

impl ReadingStore for MockStore {
    fn insert(&mut self, reading: &NewReading) -> Result<Reading> {
        self.check_should_fail()?;
        let reading = to_utc(reading)?;
        Ok(self.push(&reading))
    }

    fn find_latest(&self) -> Result<Option<Reading>> {
        self.check_should_fail()?;
        // max_by_key keeps the last maximum, so ties go to the later insert
        Ok(self.readings.iter().copied().max_by_key(|r| r.timestamp))
    }

    fn find_since(&self, cutoff: OffsetDateTime) -> Result<Vec<Reading>> {
        self.check_should_fail()?;
        Ok(self
            .readings
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .copied()
            .collect())
    }

    fn delete_before(&mut self, cutoff: OffsetDateTime) -> Result<u64> {
        self.check_should_fail()?;
        let before = self.readings.len();
        self.readings.retain(|r| r.timestamp >= cutoff);
        Ok((before - self.readings.len()) as u64)
    }

    fn delete_all(&mut self) -> Result<u64> {
        self.check_should_fail()?;
        let deleted = self.readings.len() as u64;
        self.readings.clear();
        Ok(deleted)
    }

    fn count(&self) -> Result<u64> {
        self.check_should_fail()?;
        Ok(self.readings.len() as u64)
    }
}
