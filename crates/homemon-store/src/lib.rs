//! Local persistence for home environment sensor readings.
//!
//! This crate provides the store adapter the service reads and writes
//! through: a [`ReadingStore`] trait with a SQLite implementation
//! ([`Store`]) and an in-memory mock for tests ([`MockStore`]).
//!
//! # Features
//!
//! - Append-only reading collection keyed by a storage-assigned id
//! - Latest-by-time lookup and trailing-window range queries
//! - Bulk deletion by age or of everything
//!
//! # Example
//!
//! ```no_run
//! use homemon_store::{ReadingStore, Store};
//! use homemon_types::{NewReading, window_start};
//! use time::OffsetDateTime;
//!
//! let mut store = Store::open_default()?;
//!
//! let now = OffsetDateTime::now_utc();
//! store.insert(&NewReading::new(now, 21.4, 45.0, 12.0))?;
//!
//! let window = store.find_since(window_start(now))?;
//! println!("{} readings in the last 24 hours", window.len());
//! # Ok::<(), homemon_store::Error>(())
//! ```

mod error;
mod mock;
mod queries;
mod schema;
mod store;
mod traits;

pub use error::{Error, Result};
pub use mock::MockStore;
pub use queries::{ReadingOrder, ReadingQuery};
pub use store::Store;
pub use traits::ReadingStore;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/homemon/data.db`
/// - macOS: `~/Library/Application Support/homemon/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\homemon\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("homemon")
        .join("data.db")
}
