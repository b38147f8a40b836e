//! HTTP REST API and background maintenance for the home environment monitor.
//!
//! This crate provides a service that:
//! - Accepts readings posted by sensors and stores them locally
//! - Serves the latest reading, a per-minute 24-hour series and 24-hour
//!   statistics to a polling dashboard
//! - Clears readings older than 24 hours, on request or on a schedule
//! - Optionally serves the dashboard's static files
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/health/detailed` - Store and purge task diagnostics
//! - `POST /api/sensordata` - Store one reading
//! - `GET /api/sensordata/latest` - Most recent reading (204 when empty)
//! - `GET /api/sensordata/last24hours` - One reading per minute, oldest first
//! - `GET /api/sensordata/stats` - Mean, median, mode, range, min and max per metric
//! - `DELETE /api/sensordata/clear` - Delete readings older than 24 hours
//! - `DELETE /api/sensordata/clearall` - Delete every reading
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/homemon/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! static_dir = "/srv/homemon/dashboard"
//!
//! [storage]
//! path = "~/.local/share/homemon/data.db"
//!
//! [retention]
//! auto_purge = true
//! purge_interval_secs = 3600
//! ```

pub mod api;
pub mod config;
pub mod purge;
pub mod state;

pub use config::{Config, ConfigError, RetentionConfig, ServerConfig, StorageConfig};
pub use purge::Purger;
pub use state::{AppState, PurgeStats, StatsError};
