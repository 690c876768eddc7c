//! Shared application state
//!
//! Cloneable state handed to every HTTP handler. The heavyweight shared
//! resources (scheduler, cache, model session, separation latch) are
//! process-wide singletons and are not carried here; this struct holds the
//! per-process metadata the handlers need.

use crate::config::Config;
use chrono::{DateTime, Utc};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration captured at startup
    pub config: Config,

    /// Service start time, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            startup_time: Utc::now(),
        }
    }

    /// Seconds since the service started
    pub fn uptime_seconds(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.startup_time)
            .num_seconds()
            .max(0) as u64
    }
}
