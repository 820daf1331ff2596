//! # Telemetry Sources
//!
//! Where inverter readings come from.
//!
//! This module handles:
//! - The `TelemetrySource` seam the poll loop drives
//! - Local dongle over serial (skips a cycle on any acquisition problem)
//! - Remote HTTP endpoint (acquisition problems are errors)

pub mod dongle;
pub mod http;
pub mod port_trait;

use async_trait::async_trait;

use crate::config::{Config, WorkingMode};
use crate::error::Result;
use crate::reading::Reading;

pub use dongle::DongleSource;
pub use http::HttpSource;

/// A provider of inverter readings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send {
    /// Fetch the current reading
    ///
    /// `Ok(None)` means nothing usable arrived this cycle.
    async fn get_reading(&mut self) -> Result<Option<Reading>>;
}

/// Build the source selected by `working_mode`
///
/// # Errors
///
/// Returns error if the dongle cannot be opened or the HTTP client cannot be built
pub fn from_config(config: &Config) -> Result<Box<dyn TelemetrySource>> {
    match config.general.working_mode {
        WorkingMode::Dongle => Ok(Box::new(DongleSource::open(&config.dongle)?)),
        WorkingMode::Http => Ok(Box::new(HttpSource::new(&config.http)?)),
    }
}
