//! # Transition Detector
//!
//! Decides whether a reading is a grid transition relative to the last
//! persisted state. Pure: it never touches files or ports, the caller
//! applies the returned [`Decision`].
//!
//! ## Rules
//!
//! - Connected means `frequency_hz > 0`.
//! - With no persisted state the grid is assumed to have been connected, so
//!   the first connected reading after install is not announced as a restore.
//! - While disconnected, the outage start is the time the disconnect was
//!   persisted (state file mtime), not the current reading's device time.

use std::fmt;

use crate::history::{GridEvent, HistoryEntry};
use crate::reading::Reading;
use crate::state::PersistedState;

/// Format used for the outage start recovered from the state file
pub const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable status line for one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Connected {
        status_text: String,
        device_time: String,
        frequency: f64,
        voltage: f64,
    },
    Disconnected {
        since: String,
        status_text: String,
    },
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected {
                status_text,
                device_time,
                frequency,
                voltage,
            } => write!(
                f,
                "Inverter connected to grid, status: \"{}\" at device time {} ({} Hz, {} V)",
                status_text, device_time, frequency, voltage
            ),
            Self::Disconnected { since, status_text } => write!(
                f,
                "Inverter disconnected from grid since {}, status: \"{}\"",
                since, status_text
            ),
        }
    }
}

/// Outcome of evaluating one reading
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Connectivity according to this reading
    pub connected: bool,

    /// Connectivity according to the persisted state (or the first-run default)
    pub last_connected: bool,

    /// Start of the current outage, or the reading's device time
    pub disconnected_since: String,

    pub summary: Summary,

    /// History entry to record when this reading is a transition
    pub transition: Option<HistoryEntry>,
}

impl Decision {
    #[must_use]
    pub fn is_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// The event to announce, if any
    #[must_use]
    pub fn event(&self) -> Option<GridEvent> {
        self.transition.as_ref().map(|entry| entry.kind)
    }
}

/// Evaluate a reading against the prior persisted state
#[must_use]
pub fn evaluate(reading: &Reading, prior: Option<&PersistedState>) -> Decision {
    let connected = reading.is_grid_connected();
    let last_connected = prior.map_or(true, |state| state.connected);

    let disconnected_since = match prior {
        Some(state) if !state.connected => state.since.format(SINCE_FORMAT).to_string(),
        _ => reading.device_time.clone(),
    };

    let summary = if connected {
        Summary::Connected {
            status_text: reading.status_text.clone(),
            device_time: reading.device_time.clone(),
            frequency: reading.frequency(),
            voltage: reading.voltage(),
        }
    } else {
        Summary::Disconnected {
            since: disconnected_since.clone(),
            status_text: reading.status_text.clone(),
        }
    };

    let transition = (last_connected != connected).then(|| {
        HistoryEntry::new(
            GridEvent::from_connected(connected),
            reading.device_time.clone(),
        )
    });

    Decision {
        connected,
        last_connected,
        disconnected_since,
        summary,
        transition,
    }
}
