//! # Grid Watch Library
//!
//! Watch a solar inverter's utility-grid connection and announce changes.
//!
//! This library provides the pieces of the `grid-watch` daemon: reading
//! inverter telemetry (serial dongle or HTTP), detecting grid transitions
//! against the persisted state, keeping a bounded transition history, and
//! announcing transitions via push notification and a cast speaker.

pub mod audio;
pub mod config;
pub mod detector;
pub mod error;
pub mod history;
pub mod logging;
pub mod notify;
pub mod poll;
pub mod reading;
pub mod source;
pub mod state;
pub mod watcher;

#[cfg(test)]
mod test_support;
