//! # Inverter Readings
//!
//! Normalized telemetry sample and the decoder for the JSON frames emitted
//! by both the dongle and the HTTP endpoint.
//!
//! A frame looks like:
//!
//! ```json
//! {"fac": 5002, "vacr": 2301, "deviceTime": "2024-01-01 10:00:00", "status": "Normal"}
//! ```
//!
//! `fac` is in hundredths of a hertz and `vacr` in tenths of a volt, exactly
//! as the inverter reports them.

use serde_json::{Map, Value};

use crate::error::{GridWatchError, Result};

/// One telemetry sample from the inverter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Grid frequency in hundredths of Hz (raw `fac`)
    pub frequency_hz: i64,

    /// Grid voltage in tenths of V (raw `vacr`)
    pub grid_voltage: i64,

    /// Device-reported time, used verbatim as the event time
    pub device_time: String,

    /// Human-readable inverter status
    pub status_text: String,
}

impl Reading {
    /// Returns true when the inverter sees utility power.
    #[must_use]
    pub fn is_grid_connected(&self) -> bool {
        self.frequency_hz > 0
    }

    /// Grid frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.frequency_hz as f64 / 100.0
    }

    /// Grid voltage in V.
    #[must_use]
    pub fn voltage(&self) -> f64 {
        self.grid_voltage as f64 / 10.0
    }
}

/// Decode a JSON telemetry frame
///
/// # Arguments
///
/// * `frame` - Raw frame bytes (a single JSON object, surrounding whitespace allowed)
///
/// # Returns
///
/// * `Result<Reading>` - Decoded reading, or error if invalid
///
/// # Errors
///
/// Returns `GridWatchError::Acquisition` if:
/// - Frame is not a JSON object
/// - `fac` or `deviceTime` is missing
/// - A numeric field is neither a number nor a numeric string
pub fn decode_frame(frame: &[u8]) -> Result<Reading> {
    let value: Value = serde_json::from_slice(frame)
        .map_err(|e| GridWatchError::Acquisition(format!("Invalid JSON frame: {}", e)))?;

    match value {
        Value::Object(fields) => decode_object(&fields),
        other => Err(GridWatchError::Acquisition(format!(
            "Expected a JSON object, got: {}",
            other
        ))),
    }
}

/// Decode an already-parsed JSON object into a reading
pub fn decode_object(fields: &Map<String, Value>) -> Result<Reading> {
    let frequency_hz = required_number(fields, "fac")?;
    // Voltage only feeds the log line; a frame without it is still usable
    let grid_voltage = match fields.get("vacr") {
        Some(v) => number(v, "vacr")?,
        None => 0,
    };

    let device_time = match fields.get("deviceTime") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => {
            return Err(GridWatchError::Acquisition(
                "Missing field: deviceTime".to_string(),
            ))
        }
    };

    let status_text = fields
        .get("status_text")
        .or_else(|| fields.get("status"))
        .map(text)
        .unwrap_or_default();

    Ok(Reading {
        frequency_hz,
        grid_voltage,
        device_time,
        status_text,
    })
}

fn required_number(fields: &Map<String, Value>, key: &str) -> Result<i64> {
    match fields.get(key) {
        Some(v) => number(v, key),
        None => Err(GridWatchError::Acquisition(format!("Missing field: {}", key))),
    }
}

fn number(value: &Value, key: &str) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(whole))
        }
        _ => None,
    };

    parsed.ok_or_else(|| {
        GridWatchError::Acquisition(format!("Field {} is not numeric: {}", key, value))
    })
}

/// Round to the nearest integer, keeping any positive value above zero so a
/// fractional `fac` still reads as connected
fn whole(f: f64) -> i64 {
    let rounded = f.round() as i64;
    if f > 0.0 {
        rounded.max(1)
    } else {
        rounded
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        let frame = br#"{"fac": 5002, "vacr": 2301, "deviceTime": "2024-01-01 10:00:00", "status_text": "Normal"}"#;
        let reading = decode_frame(frame).unwrap();

        assert_eq!(reading.frequency_hz, 5002);
        assert_eq!(reading.grid_voltage, 2301);
        assert_eq!(reading.device_time, "2024-01-01 10:00:00");
        assert_eq!(reading.status_text, "Normal");
        assert!(reading.is_grid_connected());
        assert!((reading.frequency() - 50.02).abs() < 1e-9);
        assert!((reading.voltage() - 230.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_numeric_strings() {
        let frame = br#"{"fac": "0", "vacr": " 12 ", "deviceTime": "t"}"#;
        let reading = decode_frame(frame).unwrap();

        assert_eq!(reading.frequency_hz, 0);
        assert_eq!(reading.grid_voltage, 12);
        assert!(!reading.is_grid_connected());
    }

    #[test]
    fn test_fractional_frequency_stays_connected() {
        let reading = decode_frame(br#"{"fac": 0.5, "vacr": 2290.6, "deviceTime": "t"}"#).unwrap();
        assert_eq!(reading.frequency_hz, 1);
        assert_eq!(reading.grid_voltage, 2291);
        assert!(reading.is_grid_connected());

        let reading = decode_frame(br#"{"fac": "0.2", "deviceTime": "t"}"#).unwrap();
        assert!(reading.is_grid_connected());

        let reading = decode_frame(br#"{"fac": 0.0, "deviceTime": "t"}"#).unwrap();
        assert!(!reading.is_grid_connected());
    }

    #[test]
    fn test_status_text_preferred_over_status() {
        let frame = br#"{"fac": 1, "deviceTime": "t", "status": 3, "status_text": "Fault"}"#;
        assert_eq!(decode_frame(frame).unwrap().status_text, "Fault");

        let frame = br#"{"fac": 1, "deviceTime": "t", "status": 3}"#;
        assert_eq!(decode_frame(frame).unwrap().status_text, "3");

        let frame = br#"{"fac": 1, "deviceTime": "t"}"#;
        assert_eq!(decode_frame(frame).unwrap().status_text, "");
    }

    #[test]
    fn test_decode_missing_frequency() {
        let frame = br#"{"vacr": 2301, "deviceTime": "t"}"#;
        assert!(matches!(
            decode_frame(frame),
            Err(GridWatchError::Acquisition(_))
        ));
    }

    #[test]
    fn test_decode_missing_device_time() {
        let frame = br#"{"fac": 5000}"#;
        assert!(decode_frame(frame).is_err());
    }

    #[test]
    fn test_decode_non_numeric_frequency() {
        let frame = br#"{"fac": "abc", "deviceTime": "t"}"#;
        assert!(decode_frame(frame).is_err());
    }

    #[test]
    fn test_decode_not_an_object() {
        assert!(decode_frame(b"[1, 2]").is_err());
        assert!(decode_frame(b"garbage").is_err());
    }

    #[test]
    fn test_negative_frequency_is_disconnected() {
        let reading = Reading {
            frequency_hz: -1,
            grid_voltage: 0,
            device_time: String::new(),
            status_text: String::new(),
        };
        assert!(!reading.is_grid_connected());
    }
}
