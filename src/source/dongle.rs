//! # Dongle Source
//!
//! Reads inverter telemetry from a local logger dongle over serial.
//!
//! The dongle emits newline-terminated JSON frames (see [`crate::reading`]).
//! If `request` is configured it is written before each read for dongles
//! that only answer on demand.
//!
//! Every acquisition problem here (silence, I/O error, garbage frame) is
//! logged and turned into "no reading this cycle".

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::time::Instant;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::port_trait::{DonglePort, TokioSerialPort};
use super::TelemetrySource;
use crate::config::DongleConfig;
use crate::error::{GridWatchError, Result};
use crate::reading::{decode_frame, Reading};

/// Fallback device paths tried after the configured one
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (most common for logger dongles)
    "/dev/ttyACM0", // USB CDC devices
];

/// Longest line accepted before the buffer is discarded
const MAX_FRAME_LEN: usize = 4096;

const READ_CHUNK: usize = 512;

/// Silence that marks the end of a backlog
const DRAIN_IDLE: Duration = Duration::from_millis(100);

/// Cap on a single drain, in multiples of `MAX_FRAME_LEN`
const DRAIN_FRAMES: usize = 16;

/// Telemetry source backed by a serial dongle
pub struct DongleSource<P: DonglePort = TokioSerialPort> {
    port: P,
    device_path: String,
    request: Vec<u8>,
    timeout: Duration,
    buffer: BytesMut,
}

impl<P: DonglePort> std::fmt::Debug for DongleSource<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DongleSource")
            .field("device_path", &self.device_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DongleSource<TokioSerialPort> {
    /// Open the configured dongle, falling back to the common device paths
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if none of the candidate paths opens
    pub fn open(config: &DongleConfig) -> Result<Self> {
        let mut paths: Vec<&str> = vec![config.port.as_str()];
        for path in DEFAULT_DEVICE_PATHS {
            if !paths.contains(path) {
                paths.push(path);
            }
        }
        Self::open_with_paths(&paths, config)
    }

    /// Open the first device in `paths` that accepts the connection
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], config: &DongleConfig) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, config.baud_rate) {
                Ok(port) => {
                    info!("Successfully opened dongle at {}", path);
                    return Ok(Self::with_port(
                        TokioSerialPort::new(port),
                        path,
                        config,
                    ));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(GridWatchError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port as 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| GridWatchError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: DonglePort> DongleSource<P> {
    /// Wrap an already-open port
    pub fn with_port(port: P, device_path: &str, config: &DongleConfig) -> Self {
        let request = if config.request.is_empty() {
            Vec::new()
        } else {
            format!("{}\n", config.request.trim_end()).into_bytes()
        };

        Self {
            port,
            device_path: device_path.to_string(),
            request,
            timeout: Duration::from_millis(config.timeout_ms),
            buffer: BytesMut::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    async fn send_request(&mut self) -> Result<()> {
        self.port
            .write_all(&self.request)
            .await
            .map_err(|e| GridWatchError::Serial(format!("Failed to write request: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| GridWatchError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent dongle request ({} bytes)", self.request.len());
        Ok(())
    }

    /// Wait for a complete line, drain whatever else the dongle queued, and
    /// return the newest complete line
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if self.buffer.contains(&b'\n') {
                self.drain_pending(deadline, &mut chunk).await;
                if let Some(frame) = self.take_latest_line() {
                    return Ok(frame);
                }
            }

            if self.buffer.len() > MAX_FRAME_LEN {
                self.buffer.clear();
                return Err(GridWatchError::Acquisition(format!(
                    "No line terminator within {} bytes",
                    MAX_FRAME_LEN
                )));
            }

            let n = tokio::time::timeout_at(deadline, self.port.read(&mut chunk))
                .await
                .map_err(|_| {
                    GridWatchError::Acquisition(format!(
                        "No frame from {} within {} ms",
                        self.device_path,
                        self.timeout.as_millis()
                    ))
                })?
                .map_err(|e| GridWatchError::Serial(format!("Failed to read: {}", e)))?;

            if n == 0 {
                return Err(GridWatchError::Serial(format!(
                    "{} closed the connection",
                    self.device_path
                )));
            }

            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Keep reading until the port stays quiet for `DRAIN_IDLE`, picking up
    /// frames the dongle pushed while the poll loop slept
    async fn drain_pending(&mut self, deadline: Instant, chunk: &mut [u8]) {
        while self.buffer.len() <= MAX_FRAME_LEN * DRAIN_FRAMES {
            let quiet_at = (Instant::now() + DRAIN_IDLE).min(deadline);
            match tokio::time::timeout_at(quiet_at, self.port.read(chunk)).await {
                Ok(Ok(n)) if n > 0 => self.buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    debug!("Stopped draining {}: {}", self.device_path, e);
                    return;
                }
                _ => return,
            }
        }
        debug!("Drain limit reached on {}", self.device_path);
    }

    /// Pop every complete line from the buffer and return the last non-empty one
    fn take_latest_line(&mut self) -> Option<Vec<u8>> {
        let last_newline = self.buffer.iter().rposition(|&b| b == b'\n')?;
        let complete = self.buffer.split_to(last_newline + 1);

        // None when only blank lines arrived; the caller keeps reading
        complete[..]
            .split(|&b| b == b'\n')
            .map(|line| line.trim_ascii())
            .filter(|line| !line.is_empty())
            .last()
            .map(<[u8]>::to_vec)
    }
}

#[async_trait]
impl<P: DonglePort> TelemetrySource for DongleSource<P> {
    async fn get_reading(&mut self) -> Result<Option<Reading>> {
        if !self.request.is_empty() {
            if let Err(e) = self.send_request().await {
                warn!("Skipping this cycle: {}", e);
                return Ok(None);
            }
        }

        let frame = match self.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping this cycle: {}", e);
                return Ok(None);
            }
        };

        match decode_frame(&frame) {
            Ok(reading) => {
                debug!("Dongle reading: {:?}", reading);
                Ok(Some(reading))
            }
            Err(e) => {
                warn!(
                    "Skipping undecodable frame {:?}: {}",
                    String::from_utf8_lossy(&frame),
                    e
                );
                Ok(None)
            }
        }
    }
}
