//! # HTTP Source
//!
//! Polls an HTTP endpoint that returns the inverter's runtime data as JSON,
//! either bare or wrapped in a `{"data": {...}}` envelope.
//!
//! Failures here are returned as errors: in HTTP mode the poll loop treats
//! an unreachable endpoint as fatal and lets the supervisor restart it.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::TelemetrySource;
use crate::config::HttpConfig;
use crate::error::{GridWatchError, Result};
use crate::reading::{decode_object, Reading};

/// Telemetry source backed by an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpSource {
    /// Build a source from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    async fn fetch(&self) -> Result<Value> {
        let mut request = self.client.get(&self.url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GridWatchError::Acquisition(format!("GET {} failed: {}", self.url, e)))?
            .error_for_status()
            .map_err(|e| GridWatchError::Acquisition(format!("GET {} failed: {}", self.url, e)))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| GridWatchError::Acquisition(format!("Invalid JSON from {}: {}", self.url, e)))
    }
}

#[async_trait]
impl TelemetrySource for HttpSource {
    async fn get_reading(&mut self) -> Result<Option<Reading>> {
        let body = self.fetch().await?;

        let fields = match &body {
            Value::Object(fields) if !fields.contains_key("fac") => match fields.get("data") {
                Some(Value::Object(data)) => data,
                _ => fields,
            },
            Value::Object(fields) => fields,
            other => {
                return Err(GridWatchError::Acquisition(format!(
                    "Expected a JSON object from {}, got: {}",
                    self.url, other
                )))
            }
        };

        let reading = decode_object(fields)?;
        debug!("HTTP reading: {:?}", reading);
        Ok(Some(reading))
    }
}
