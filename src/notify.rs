//! # Push Notifications
//!
//! Tells registered phones that the grid went away or came back. Device
//! tokens live in a side file (a JSON array of strings) so they can be
//! updated without restarting the daemon.

use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::error::{GridWatchError, Result};

/// Outbound notification port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce that utility power is back
    async fn notify_on_grid(&self) -> Result<()>;

    /// Announce that utility power is gone
    async fn notify_off_grid(&self) -> Result<()>;
}

/// Title and body of one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

/// Firebase Cloud Messaging (HTTP v1) notifier
#[derive(Debug, Clone)]
pub struct FcmNotifier {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    device_ids_file: PathBuf,
    on_grid: Message,
    off_grid: Message,
}

impl FcmNotifier {
    /// Build a notifier from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            access_token: config.access_token.clone(),
            device_ids_file: config.device_ids_file.clone(),
            on_grid: Message {
                title: config.on_grid_title.clone(),
                body: config.on_grid_body.clone(),
            },
            off_grid: Message {
                title: config.off_grid_title.clone(),
                body: config.off_grid_body.clone(),
            },
        })
    }

    async fn broadcast(&self, label: &str, message: &Message) -> Result<()> {
        debug!("{}: start sending notification", label);

        let devices = load_devices(&self.device_ids_file);
        if devices.is_empty() {
            debug!("{}: no device to notify", label);
            return Ok(());
        }

        debug!(
            "Sending \"{}\" / \"{}\" to {} devices",
            message.title,
            message.body,
            devices.len()
        );

        let mut failed = 0usize;
        for token in &devices {
            if let Err(e) = self.send(token, message).await {
                warn!("{}: failed to notify device: {}", label, e);
                failed += 1;
            }
        }

        debug!("{}: finished sending notification", label);

        if failed > 0 {
            return Err(GridWatchError::Notification(format!(
                "{} of {} devices could not be notified",
                failed,
                devices.len()
            )));
        }

        info!("{}: notified {} devices", label, devices.len());
        Ok(())
    }

    async fn send(&self, token: &str, message: &Message) -> Result<()> {
        let payload = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": {
                    "title": message.title,
                    "body": message.body,
                },
            }
        });

        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| GridWatchError::Notification(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn notify_on_grid(&self) -> Result<()> {
        self.broadcast("ON", &self.on_grid).await
    }

    async fn notify_off_grid(&self) -> Result<()> {
        self.broadcast("OFF", &self.off_grid).await
    }
}

/// Notifier used when push is turned off or not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify_on_grid(&self) -> Result<()> {
        debug!("Push notifications disabled, skipping on-grid notify");
        Ok(())
    }

    async fn notify_off_grid(&self) -> Result<()> {
        debug!("Push notifications disabled, skipping off-grid notify");
        Ok(())
    }
}

/// Pick the notifier implied by configuration
///
/// # Errors
///
/// Returns error if the FCM client cannot be built
pub fn from_config(config: &NotifyConfig) -> Result<Box<dyn Notifier>> {
    if !config.enabled || config.endpoint.is_empty() {
        info!("Push notifications disabled");
        return Ok(Box::new(DisabledNotifier));
    }
    Ok(Box::new(FcmNotifier::new(config)?))
}

/// Read registered device tokens; a missing or corrupt file means no devices
fn load_devices(path: &Path) -> Vec<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Ignoring corrupt device list {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
