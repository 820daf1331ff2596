//! # Audio Announcements
//!
//! Plays short clips on a network cast speaker. Casting is delegated to an
//! external CLI (`catt` by default) invoked as
//! `<command> -d <device> cast <base_url>/<clip>`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::AudioConfig;
use crate::error::{GridWatchError, Result};

/// Clip played when the grid comes back
pub const HAS_GRID_CLIP: &str = "has-grid.mp3";

/// Clip played when the grid goes away
pub const LOST_GRID_CLIP: &str = "lost-grid.mp3";

/// Repeats for the restore announcement
pub const HAS_GRID_REPEAT: u32 = 3;

/// Repeats for the outage alert
pub const LOST_GRID_REPEAT: u32 = 5;

/// Pause between repeats of a clip, roughly its play length
#[must_use]
pub fn clip_pause(clip: &str) -> Duration {
    match clip {
        LOST_GRID_CLIP => Duration::from_secs(9),
        _ => Duration::from_secs(6),
    }
}

/// Audio playback port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play `clip` `repeat` times
    async fn play(&self, clip: &str, repeat: u32) -> Result<()>;
}

/// Plays clips through an external cast CLI
#[derive(Debug, Clone)]
pub struct CastPlayer {
    command: String,
    device_name: String,
    base_url: String,
    pause_override: Option<Duration>,
}

impl CastPlayer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            command: config.command.clone(),
            device_name: config.cast_device_name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pause_override: None,
        }
    }

    /// Use a fixed pause between repeats instead of the per-clip one
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause_override = Some(pause);
        self
    }

    fn clip_url(&self, clip: &str) -> String {
        format!("{}/{}", self.base_url, clip)
    }

    /// Cast the clip once. `Ok(false)` means no device was reachable.
    async fn cast_once(&self, url: &str) -> Result<bool> {
        let status = match Command::new(&self.command)
            .args(["-d", self.device_name.as_str(), "cast", url])
            .kill_on_drop(true)
            .status()
            .await
        {
            Ok(status) => status,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cast command '{}' not found", self.command);
                return Ok(false);
            }
            Err(e) => {
                return Err(GridWatchError::Playback(format!(
                    "Failed to run '{}': {}",
                    self.command, e
                )))
            }
        };

        if status.success() {
            Ok(true)
        } else {
            Err(GridWatchError::Playback(format!(
                "'{}' exited with {} while casting {}",
                self.command, status, url
            )))
        }
    }
}

#[async_trait]
impl AudioPlayer for CastPlayer {
    async fn play(&self, clip: &str, repeat: u32) -> Result<()> {
        if self.device_name.is_empty() {
            info!("No device to play audio");
            return Ok(());
        }

        let url = self.clip_url(clip);
        let pause = self.pause_override.unwrap_or_else(|| clip_pause(clip));
        info!(
            "Playing {} on {} {} times repeat",
            clip, self.device_name, repeat
        );

        let mut remaining = repeat;
        while remaining > 0 {
            if !self.cast_once(&url).await? {
                info!("No device to play audio");
                return Ok(());
            }
            remaining -= 1;
            info!("Play time remaining: {}", remaining);

            if remaining > 0 {
                info!("Waiting {} seconds before repeat", pause.as_secs());
                tokio::time::sleep(pause).await;
            }
        }

        Ok(())
    }
}

/// Player used when audio is turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, clip: &str, _repeat: u32) -> Result<()> {
        debug!("Audio disabled, not playing {}", clip);
        Ok(())
    }
}

/// Pick the player implied by configuration
#[must_use]
pub fn from_config(config: &AudioConfig) -> Box<dyn AudioPlayer> {
    if config.enabled {
        Box::new(CastPlayer::new(config))
    } else {
        info!("Audio announcements disabled");
        Box::new(SilentPlayer)
    }
}
