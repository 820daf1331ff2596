//! # Grid Watcher
//!
//! Applies a [`Decision`] to the outside world. On a transition the history
//! and state files are written first; notification and audio run only after
//! both writes succeeded, and their failures are logged, never propagated.

use tracing::{info, warn};

use crate::audio::{AudioPlayer, HAS_GRID_CLIP, HAS_GRID_REPEAT, LOST_GRID_CLIP, LOST_GRID_REPEAT};
use crate::detector::{evaluate, Decision};
use crate::error::Result;
use crate::history::{GridEvent, HistoryStore};
use crate::notify::Notifier;
use crate::reading::Reading;
use crate::state::StateStore;

/// Detects grid transitions and fires their side effects
pub struct GridWatcher {
    state: StateStore,
    history: HistoryStore,
    notifier: Box<dyn Notifier>,
    audio: Box<dyn AudioPlayer>,
}

impl GridWatcher {
    pub fn new(
        state: StateStore,
        history: HistoryStore,
        notifier: Box<dyn Notifier>,
        audio: Box<dyn AudioPlayer>,
    ) -> Self {
        Self {
            state,
            history,
            notifier,
            audio,
        }
    }

    /// Evaluate one reading and act on it
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if a transition could not be written; nothing
    /// is announced in that case.
    pub async fn handle(&mut self, reading: &Reading) -> Result<Decision> {
        let prior = self.state.load();
        let decision = evaluate(reading, prior.as_ref());

        if decision.connected {
            info!("{}", decision.summary);
        } else {
            warn!("{}", decision.summary);
        }

        let Some(entry) = decision.transition.clone() else {
            info!("State did not change, skipping notifications");
            return Ok(decision);
        };

        let mut history = self.history.load();
        history.record(entry.clone());
        self.history.save(&history)?;
        self.state.save(decision.connected)?;
        info!("Recorded {} at {}", entry.kind, entry.time);

        match entry.kind {
            GridEvent::OnGrid => {
                if let Err(e) = self.notifier.notify_on_grid().await {
                    warn!("On-grid notification failed: {}", e);
                }
                if let Err(e) = self.audio.play(HAS_GRID_CLIP, HAS_GRID_REPEAT).await {
                    warn!("Failed to play {}: {}", HAS_GRID_CLIP, e);
                }
            }
            GridEvent::OffGrid => {
                warn!("Full reading at grid loss: {:?}", reading);
                if let Err(e) = self.notifier.notify_off_grid().await {
                    warn!("Off-grid notification failed: {}", e);
                }
                if let Err(e) = self.audio.play(LOST_GRID_CLIP, LOST_GRID_REPEAT).await {
                    warn!("Failed to play {}: {}", LOST_GRID_CLIP, e);
                }
            }
        }

        Ok(decision)
    }
}
