//! # Poll Loop
//!
//! Acquire a reading, hand it to the watcher, sleep, repeat. Iterations never
//! overlap and the sleep happens every cycle, transition or not. The first
//! error ends the loop; restarting is left to the process supervisor.

use std::time::Duration;
use tracing::info;

use crate::detector::Decision;
use crate::error::Result;
use crate::source::TelemetrySource;
use crate::watcher::GridWatcher;

/// Drives the acquire → evaluate → sleep cycle
pub struct PollLoop {
    source: Box<dyn TelemetrySource>,
    watcher: GridWatcher,
    interval: Duration,
}

impl PollLoop {
    pub fn new(source: Box<dyn TelemetrySource>, watcher: GridWatcher, interval: Duration) -> Self {
        Self {
            source,
            watcher,
            interval,
        }
    }

    /// Run a single cycle, including the trailing sleep
    ///
    /// Returns the decision when a reading was available.
    ///
    /// # Errors
    ///
    /// Propagates acquisition errors from the source and persistence errors
    /// from the watcher.
    pub async fn run_once(&mut self) -> Result<Option<Decision>> {
        let decision = match self.source.get_reading().await? {
            Some(reading) => Some(self.watcher.handle(&reading).await?),
            None => None,
        };

        info!(
            "Waiting {} seconds before next check",
            self.interval.as_secs_f64()
        );
        tokio::time::sleep(self.interval).await;

        Ok(decision)
    }

    /// Run cycles until one fails
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a cycle
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.run_once().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioPlayer;
    use crate::error::GridWatchError;
    use crate::history::HistoryStore;
    use crate::notify::MockNotifier;
    use crate::reading::Reading;
    use crate::source::MockTelemetrySource;
    use crate::state::StateStore;
    use mockall::Sequence;
    use std::time::Instant;
    use tempfile::TempDir;

    const INTERVAL: Duration = Duration::from_millis(20);

    fn reading(frequency_hz: i64) -> Reading {
        Reading {
            frequency_hz,
            grid_voltage: 2300,
            device_time: "2024-01-01 10:00:00".to_string(),
            status_text: "Normal".to_string(),
        }
    }

    fn watcher(dir: &TempDir, notifier: MockNotifier, audio: MockAudioPlayer) -> GridWatcher {
        GridWatcher::new(
            StateStore::new(dir.path().join("state")),
            HistoryStore::new(dir.path().join("history.json"), 5),
            Box::new(notifier),
            Box::new(audio),
        )
    }

    fn quiet_watcher(dir: &TempDir) -> GridWatcher {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify_on_grid().never();
        notifier.expect_notify_off_grid().never();
        let mut audio = MockAudioPlayer::new();
        audio.expect_play().never();
        watcher(dir, notifier, audio)
    }

    #[tokio::test]
    async fn test_no_reading_skips_watcher_but_sleeps() {
        let dir = TempDir::new().unwrap();
        let mut source = MockTelemetrySource::new();
        source.expect_get_reading().times(1).returning(|| Ok(None));

        let mut poll = PollLoop::new(Box::new(source), quiet_watcher(&dir), INTERVAL);
        let started = Instant::now();
        let decision = poll.run_once().await.unwrap();

        assert!(decision.is_none());
        assert!(started.elapsed() >= INTERVAL);
        assert!(!dir.path().join("state").exists());
    }

    #[tokio::test]
    async fn test_reading_is_evaluated_and_sleeps() {
        let dir = TempDir::new().unwrap();
        let mut source = MockTelemetrySource::new();
        source.expect_get_reading().times(1).returning(|| Ok(Some(reading(5000))));

        let mut poll = PollLoop::new(Box::new(source), quiet_watcher(&dir), INTERVAL);
        let started = Instant::now();
        let decision = poll.run_once().await.unwrap().unwrap();

        assert!(!decision.is_transition());
        assert!(started.elapsed() >= INTERVAL);
    }

    #[tokio::test]
    async fn test_run_stops_on_first_error() {
        let dir = TempDir::new().unwrap();
        let mut seq = Sequence::new();
        let mut source = MockTelemetrySource::new();
        source
            .expect_get_reading()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(reading(0))));
        source
            .expect_get_reading()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(reading(0))));
        source
            .expect_get_reading()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(GridWatchError::Acquisition("endpoint down".to_string())));

        let mut notifier = MockNotifier::new();
        notifier.expect_notify_off_grid().times(1).returning(|| Ok(()));
        let mut audio = MockAudioPlayer::new();
        audio.expect_play().times(1).returning(|_, _| Ok(()));

        let mut poll = PollLoop::new(Box::new(source), watcher(&dir, notifier, audio), INTERVAL);

        assert!(matches!(
            poll.run().await,
            Err(GridWatchError::Acquisition(_))
        ));
        assert_eq!(
            HistoryStore::new(dir.path().join("history.json"), 5).load().len(),
            1
        );
    }
}
