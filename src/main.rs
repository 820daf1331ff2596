//! # Grid Watch
//!
//! Watch a solar inverter's utility-grid connection and announce outages
//! and restores.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (file given as first argument or `GRID_WATCH_CONFIG`,
//!      else `config/default.toml` when present), then environment overrides
//!    - Set up logging (rotating file, stdout in debug mode)
//!    - Open the telemetry source selected by `WORKING_MODE`
//!
//! 2. **Main Loop**
//!    - Read the inverter, compare against the persisted grid state
//!    - On a transition: record history, persist state, notify, play audio
//!    - Sleep `SLEEP_TIME` seconds
//!
//! 3. **Failure**
//!    - Any error that escapes a cycle is logged and the process exits with
//!      status 1 for the supervisor to restart it
//!
//! # Examples
//!
//! ```bash
//! WORKING_MODE=HTTP HTTP_URL=http://inverter.local/api/runtime cargo run --release
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use grid_watch::config::{utf8_env, Config};
use grid_watch::history::HistoryStore;
use grid_watch::poll::PollLoop;
use grid_watch::state::StateStore;
use grid_watch::watcher::GridWatcher;
use grid_watch::{audio, logging, notify, source};

/// Config file used when none is given explicitly
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file
const CONFIG_ENV: &str = "GRID_WATCH_CONFIG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("grid-watch: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("grid-watch: failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Got error when running grid watch: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<Config> {
    let path = config_path();
    let env = utf8_env(std::env::vars_os());
    Config::from_sources(path.as_deref(), env).with_context(|| match &path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration from environment".to_string(),
    })
}

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
        .or_else(|| {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            default.exists().then(|| default.to_path_buf())
        })
}

async fn run(config: Config) -> Result<()> {
    info!(
        "Grid Watch v{} working on mode: {}",
        env!("CARGO_PKG_VERSION"),
        config.general.working_mode
    );
    for warning in &config.env_warnings {
        warn!("{}", warning);
    }

    let notifier = notify::from_config(&config.notify).context("failed to set up notifier")?;
    let player = audio::from_config(&config.audio);
    let watcher = GridWatcher::new(
        StateStore::new(&config.storage.state_file),
        HistoryStore::new(&config.storage.history_file, config.storage.history_count),
        notifier,
        player,
    );

    let source = source::from_config(&config).context("failed to open telemetry source")?;

    let mut poll = PollLoop::new(
        source,
        watcher,
        Duration::from_secs(config.general.sleep_time_s),
    );
    poll.run().await?;

    Ok(())
}
