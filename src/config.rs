//! # Configuration Module
//!
//! Loads configuration from a TOML file, applies the environment overrides
//! used by existing deployments (`WORKING_MODE`, `SLEEP_TIME`, ...), and
//! validates the result.

use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GridWatchError, Result};

/// Where readings come from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum WorkingMode {
    #[serde(rename = "DONGLE")]
    Dongle,
    #[serde(rename = "HTTP")]
    Http,
}

impl FromStr for WorkingMode {
    type Err = GridWatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DONGLE" => Ok(Self::Dongle),
            "HTTP" => Ok(Self::Http),
            other => Err(GridWatchError::InvalidConfig(format!(
                "unknown working mode '{}' (expected DONGLE or HTTP)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for WorkingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dongle => f.write_str("DONGLE"),
            Self::Http => f.write_str("HTTP"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dongle: DongleConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment overrides that were ignored, reported once logging is up
    #[serde(skip)]
    pub env_warnings: Vec<String>,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_working_mode")]
    pub working_mode: WorkingMode,

    #[serde(default = "default_sleep_time_s")]
    pub sleep_time_s: u64,
}

/// State and history files
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    #[serde(default = "default_history_count")]
    pub history_count: usize,
}

/// Local dongle (serial) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DongleConfig {
    #[serde(default = "default_dongle_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_dongle_timeout_ms")]
    pub timeout_ms: u64,

    /// Line written before each read; empty when the dongle pushes frames
    #[serde(default)]
    pub request: String,
}

/// HTTP telemetry endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

/// Push notification configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_device_ids_file")]
    pub device_ids_file: PathBuf,

    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_on_grid_title")]
    pub on_grid_title: String,

    #[serde(default = "default_on_grid_body")]
    pub on_grid_body: String,

    #[serde(default = "default_off_grid_title")]
    pub off_grid_title: String,

    #[serde(default = "default_off_grid_body")]
    pub off_grid_body: String,
}

/// Cast speaker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub cast_device_name: String,

    #[serde(default = "default_cast_command")]
    pub command: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

// Default value functions
fn default_working_mode() -> WorkingMode { WorkingMode::Dongle }
fn default_sleep_time_s() -> u64 { 30 }

fn default_state_file() -> PathBuf { PathBuf::from("./data/state") }
fn default_history_file() -> PathBuf { PathBuf::from("./data/history.json") }
fn default_history_count() -> usize { 20 }

fn default_dongle_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_dongle_timeout_ms() -> u64 { 5000 }

fn default_http_timeout_ms() -> u64 { 10000 }

fn default_notify_enabled() -> bool { true }
fn default_device_ids_file() -> PathBuf { PathBuf::from("./data/devices.json") }
fn default_on_grid_title() -> String { "Grid power restored.".to_string() }
fn default_on_grid_body() -> String {
    "Utility power is back, appliances can be used without limits.".to_string()
}
fn default_off_grid_title() -> String { "Grid power lost.".to_string() }
fn default_off_grid_body() -> String {
    "Running on battery, avoid heavy loads such as induction cookers and water heaters.".to_string()
}

fn default_audio_enabled() -> bool { true }
fn default_cast_command() -> String { "catt".to_string() }

fn default_log_file() -> PathBuf { PathBuf::from("./logs/grid-watch.log") }
fn default_log_format() -> String { "full".to_string() }
fn default_max_log_files() -> usize { 3 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            working_mode: default_working_mode(),
            sleep_time_s: default_sleep_time_s(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            history_file: default_history_file(),
            history_count: default_history_count(),
        }
    }
}

impl Default for DongleConfig {
    fn default() -> Self {
        Self {
            port: default_dongle_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_dongle_timeout_ms(),
            request: String::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            endpoint: String::new(),
            access_token: String::new(),
            device_ids_file: default_device_ids_file(),
            timeout_ms: default_http_timeout_ms(),
            on_grid_title: default_on_grid_title(),
            on_grid_body: default_on_grid_body(),
            off_grid_title: default_off_grid_title(),
            off_grid_body: default_off_grid_body(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_audio_enabled(),
            base_url: String::new(),
            cast_device_name: String::new(),
            command: default_cast_command(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            debug: false,
            format: default_log_format(),
            max_log_files: default_max_log_files(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use grid_watch::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    ///
    /// Without a file every value starts from its default.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed, an override is not a valid
    /// value, or the merged configuration fails validation.
    pub fn from_sources<I>(path: Option<&Path>, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply the deployment environment keys on top of the current values
    ///
    /// Unknown keys are ignored.
    pub fn apply_env<I>(&mut self, env: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in env {
            match key.as_str() {
                "WORKING_MODE" => self.general.working_mode = value.parse()?,
                "SLEEP_TIME" => self.general.sleep_time_s = parse_number(&key, &value)?,
                "HISTORY_COUNT" => self.storage.history_count = parse_number(&key, &value)?,
                "STATE_FILE" => self.storage.state_file = PathBuf::from(value),
                "HISTORY_FILE" => self.storage.history_file = PathBuf::from(value),
                "DEVICE_IDS_JSON_FILE" => self.notify.device_ids_file = PathBuf::from(value),
                "LOG_FILE" => self.logging.file = PathBuf::from(value),
                "LOG_FORMAT" => match LOG_FORMATS
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(value.trim()))
                {
                    Some(format) => self.logging.format = (*format).to_string(),
                    // Older deployments carry a Python logging format string here
                    None => self.env_warnings.push(format!(
                        "Ignoring LOG_FORMAT '{}', expected one of: {}",
                        value,
                        LOG_FORMATS.join(", ")
                    )),
                },
                "IS_DEBUG" => {
                    self.logging.debug = matches!(value.trim(), "True" | "true" | "1")
                }
                "AUDIO_BASE_URL" => self.audio.base_url = value,
                "CAST_DEVICE_NAME" => self.audio.cast_device_name = value,
                "HTTP_URL" => self.http.url = value,
                "DONGLE_PORT" => self.dongle.port = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.general.sleep_time_s == 0 || self.general.sleep_time_s > 86_400 {
            return Err(invalid("sleep_time_s must be between 1 and 86400"));
        }

        if self.storage.state_file.as_os_str().is_empty() {
            return Err(invalid("state_file cannot be empty"));
        }

        if self.storage.history_file.as_os_str().is_empty() {
            return Err(invalid("history_file cannot be empty"));
        }

        if self.storage.history_count > 1000 {
            return Err(invalid("history_count must be at most 1000"));
        }

        match self.general.working_mode {
            WorkingMode::Dongle => {
                if self.dongle.port.is_empty() {
                    return Err(invalid("dongle port cannot be empty"));
                }

                if self.dongle.timeout_ms == 0 || self.dongle.timeout_ms > 60_000 {
                    return Err(invalid("dongle timeout_ms must be between 1 and 60000"));
                }

                if ![2400, 4800, 9600, 19200, 38400, 57600, 115200].contains(&self.dongle.baud_rate) {
                    return Err(invalid(
                        "baud_rate must be one of: 2400, 4800, 9600, 19200, 38400, 57600, 115200",
                    ));
                }
            }
            WorkingMode::Http => {
                if self.http.url.is_empty() {
                    return Err(invalid("http url cannot be empty in HTTP mode"));
                }

                if self.http.timeout_ms == 0 || self.http.timeout_ms > 60_000 {
                    return Err(invalid("http timeout_ms must be between 1 and 60000"));
                }
            }
        }

        if self.notify.enabled && !self.notify.endpoint.is_empty() && self.notify.timeout_ms == 0 {
            return Err(invalid("notify timeout_ms must be greater than 0"));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(invalid("log format must be one of: full, compact, json"));
        }

        if self.logging.max_log_files == 0 {
            return Err(invalid("max_log_files must be greater than 0"));
        }

        Ok(())
    }
}

/// Keep the environment entries whose key and value are valid UTF-8
///
/// `std::env::vars` panics on the others.
pub fn utf8_env<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Log line styles understood by the logging setup
pub const LOG_FORMATS: &[&str] = &["full", "compact", "json"];

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        GridWatchError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}

fn invalid(message: &str) -> GridWatchError {
    GridWatchError::InvalidConfig(message.to_string())
}
