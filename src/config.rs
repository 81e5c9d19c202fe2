//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::app::Mode;
use crate::error::{GatewayError, Result};
use crate::radio::{RadioSettings, DEFAULT_TX_POWER_DBM};

/// ISM bands the radio may be tuned to, in Hz
const ISM_BANDS: &[(u32, u32)] = &[
    (314_000_000, 316_000_000),
    (433_050_000, 434_790_000),
    (863_000_000, 870_000_000),
    (902_000_000, 928_000_000),
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Radio configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: i8,

    /// Overrides the frequency of the selected mode
    #[serde(default)]
    pub frequency_hz: Option<u32>,
}

/// Application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
}

/// Decoded event output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// JSON Lines event log, stdout when unset
    #[serde(default)]
    pub log_path: Option<String>,
}

/// Poll scheduler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_tx_power_dbm() -> i8 { DEFAULT_TX_POWER_DBM }

fn default_mode() -> Mode { Mode::Rc433 }

fn default_base_topic() -> String { "rfgw".to_string() }

fn default_tick_ms() -> u64 { 10 }

fn default_log_level() -> String { "info".to_string() }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            tx_power_dbm: default_tx_power_dbm(),
            frequency_hz: None,
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self { mode: default_mode() }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            log_path: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: default_tick_ms() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl RadioConfig {
    /// Radio settings for `mode` with the configured overrides applied
    pub fn settings_for(&self, mode: Mode) -> RadioSettings {
        RadioSettings {
            frequency_hz: self.frequency_hz.unwrap_or_else(|| mode.frequency_hz()),
            tx_power_dbm: self.tx_power_dbm,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> GatewayError {
    GatewayError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use rf_gateway::config::Config;
    ///
    /// let config = Config::load("config/gateway.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !(-18..=20).contains(&self.radio.tx_power_dbm) {
            return Err(invalid("tx_power_dbm must be between -18 and 20"));
        }

        if let Some(hz) = self.radio.frequency_hz {
            if !ISM_BANDS.iter().any(|&(low, high)| (low..=high).contains(&hz)) {
                return Err(invalid(format!(
                    "frequency_hz {} is outside the 315/433/868/915 MHz ISM bands",
                    hz
                )));
            }
        }

        if self.events.base_topic.trim().is_empty() {
            return Err(invalid("base_topic cannot be empty"));
        }

        if self.events.base_topic.ends_with('/') {
            return Err(invalid("base_topic must not end with '/'"));
        }

        if self.scheduler.tick_ms == 0 || self.scheduler.tick_ms > 100 {
            return Err(invalid("tick_ms must be between 1 and 100"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
