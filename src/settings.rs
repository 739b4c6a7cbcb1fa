//! Process settings read from the environment
//!
//! An optional `.env` file is loaded first; real environment variables win.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings: missing env var {0}")]
    Missing(&'static str),

    #[error("settings: invalid value {value:?} for env var {name}")]
    Invalid { name: &'static str, value: String },

    #[error("settings: no API keys were loaded")]
    NoApiKeys,

    #[error("settings: load timezone {0:?}: unknown timezone")]
    Timezone(String),
}

/// Runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram_channel: String,
    pub timezone: Tz,
    pub api_keys: Vec<String>,
    pub debug: bool,
    pub trace: bool,
    pub backlog_size: usize,
    pub http_port: u16,
    pub tcp_port: u16,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Load `.env` (if present) and read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str, default: &str| -> String {
            lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let timezone_name = var("TZ", "Europe/Kiev");
        let timezone =
            Tz::from_str(&timezone_name).map_err(|_| SettingsError::Timezone(timezone_name))?;

        let api_keys: Vec<String> = lookup("API_KEYS")
            .ok_or(SettingsError::Missing("API_KEYS"))?
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        if api_keys.is_empty() {
            return Err(SettingsError::NoApiKeys);
        }

        Ok(Self {
            telegram_channel: var("TELEGRAM_CHANNEL", "air_alert_ua"),
            timezone,
            api_keys,
            debug: parse("DEBUG", var("DEBUG", "false"))?,
            trace: parse("TRACE", var("TRACE", "false"))?,
            backlog_size: parse::<NonZeroUsize>("BACKLOG_SIZE", var("BACKLOG_SIZE", "200"))?.get(),
            http_port: parse("HTTP_PORT", var("HTTP_PORT", "10101"))?,
            tcp_port: parse("TCP_PORT", var("TCP_PORT", "1024"))?,
            data_dir: PathBuf::from(var("DATA_DIR", "./data")),
        })
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("app_state.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.jsonl")
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, SettingsError> {
    value
        .parse()
        .map_err(|_| SettingsError::Invalid { name, value })
}
