// config.rs - Runtime settings from the environment (.env supported)
use crate::jobs::video_job::DEFAULT_POLL_INTERVAL;
use crate::veo_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATA_DIR: &str = "./veo_director_data";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive whole number of seconds, got {value:?}")]
    InvalidPollInterval { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub data_dir: PathBuf,
    pub model: String,
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let poll_interval = match non_empty("VEO_POLL_INTERVAL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidPollInterval {
                        name: "VEO_POLL_INTERVAL_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            api_key: non_empty("GEMINI_API_KEY"),
            data_dir: non_empty("VEO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            model: non_empty("VEO_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty("VEO_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            poll_interval,
        })
    }

    /// Directory holding the persisted project snapshot
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Directory holding downloaded clips
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("data_dir", &self.data_dir)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
