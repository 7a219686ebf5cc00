//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Work/Rest phase lengths and progress counting
//! - The category choices offered for Work sessions
//! - The notification relay
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{
    parse_minutes, EngineSettings, PhaseDurations, DEFAULT_REST_MINUTES, DEFAULT_WORK_MINUTES,
};

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work", deserialize_with = "lenient_work")]
    pub work_minutes: u32,
    #[serde(default = "default_rest", deserialize_with = "lenient_rest")]
    pub rest_minutes: u32,
    #[serde(default = "default_full_session")]
    pub full_session_minutes: u32,
    #[serde(default = "default_progress_cap")]
    pub progress_cap: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Category choices for Work sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
}

/// Notification relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// HTTP endpoint that forwards each recorded batch as an e-mail.
    #[serde(default)]
    pub webhook_url: String,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_work() -> u32 {
    DEFAULT_WORK_MINUTES
}
fn default_rest() -> u32 {
    DEFAULT_REST_MINUTES
}
fn default_full_session() -> u32 {
    30
}
fn default_progress_cap() -> u32 {
    8
}
fn default_tick_interval_ms() -> u64 {
    250
}
fn default_choices() -> Vec<String> {
    vec!["Job".into(), "Personal".into()]
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work(),
            rest_minutes: default_rest(),
            full_session_minutes: default_full_session(),
            progress_cap: default_progress_cap(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            choices: default_choices(),
        }
    }
}

/// Anything a user might type for a minutes field.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMinutes {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_minutes<'de, D: Deserializer<'de>>(d: D, fallback: u32) -> Result<u32, D::Error> {
    let minutes = match RawMinutes::deserialize(d)? {
        RawMinutes::Int(n) => u32::try_from(n).ok().filter(|n| *n > 0),
        RawMinutes::Float(f) if f >= 1.0 && f < f64::from(u32::MAX) => Some(f.trunc() as u32),
        RawMinutes::Float(_) => None,
        RawMinutes::Text(s) => parse_minutes(&s),
    };
    Ok(minutes.unwrap_or(fallback))
}

fn lenient_work<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    lenient_minutes(d, DEFAULT_WORK_MINUTES)
}

fn lenient_rest<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    lenient_minutes(d, DEFAULT_REST_MINUTES)
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        let mut parent = root;
        if let Some(path) = parent_path {
            for part in path.split('.') {
                parent = parent.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                let n = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                serde_json::Value::Number(n.into())
            }
            serde_json::Value::Array(_) => serde_json::Value::Array(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| serde_json::Value::String(s.to_string()))
                    .collect(),
            ),
            serde_json::Value::Object(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, or create it with defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. Does not save.
    ///
    /// Phase lengths accept any text: values that are not positive whole
    /// numbers are replaced by the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "timer.work_minutes" => {
                self.timer.work_minutes = parse_minutes(value).unwrap_or(DEFAULT_WORK_MINUTES);
                return Ok(());
            }
            "timer.rest_minutes" => {
                self.timer.rest_minutes = parse_minutes(value).unwrap_or(DEFAULT_REST_MINUTES);
                return Ok(());
            }
            _ => {}
        }
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations::new(
            i64::from(self.timer.work_minutes),
            i64::from(self.timer.rest_minutes),
        )
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            full_session_minutes: self.timer.full_session_minutes,
            progress_cap: self.timer.progress_cap,
        }
    }

    /// Poll cadence for a live display, kept between 10ms and 250ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timer.tick_interval_ms.clamp(10, 250))
    }

    /// Webhook URL when notifications are switched on and configured.
    pub fn notification_webhook(&self) -> Option<&str> {
        let url = self.notifications.webhook_url.trim();
        (self.notifications.enabled && !url.is_empty()).then_some(url)
    }
}
