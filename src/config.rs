//! Configuration types for the reminder bot.
//!
//! Values are layered: built-in defaults, then an optional TOML file named
//! by `TASKMINDER_CONFIG`, then environment variables.

use crate::error::{BotError, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Env var naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "TASKMINDER_CONFIG";
/// Env var holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
/// Env var holding the daily reminder time (`HH:MM`).
pub const REMINDER_TIME_ENV: &str = "REMINDER_TIME";
/// Env var overriding the record directory.
pub const DATA_DIR_ENV: &str = "TASKMINDER_DATA_DIR";
/// Env var overriding the Telegram API base URL.
pub const TELEGRAM_API_URL_ENV: &str = "TELEGRAM_API_URL";
/// Env var overriding the per-delivery timeout in seconds.
pub const SEND_TIMEOUT_ENV: &str = "SEND_TIMEOUT_SECS";
/// Env var enabling daily log files in the given directory.
pub const LOG_DIR_ENV: &str = "TASKMINDER_LOG_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram bot token. Required.
    pub bot_token: String,
    /// Wall-clock time at which the daily reminder pass runs.
    pub reminder_time: DailyTime,
    /// Directory holding `members.json` and `tasks.json`.
    pub data_dir: PathBuf,
    /// Upper bound for a single reminder delivery, in seconds.
    pub send_timeout_secs: u64,
    /// Scheduler poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Capacity of the inbound command queue.
    pub inbound_queue_size: usize,
    /// Telegram transport settings.
    pub telegram: TelegramConfig,
    /// Logging settings.
    pub log: LogConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            reminder_time: DailyTime::default(),
            data_dir: PathBuf::from("."),
            send_timeout_secs: 10,
            poll_interval_ms: 1_000,
            inbound_queue_size: 64,
            telegram: TelegramConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// API base URL (overridden in tests to point at a mock server).
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily log files. Stderr only when `None`.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "taskminder=info".to_owned(),
            dir: None,
        }
    }
}

/// A daily wall-clock trigger time in 24-hour `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DailyTime {
    hour: u8,
    min: u8,
}

impl DailyTime {
    /// Build a trigger time, rejecting out-of-range values.
    pub fn new(hour: u8, min: u8) -> Result<Self> {
        if hour > 23 || min > 59 {
            return Err(BotError::Config(format!(
                "reminder time {hour:02}:{min:02} is out of range"
            )));
        }
        Ok(Self { hour, min })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    /// The trigger as a `NaiveTime` at second zero.
    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.min), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl Default for DailyTime {
    fn default() -> Self {
        Self { hour: 9, min: 0 }
    }
}

impl FromStr for DailyTime {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BotError::Config(format!("invalid reminder time '{s}', expected HH:MM"));

        let (hour, min) = s.trim().split_once(':').ok_or_else(invalid)?;
        let digits_ok = |part: &str, max_len: usize| {
            !part.is_empty() && part.len() <= max_len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits_ok(hour, 2) || min.len() != 2 || !digits_ok(min, 2) {
            return Err(invalid());
        }

        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let min: u8 = min.parse().map_err(|_| invalid())?;
        Self::new(hour, min).map_err(|_| invalid())
    }
}

impl std::fmt::Display for DailyTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.min)
    }
}

impl TryFrom<String> for DailyTime {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DailyTime> for String {
    fn from(value: DailyTime) -> Self {
        value.to_string()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when the config file is unreadable, an
    /// override cannot be parsed, or the bot token is missing.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of `std::env::var`.
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(token) = value(BOT_TOKEN_ENV) {
            self.bot_token = token;
        }
        if let Some(time) = value(REMINDER_TIME_ENV) {
            self.reminder_time = time.parse()?;
        }
        if let Some(dir) = value(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = value(TELEGRAM_API_URL_ENV) {
            self.telegram.api_base_url = url;
        }
        if let Some(secs) = value(SEND_TIMEOUT_ENV) {
            self.send_timeout_secs = secs.parse().map_err(|e| {
                BotError::Config(format!("invalid {SEND_TIMEOUT_ENV} '{secs}': {e}"))
            })?;
        }
        if let Some(dir) = value(LOG_DIR_ENV) {
            self.log.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(BotError::Config(format!(
                "{BOT_TOKEN_ENV} is not set; the bot cannot start without a token"
            )));
        }
        if self.send_timeout_secs == 0 {
            return Err(BotError::Config("send_timeout_secs must be positive".to_owned()));
        }
        if self.poll_interval_ms == 0 {
            return Err(BotError::Config("poll_interval_ms must be positive".to_owned()));
        }
        if self.telegram.api_base_url.trim().is_empty() {
            return Err(BotError::Config("telegram.api_base_url is empty".to_owned()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| BotError::Config(e.to_string()))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_reminder_time_is_nine() {
        let config = BotConfig::default();
        assert_eq!(config.reminder_time.to_string(), "09:00");
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = BotConfig::load_with(env(&[])).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn env_overrides_apply() {
        let config = BotConfig::load_with(env(&[
            ("BOT_TOKEN", "123:abc"),
            ("REMINDER_TIME", "18:45"),
            ("TASKMINDER_DATA_DIR", "/var/lib/taskminder"),
            ("SEND_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.reminder_time, DailyTime::new(18, 45).unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/taskminder"));
        assert_eq!(config.send_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn bad_reminder_time_is_config_error() {
        let err =
            BotConfig::load_with(env(&[("BOT_TOKEN", "t"), ("REMINDER_TIME", "9am")])).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn daily_time_parsing() {
        assert_eq!("07:05".parse::<DailyTime>().unwrap(), DailyTime::new(7, 5).unwrap());
        assert_eq!("7:05".parse::<DailyTime>().unwrap(), DailyTime::new(7, 5).unwrap());
        assert!("24:00".parse::<DailyTime>().is_err());
        assert!("12:60".parse::<DailyTime>().is_err());
        assert!("12:5".parse::<DailyTime>().is_err());
        assert!("1200".parse::<DailyTime>().is_err());
        assert!("-1:00".parse::<DailyTime>().is_err());
    }

    #[test]
    fn file_then_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskminder.toml");
        std::fs::write(
            &path,
            "bot_token = \"from-file\"\nreminder_time = \"06:30\"\n[telegram]\npoll_timeout_secs = 5\n",
        )
        .unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let config = BotConfig::load_with(env(&[
            ("TASKMINDER_CONFIG", path_str.as_str()),
            ("REMINDER_TIME", "07:00"),
        ]))
        .unwrap();

        assert_eq!(config.bot_token, "from-file");
        assert_eq!(config.reminder_time.to_string(), "07:00");
        assert_eq!(config.telegram.poll_timeout_secs, 5);
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
    }

    #[test]
    fn serialized_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskminder.toml");
        let mut config = BotConfig::default();
        config.bot_token = "tok".to_owned();
        config.reminder_time = DailyTime::new(21, 15).unwrap();

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let restored = BotConfig::from_file(&path).unwrap();
        assert_eq!(restored.bot_token, "tok");
        assert_eq!(restored.reminder_time, config.reminder_time);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "reminder_time = \"nope\"").unwrap();
        assert!(matches!(BotConfig::from_file(&path), Err(BotError::Config(_))));
    }
}
