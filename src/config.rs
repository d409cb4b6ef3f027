use std::fs;
use std::path::Path;

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TurnipBotError};

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const TOKEN_ENV: &str = "TURNIP_BOT_TOKEN";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_week_start() -> String {
    "monday".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7979
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub token: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sqlite_path: Option<String>,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub texts_dir: Option<String>,
    #[serde(default = "default_week_start")]
    pub week_start: String,
    #[serde(default)]
    pub allow_delete: bool,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    pub fn convention_defaults(db_path: &str) -> Self {
        Self {
            sqlite_path: Some(db_path.to_string()),
            default_timezone: default_timezone(),
            language: default_language(),
            texts_dir: None,
            week_start: default_week_start(),
            allow_delete: false,
            daemon: DaemonConfig::default(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            TurnipBotError::Config(format!("failed to read {}: {e}", path.to_string_lossy()))
        })?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| TurnipBotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &str, db_path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            return Self::from_file(path);
        }
        tracing::warn!(config_path = path, "No config file found; using defaults");
        let config = Self::convention_defaults(db_path);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.week_start_day()?;
        if self.language.trim().is_empty() {
            return Err(TurnipBotError::Config("language cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.default_timezone).map_err(|_| {
            TurnipBotError::Config(format!(
                "unknown default_timezone `{}`",
                self.default_timezone
            ))
        })
    }

    pub fn week_start_day(&self) -> Result<Weekday> {
        self.week_start.trim().parse::<Weekday>().map_err(|_| {
            TurnipBotError::Config(format!("unknown week_start `{}`", self.week_start))
        })
    }

    pub fn resolve_sqlite_path(&self) -> String {
        self.sqlite_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .unwrap_or_else(crate::runtime_paths::default_db_path)
    }

    pub fn resolve_texts_dir(&self) -> String {
        self.texts_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .unwrap_or("texts")
            .to_string()
    }

    /// The environment token wins over the one in the file.
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.daemon
                    .token
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            })
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TurnipBotError::Timezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"default_timezone": "Europe/Madrid"}"#)
            .expect("config should parse");
        config.validate().expect("valid config");
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Madrid);
        assert_eq!(config.week_start_day().unwrap(), Weekday::Mon);
        assert_eq!(config.language, "en");
        assert_eq!(config.daemon.port, 7979);
        assert!(!config.allow_delete);
    }

    #[test]
    fn invalid_timezone_fails_validation() {
        let mut config = Config::convention_defaults(":memory:");
        config.default_timezone = "Mars/Olympus_Mons".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TurnipBotError::Config(_)));
    }

    #[test]
    fn sunday_week_start_is_accepted() {
        let mut config = Config::convention_defaults(":memory:");
        config.week_start = "sunday".to_string();
        assert_eq!(config.week_start_day().unwrap(), Weekday::Sun);
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"sqlite_path": "/tmp/t.db", "language": "es", "allow_delete": true}"#,
        )
        .expect("write config");
        let config = Config::from_file(&path).expect("load config");
        assert_eq!(config.resolve_sqlite_path(), "/tmp/t.db");
        assert_eq!(config.language, "es");
        assert!(config.allow_delete);
        assert_eq!(config.resolve_texts_dir(), "texts");
    }
}
