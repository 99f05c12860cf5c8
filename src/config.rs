//! Application-level configuration loading, including game pacing and the
//! question-generator endpoint settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_HUB_BACK_CONFIG_PATH";
/// Environment fallback for the generator API key.
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Seconds between topic selection and game start.
    pub countdown_seconds: u64,
    /// Capacity of matchmade public rooms.
    pub room_capacity: usize,
    /// Display name given to matchmade public rooms.
    pub default_room_name: String,
    /// Questions requested when the topic setter does not pick a count.
    pub default_question_count: usize,
    /// Question generator settings.
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone)]
/// Connection settings for the AI question generator.
pub struct GeneratorConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Model or deployment name.
    pub model: String,
    /// API key; falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: String,
    /// Generation attempts before giving up.
    pub max_attempts: u32,
    /// Base delay between attempts, doubled on each retry.
    pub retry_backoff_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if config.generator.api_key.is_empty() {
            if let Ok(key) = env::var(API_KEY_ENV) {
                config.generator.api_key = key;
            }
        }

        config
    }

    /// Countdown delay as a [`Duration`].
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_seconds)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 10,
            room_capacity: 4,
            default_room_name: "Quiz Room".to_string(),
            default_question_count: 4,
            generator: GeneratorConfig::default(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    countdown_seconds: Option<u64>,
    room_capacity: Option<usize>,
    default_room_name: Option<String>,
    default_question_count: Option<usize>,
    generator: Option<RawGeneratorConfig>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the generator section of the configuration file.
struct RawGeneratorConfig {
    endpoint: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            countdown_seconds: raw.countdown_seconds.unwrap_or(defaults.countdown_seconds),
            room_capacity: raw.room_capacity.unwrap_or(defaults.room_capacity),
            default_room_name: raw.default_room_name.unwrap_or(defaults.default_room_name),
            default_question_count: raw
                .default_question_count
                .unwrap_or(defaults.default_question_count),
            generator: raw.generator.map(Into::into).unwrap_or(defaults.generator),
        }
    }
}

impl From<RawGeneratorConfig> for GeneratorConfig {
    fn from(raw: RawGeneratorConfig) -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            endpoint: raw.endpoint.unwrap_or(defaults.endpoint),
            model: raw.model.unwrap_or(defaults.model),
            api_key: raw.api_key.unwrap_or(defaults.api_key),
            max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
            retry_backoff_ms: raw.retry_backoff_ms.unwrap_or(defaults.retry_backoff_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_files_keep_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"countdown_seconds": 3, "generator": {"model": "gpt-4o"}}"#)
                .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.countdown_seconds, 3);
        assert_eq!(config.room_capacity, 4);
        assert_eq!(config.generator.model, "gpt-4o");
        assert_eq!(config.generator.max_attempts, 3);
    }
}
