use std::env;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key is missing; set CONS_API_KEY (or DEEPSEEK_API_KEY)")]
    MissingApiKey,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Model endpoint settings, read from the process environment.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Config {
    /// Load from the environment. Call `dotenv` beforehand to pick up a `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("CONS_API_KEY")
            .or_else(|| lookup("DEEPSEEK_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let config = Self {
            api_key,
            base_url: lookup("CONS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: lookup("CONS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: parse_var(&lookup, "CONS_TEMPERATURE", 1.0)?,
            max_tokens: parse_var(&lookup, "CONS_MAX_TOKENS", 8192)?,
            timeout: parse_var(&lookup, "CONS_TIMEOUT_SECS", 120)?,
            max_retries: parse_var(&lookup, "CONS_MAX_RETRIES", 3)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "CONS_BASE_URL",
                value: self.base_url.clone(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "temperature",
                value: self.temperature.to_string(),
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CONS_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Apply per-topic overrides from `cons.toml`.
    pub fn with_topic_settings(mut self, settings: &TopicSettings) -> Self {
        if let Some(model) = &settings.model {
            self.model = model.clone();
        }
        if let Some(temperature) = settings.temperature {
            self.temperature = temperature;
        }
        self
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBindings {
    #[default]
    Emacs,
    Vi,
}

impl KeyBindings {
    /// Editor used when neither `$VISUAL` nor `$EDITOR` is set.
    pub fn fallback_editor(self) -> &'static str {
        match self {
            KeyBindings::Emacs => "nano",
            KeyBindings::Vi => "vi",
        }
    }
}

/// Contents of a topic's `cons.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    pub key_bindings: KeyBindings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl TopicSettings {
    /// Read settings; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        };
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DEEPSEEK_API_KEY", "sk-1")])).unwrap();
        assert_eq!(config.api_key, "sk-1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.timeout, 120);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = Config::from_lookup(lookup_from(&[("CONS_API_KEY", "sk-secret")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains(DEFAULT_MODEL));
    }

    #[test]
    fn cons_key_takes_precedence() {
        let config = Config::from_lookup(lookup_from(&[
            ("CONS_API_KEY", "sk-cons"),
            ("DEEPSEEK_API_KEY", "sk-ds"),
            ("CONS_TEMPERATURE", "0.3"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-cons");
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CONS_API_KEY", "sk"),
            ("CONS_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "CONS_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn topic_settings_override_model_and_temperature() {
        let settings: TopicSettings =
            toml::from_str("key_bindings = \"vi\"\nmodel = \"deepseek-reasoner\"\ntemperature = 0.5\n")
                .unwrap();
        assert_eq!(settings.key_bindings, KeyBindings::Vi);
        assert_eq!(settings.key_bindings.fallback_editor(), "vi");

        let base = Config::from_lookup(lookup_from(&[("CONS_API_KEY", "sk")])).unwrap();
        let merged = base.with_topic_settings(&settings);
        assert_eq!(merged.model, "deepseek-reasoner");
        assert!((merged.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TopicSettings::load(&dir.path().join("cons.toml")).unwrap();
        assert_eq!(settings, TopicSettings::default());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = TopicSettings {
            key_bindings: KeyBindings::Vi,
            model: Some("deepseek-chat".to_string()),
            temperature: Some(0.75),
        };
        let parsed: TopicSettings = toml::from_str(&settings.to_toml()).unwrap();
        assert_eq!(parsed, settings);
    }
}
