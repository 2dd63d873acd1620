//! Runtime configuration for the analysis pipeline
//!
//! Configuration is read once (usually from the environment) and validated
//! before any network call is attempted. Every problem found here surfaces as
//! `Error::Configuration`, never as an upstream failure later on.
//!
//! # Environment variables
//!
//! - `TALLY_DB_PATH`: database file (default: `tally.db`)
//! - `TALLY_DB_KEY`: database passphrase (required when encryption is on)
//! - `AI_BACKEND`: `ollama` (default), `openai_compatible`, `mock`
//! - `OLLAMA_HOST`, `OLLAMA_MODEL` (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST` (default: https://api.openai.com),
//!   `OPENAI_COMPATIBLE_MODEL` (default: gpt-4o-mini), `OPENAI_COMPATIBLE_API_KEY`
//! - `AI_TIMEOUT_SECS`: optional request timeout for AI calls

use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

/// Environment variable for the database path
pub const DB_PATH_ENV: &str = "TALLY_DB_PATH";

pub const DEFAULT_DB_PATH: &str = "tally.db";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_HOST: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Which AI backend answers categorization requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackendKind {
    Ollama,
    OpenAICompatible,
    Mock,
}

impl std::str::FromStr for AiBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "mock" => Ok(Self::Mock),
            other => Err(Error::Configuration(format!(
                "Unknown AI_BACKEND '{}' (expected ollama, openai_compatible or mock)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AiBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai_compatible",
            Self::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// AI capability settings
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub backend: AiBackendKind,
    pub host: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    /// No timeout unless configured; a slow reply is still a valid reply
    pub timeout: Option<Duration>,
}

impl AiConfig {
    pub fn ollama(host: &str, model: &str) -> Self {
        Self {
            backend: AiBackendKind::Ollama,
            host: Some(host.to_string()),
            model: model.to_string(),
            api_key: None,
            timeout: None,
        }
    }

    pub fn openai_compatible(host: &str, model: &str, api_key: &str) -> Self {
        Self {
            backend: AiBackendKind::OpenAICompatible,
            host: Some(host.to_string()),
            model: model.to_string(),
            api_key: Some(api_key.to_string()),
            timeout: None,
        }
    }

    pub fn mock() -> Self {
        Self {
            backend: AiBackendKind::Mock,
            host: None,
            model: "mock".to_string(),
            api_key: None,
            timeout: None,
        }
    }

    /// Build from an arbitrary variable lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: AiBackendKind = lookup("AI_BACKEND").unwrap_or_default().parse()?;

        let timeout = match lookup("AI_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::Configuration(format!("AI_TIMEOUT_SECS must be a number, got '{}'", raw))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let config = match backend {
            AiBackendKind::Ollama => Self {
                backend,
                host: lookup("OLLAMA_HOST"),
                model: lookup("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                api_key: None,
                timeout,
            },
            AiBackendKind::OpenAICompatible => Self {
                backend,
                host: Some(
                    lookup("OPENAI_COMPATIBLE_HOST")
                        .unwrap_or_else(|| DEFAULT_OPENAI_HOST.to_string()),
                ),
                model: lookup("OPENAI_COMPATIBLE_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                api_key: lookup("OPENAI_COMPATIBLE_API_KEY"),
                timeout,
            },
            AiBackendKind::Mock => Self {
                timeout,
                ..Self::mock()
            },
        };

        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Fail fast if the selected backend lacks its endpoint or credential
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            AiBackendKind::Ollama => {
                if self.host.is_none() {
                    return Err(Error::Configuration(
                        "OLLAMA_HOST is not set; the AI backend cannot be reached".into(),
                    ));
                }
            }
            AiBackendKind::OpenAICompatible => {
                if self.host.is_none() {
                    return Err(Error::Configuration(
                        "OPENAI_COMPATIBLE_HOST is not set".into(),
                    ));
                }
                if self.api_key.is_none() {
                    return Err(Error::Configuration(
                        "OPENAI_COMPATIBLE_API_KEY is not set; the AI credential is required"
                            .into(),
                    ));
                }
            }
            AiBackendKind::Mock => {}
        }

        if self.model.trim().is_empty() {
            return Err(Error::Configuration("AI model name is empty".into()));
        }

        Ok(())
    }
}

/// Analysis store settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
    pub passphrase: Option<String>,
    /// SQLCipher encryption (on by default)
    pub encrypt: bool,
}

impl DatabaseConfig {
    pub fn encrypted(path: &str, passphrase: &str) -> Self {
        Self {
            path: path.to_string(),
            passphrase: Some(passphrase.to_string()),
            encrypt: true,
        }
    }

    /// WARNING: development and testing only
    pub fn unencrypted(path: &str) -> Self {
        Self {
            path: path.to_string(),
            passphrase: None,
            encrypt: false,
        }
    }

    pub fn from_lookup<F>(lookup: F, encrypt: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            path: lookup(DB_PATH_ENV).unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            passphrase: lookup(DB_KEY_ENV),
            encrypt,
        }
    }

    pub fn from_env(encrypt: bool) -> Self {
        Self::from_lookup(env_lookup, encrypt)
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(Error::Configuration("Database path is empty".into()));
        }
        if self.encrypt && self.passphrase.is_none() {
            return Err(Error::Configuration(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            )));
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
}

impl AppConfig {
    pub fn from_env(encrypt: bool) -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env(encrypt),
            ai: AiConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.ai.validate()
    }
}

/// Environment lookup that treats empty values as unset
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_ollama_defaults() {
        let config = AiConfig::from_lookup(lookup_from(&[("OLLAMA_HOST", "http://localhost:11434")]))
            .unwrap();
        assert_eq!(config.backend, AiBackendKind::Ollama);
        assert_eq!(config.model, DEFAULT_OLLAMA_MODEL);
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ollama_missing_host() {
        let config = AiConfig::from_lookup(lookup_from(&[])).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("OLLAMA_HOST"));
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config =
            AiConfig::from_lookup(lookup_from(&[("AI_BACKEND", "openai_compatible")])).unwrap();
        assert_eq!(config.host.as_deref(), Some(DEFAULT_OPENAI_HOST));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_COMPATIBLE_API_KEY"));

        let config = AiConfig::from_lookup(lookup_from(&[
            ("AI_BACKEND", "openai"),
            ("OPENAI_COMPATIBLE_API_KEY", "sk-test"),
            ("AI_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_unknown_backend_is_configuration_error() {
        let err = AiConfig::from_lookup(lookup_from(&[("AI_BACKEND", "gpt-cloud")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_bad_timeout() {
        let err = AiConfig::from_lookup(lookup_from(&[("AI_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_database_requires_key_when_encrypted() {
        let config = DatabaseConfig::from_lookup(lookup_from(&[]), true);
        assert_eq!(config.path, DEFAULT_DB_PATH);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = DatabaseConfig::from_lookup(lookup_from(&[(DB_KEY_ENV, "secret")]), true);
        assert!(config.validate().is_ok());

        assert!(DatabaseConfig::unencrypted("x.db").validate().is_ok());
        assert!(DatabaseConfig::unencrypted("  ").validate().is_err());
    }

    #[test]
    fn test_app_config_validates_both() {
        let config = AppConfig {
            database: DatabaseConfig::unencrypted("x.db"),
            ai: AiConfig::mock(),
        };
        assert!(config.validate().is_ok());

        let config = AppConfig {
            database: DatabaseConfig::unencrypted("x.db"),
            ai: AiConfig {
                host: None,
                ..AiConfig::ollama("h", "m")
            },
        };
        assert!(config.validate().is_err());
    }
}
