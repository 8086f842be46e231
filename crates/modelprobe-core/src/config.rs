//! Environment-driven settings.
//!
//! Every value has a default except the provider credentials, which are
//! simply absent when unset. Values that are set but unparsable are reported
//! as configuration errors rather than silently replaced.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::domain::{ProbeError, Provider, Result};
use crate::runner::{RunLimits, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_TIMEOUT};

pub const ENV_STORE_DIR: &str = "MODELPROBE_STORE_DIR";
pub const ENV_TIMEOUT_SECS: &str = "MODELPROBE_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENT: &str = "MODELPROBE_MAX_CONCURRENT";
pub const ENV_LOG_FORMAT: &str = "MODELPROBE_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "MODELPROBE_LOG_LEVEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_SUSPECT_API_KEY: &str = "SUSPECT_API_KEY";
pub const ENV_SUSPECT_API_BASE_URL: &str = "SUSPECT_API_BASE_URL";

pub const DEFAULT_STORE_DIR: &str = ".modelprobe";

/// Provider credentials used when a model config carries none of its own.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub suspect_api_key: Option<String>,
    pub suspect_api_base_url: Option<String>,
}

impl Credentials {
    /// Fallback API key for `provider`. Generic endpoints have none.
    pub fn api_key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Suspect => self.suspect_api_key.as_deref(),
            Provider::Generic => None,
        }
    }

    /// Fallback base URL for `provider`. Only suspect endpoints have one.
    pub fn base_url_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Suspect => self.suspect_api_base_url.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("suspect_api_key", &redact(&self.suspect_api_key))
            .field("suspect_api_base_url", &self.suspect_api_base_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_dir: PathBuf,
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub log_json: bool,
    pub log_level: Level,
    pub credentials: Credentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            timeout: DEFAULT_TIMEOUT,
            max_concurrent: DEFAULT_CONCURRENCY_LIMIT,
            log_json: false,
            log_level: Level::INFO,
            credentials: Credentials::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let timeout = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_positive(ENV_TIMEOUT_SECS, &raw)? as u64),
            None => defaults.timeout,
        };
        let max_concurrent = match get(ENV_MAX_CONCURRENT) {
            Some(raw) => parse_positive(ENV_MAX_CONCURRENT, &raw)?,
            None => defaults.max_concurrent,
        };
        let log_json = match get(ENV_LOG_FORMAT) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" => false,
                other => {
                    return Err(ProbeError::config(format!(
                        "{ENV_LOG_FORMAT} must be 'json' or 'text', got '{other}'"
                    )))
                }
            },
            None => defaults.log_json,
        };
        let log_level = match get(ENV_LOG_LEVEL) {
            Some(raw) => Level::from_str(&raw).map_err(|_| {
                ProbeError::config(format!("{ENV_LOG_LEVEL} is not a log level: '{raw}'"))
            })?,
            None => defaults.log_level,
        };

        Ok(Self {
            store_dir: get(ENV_STORE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            timeout,
            max_concurrent,
            log_json,
            log_level,
            credentials: Credentials {
                openai_api_key: get(ENV_OPENAI_API_KEY),
                anthropic_api_key: get(ENV_ANTHROPIC_API_KEY),
                suspect_api_key: get(ENV_SUSPECT_API_KEY),
                suspect_api_base_url: get(ENV_SUSPECT_API_BASE_URL),
            },
        })
    }

    pub fn limits(&self) -> RunLimits {
        RunLimits::new(self.max_concurrent, self.timeout)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ProbeError::config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}
