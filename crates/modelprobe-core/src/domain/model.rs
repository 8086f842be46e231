//! Model endpoint configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ProbeError, Result};

/// Who operates the endpoint under test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    /// Endpoint under investigation (reseller, relay, aggregator).
    Suspect,
    /// Any OpenAI-compatible endpoint (local models, gateways).
    Generic,
}

impl Provider {
    /// Wire protocol used when the config does not name one explicitly.
    pub fn default_protocol(self) -> Protocol {
        match self {
            Provider::OpenAi | Provider::Generic => Protocol::OpenAi,
            Provider::Anthropic | Provider::Suspect => Protocol::Anthropic,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Suspect => "suspect",
            Provider::Generic => "generic",
        };
        f.write_str(s)
    }
}

impl FromStr for Provider {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "suspect" => Ok(Provider::Suspect),
            "generic" => Ok(Provider::Generic),
            other => Err(ProbeError::config(format!(
                "unknown provider '{other}' (expected openai, anthropic, suspect or generic)"
            ))),
        }
    }
}

/// Wire protocol an adapter speaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Chat Completions (`/chat/completions`, bearer auth).
    OpenAi,
    /// Messages API (`/v1/messages`, `x-api-key`).
    Anthropic,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::OpenAi => f.write_str("openai"),
            Protocol::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Protocol::OpenAi),
            "anthropic" => Ok(Protocol::Anthropic),
            other => Err(ProbeError::config(format!(
                "unknown protocol '{other}' (expected openai or anthropic)"
            ))),
        }
    }
}

/// One target endpoint/model under test. Immutable once a run starts.
///
/// `provider` and `protocol` are kept as strings at the boundary so that a
/// bad value surfaces as a [`ProbeError::Configuration`] before dispatch
/// instead of a deserialization failure somewhere upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Advertised model name, e.g. `"Opus 4.6"` or `"gpt-4o"`.
    pub model_name: String,

    /// `openai`, `anthropic`, `suspect` or `generic`.
    pub provider: String,

    /// `openai` or `anthropic`; defaults from the provider when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Base URL override for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// API key override. Never serialized into results or reports.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Other names the advertised model is legitimately known by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Opaque request parameters forwarded to the adapter
    /// (`max_tokens`, `temperature`, `system_prompt`).
    #[serde(default = "empty_object")]
    pub parameters: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ModelConfig {
    /// Create a config with no overrides.
    pub fn new(model_name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            provider: provider.into(),
            protocol: None,
            api_base_url: None,
            api_key: None,
            aliases: Vec::new(),
            parameters: empty_object(),
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.parameters {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// Parsed provider.
    pub fn provider_kind(&self) -> Result<Provider> {
        self.provider.parse()
    }

    /// Effective protocol: explicit value, or the provider default.
    pub fn resolve_protocol(&self) -> Result<Protocol> {
        match self.protocol.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.parse(),
            _ => Ok(self.provider_kind()?.default_protocol()),
        }
    }

    /// Requested name followed by every alias.
    pub fn accepted_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.model_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Read an integer parameter.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Read a float parameter.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Read a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(serde_json::Value::as_str)
    }

    /// Validate the parts of the config the core can check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(ProbeError::config("model_name must not be empty"));
        }
        if self.model_name.chars().count() > 100 {
            return Err(ProbeError::config("model_name exceeds 100 characters"));
        }
        self.resolve_protocol()?;
        if !self.parameters.is_object() {
            return Err(ProbeError::config(format!(
                "parameters for '{}' must be a JSON object",
                self.model_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_defaults_follow_provider() {
        assert_eq!(
            ModelConfig::new("gpt-4o", "openai").resolve_protocol().unwrap(),
            Protocol::OpenAi
        );
        assert_eq!(
            ModelConfig::new("Opus 4.6", "suspect").resolve_protocol().unwrap(),
            Protocol::Anthropic
        );
        assert_eq!(
            ModelConfig::new("llama-3", "generic").resolve_protocol().unwrap(),
            Protocol::OpenAi
        );
    }

    #[test]
    fn explicit_protocol_wins() {
        let cfg = ModelConfig::new("Opus 4.6", "suspect").with_protocol("openai");
        assert_eq!(cfg.resolve_protocol().unwrap(), Protocol::OpenAi);
    }

    #[test]
    fn blank_protocol_falls_back_to_provider() {
        let cfg = ModelConfig::new("claude", "anthropic").with_protocol("  ");
        assert_eq!(cfg.resolve_protocol().unwrap(), Protocol::Anthropic);
    }

    #[test]
    fn unknown_protocol_is_configuration_error() {
        let cfg = ModelConfig::new("x", "openai").with_protocol("grpc");
        let err = cfg.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("grpc"));
    }

    #[test]
    fn unknown_provider_is_configuration_error() {
        let err = ModelConfig::new("x", "azure").validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn empty_model_name_rejected() {
        assert!(ModelConfig::new("  ", "openai").validate().is_err());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let cfg = ModelConfig::new("gpt-4o", "openai").with_api_key("sk-secret");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("sk-secret"));

        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.api_key, None);
        assert_eq!(back.model_name, "gpt-4o");
    }

    #[test]
    fn deserializes_minimal_config() {
        let cfg: ModelConfig =
            serde_json::from_str(r#"{"model_name":"Sonnet 4.5","provider":"suspect"}"#).unwrap();
        assert!(cfg.parameters.is_object());
        assert!(cfg.aliases.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn accepted_names_include_aliases() {
        let cfg = ModelConfig::new("Opus 4.6", "suspect").with_alias("claude-opus-4-6");
        let names: Vec<&str> = cfg.accepted_names().collect();
        assert_eq!(names, vec!["Opus 4.6", "claude-opus-4-6"]);
    }

    #[test]
    fn parameter_accessors() {
        let cfg = ModelConfig::new("gpt-4o", "openai")
            .with_parameter("max_tokens", serde_json::json!(512))
            .with_parameter("temperature", serde_json::json!(0.2))
            .with_parameter("system_prompt", serde_json::json!("be terse"));
        assert_eq!(cfg.param_u64("max_tokens"), Some(512));
        assert_eq!(cfg.param_f64("temperature"), Some(0.2));
        assert_eq!(cfg.param_str("system_prompt"), Some("be terse"));
        assert_eq!(cfg.param_u64("missing"), None);
    }
}
