use std::sync::Arc;

use modelprobe_core::{
    AdapterFactory, Credentials, ModelAdapter, ModelConfig, ProbeError, Protocol, Provider, Result,
};
use reqwest::{Client, Url};
use tracing::debug;

use crate::anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_BASE_URL};
use crate::http::build_client;
use crate::openai::{OpenAiAdapter, DEFAULT_OPENAI_BASE_URL};

/// Picks the HTTP adapter for a model config.
///
/// The protocol comes from the config (or its provider's default). API key
/// and base URL come from the config when set, otherwise from
/// [`Credentials`]; the base URL finally falls back to the protocol's public
/// endpoint, except for generic providers which must name one.
#[derive(Debug, Clone)]
pub struct HttpAdapterFactory {
    client: Client,
    credentials: Credentials,
}

impl HttpAdapterFactory {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            credentials,
        })
    }

    fn api_key(&self, config: &ModelConfig, provider: Provider) -> Option<String> {
        non_empty(config.api_key.as_deref())
            .or_else(|| non_empty(self.credentials.api_key_for(provider)))
            .map(str::to_string)
    }

    fn base_url(
        &self,
        config: &ModelConfig,
        provider: Provider,
        protocol: Protocol,
    ) -> Result<String> {
        let configured = non_empty(config.api_base_url.as_deref())
            .or_else(|| non_empty(self.credentials.base_url_for(provider)));
        let url = match (configured, provider, protocol) {
            (Some(url), _, _) => url,
            (None, Provider::Generic, _) => {
                return Err(ProbeError::config(format!(
                    "api_base_url is required for generic model '{}'",
                    config.model_name
                )))
            }
            (None, _, Protocol::OpenAi) => DEFAULT_OPENAI_BASE_URL,
            (None, _, Protocol::Anthropic) => DEFAULT_ANTHROPIC_BASE_URL,
        };
        Url::parse(url).map_err(|e| {
            ProbeError::config(format!(
                "invalid api_base_url '{url}' for model '{}': {e}",
                config.model_name
            ))
        })?;
        Ok(url.to_string())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AdapterFactory for HttpAdapterFactory {
    fn adapter_for(&self, config: &ModelConfig) -> Result<Arc<dyn ModelAdapter>> {
        let provider = config.provider_kind()?;
        let protocol = config.resolve_protocol()?;
        let base_url = self.base_url(config, provider, protocol)?;
        let api_key = self.api_key(config, provider);
        debug!(
            model = %config.model_name,
            provider = %provider,
            protocol = %protocol,
            base_url = %base_url,
            has_key = api_key.is_some(),
            "adapter resolved"
        );

        let adapter: Arc<dyn ModelAdapter> = match protocol {
            Protocol::OpenAi => Arc::new(OpenAiAdapter::new(self.client.clone(), base_url, api_key)),
            Protocol::Anthropic => {
                Arc::new(AnthropicAdapter::new(self.client.clone(), base_url, api_key))
            }
        };
        Ok(adapter)
    }
}
