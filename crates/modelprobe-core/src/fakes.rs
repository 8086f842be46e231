//! Scripted in-memory adapters (testing and demos).
//!
//! Provides `ScriptedAdapter` and `ScriptedFactory`, which satisfy the adapter
//! contracts without any network access. Replies are keyed by prompt text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{AdapterFactory, Completion, ModelAdapter};
use crate::domain::{FailureKind, ModelConfig, ProbeError, Result, TokenUsage};

/// What a scripted adapter does for one prompt.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Return the adapter error matching this failure kind.
    Fail(FailureKind),
    /// Never return; the runner's timeout has to fire.
    Hang,
    /// Panic inside the adapter call.
    Panic,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Adapter that answers from a script. Clones share call counters.
#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    default: Reply,
    replies: HashMap<String, Reply>,
    delay: Duration,
    latency_ms: Option<f64>,
    reported_model_id: Option<String>,
    token_usage: Option<TokenUsage>,
    counters: Arc<Counters>,
}

impl ScriptedAdapter {
    /// Adapter that answers every prompt with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_default(Reply::Text(text.into()))
    }

    /// Adapter that fails every prompt with `kind`.
    pub fn failing(kind: FailureKind) -> Self {
        Self::with_default(Reply::Fail(kind))
    }

    pub fn with_default(default: Reply) -> Self {
        Self {
            default,
            replies: HashMap::new(),
            delay: Duration::ZERO,
            latency_ms: None,
            reported_model_id: None,
            token_usage: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Override the reply for one exact prompt text.
    pub fn with_reply(mut self, prompt: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(prompt.into(), reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Latency reported on every completion instead of wall time.
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_reported_model(mut self, model_id: impl Into<String>) -> Self {
        self.reported_model_id = Some(model_id.into());
        self
    }

    pub fn with_token_usage(mut self, prompt: u64, completion: u64) -> Self {
        self.token_usage = Some(TokenUsage { prompt, completion });
        self
    }

    /// Number of `complete` calls received.
    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `complete` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        self.replies
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn scripted_error(kind: FailureKind) -> ProbeError {
    match kind {
        FailureKind::Timeout => ProbeError::AdapterTimeout { timeout_ms: 0 },
        FailureKind::Protocol => ProbeError::AdapterProtocol("scripted protocol error".into()),
        FailureKind::Auth => ProbeError::AdapterAuth("scripted auth error".into()),
        FailureKind::Http => ProbeError::AdapterHttp {
            status: 500,
            body: "scripted server error".into(),
        },
        FailureKind::Transport | FailureKind::Cancelled | FailureKind::Internal => {
            ProbeError::AdapterTransport("scripted transport error".into())
        }
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    async fn complete(
        &self,
        prompt: &str,
        _config: &ModelConfig,
        _timeout: Duration,
    ) -> Result<Completion> {
        let _guard = InFlight::enter(&self.counters);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.reply_for(prompt) {
            Reply::Text(text) => Ok(Completion {
                text,
                latency_ms: self.latency_ms,
                token_usage: self.token_usage,
                reported_model_id: self.reported_model_id.clone(),
            }),
            Reply::Fail(kind) => Err(scripted_error(kind)),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(ProbeError::AdapterTimeout { timeout_ms: 0 })
            }
            Reply::Panic => panic!("scripted adapter panic for prompt {prompt:?}"),
        }
    }
}

/// Factory resolving adapters by model name.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    adapters: HashMap<String, ScriptedAdapter>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model_name: impl Into<String>, adapter: ScriptedAdapter) -> Self {
        self.adapters.insert(model_name.into(), adapter);
        self
    }
}

impl AdapterFactory for ScriptedFactory {
    fn adapter_for(&self, config: &ModelConfig) -> Result<Arc<dyn ModelAdapter>> {
        self.adapters
            .get(&config.model_name)
            .map(|a| Arc::new(a.clone()) as Arc<dyn ModelAdapter>)
            .ok_or_else(|| {
                ProbeError::config(format!("no scripted adapter for '{}'", config.model_name))
            })
    }
}
