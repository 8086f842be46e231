//! Domain-level error taxonomy for modelprobe.

/// Modelprobe domain errors.
///
/// Adapter variants are produced per probe and are folded into
/// [`ProbeFailure`](crate::domain::ProbeFailure) records by the runner; they
/// never abort a run. `Configuration` is the only variant surfaced before any
/// adapter call is made.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("adapter timed out after {timeout_ms} ms")]
    AdapterTimeout { timeout_ms: u64 },

    #[error("adapter protocol error: {0}")]
    AdapterProtocol(String),

    #[error("adapter authentication failed: {0}")]
    AdapterAuth(String),

    #[error("adapter returned HTTP {status}: {body}")]
    AdapterHttp { status: u16, body: String },

    #[error("adapter transport error: {0}")]
    AdapterTransport(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient data for model {model}")]
    InsufficientData { model: String },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("run {0} has no results yet")]
    RunIncomplete(String),

    #[error("model {model} not present in run {run_id}")]
    ModelNotInRun { run_id: String, model: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Shorthand for a [`ProbeError::Configuration`] error.
    pub fn config(msg: impl Into<String>) -> Self {
        ProbeError::Configuration(msg.into())
    }

    /// Whether this error was raised before dispatch because the request
    /// itself cannot produce evidence.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProbeError::Configuration(_))
    }
}

/// Result type for modelprobe domain operations.
pub type Result<T> = std::result::Result<T, ProbeError>;
