//! HTTP model adapters for modelprobe.
//!
//! Two wire protocols are supported, both behind the core
//! [`ModelAdapter`](modelprobe_core::ModelAdapter) trait:
//!
//! - [`OpenAiAdapter`]: Chat Completions (`/chat/completions`), also used for
//!   generic OpenAI-compatible gateways and local servers
//! - [`AnthropicAdapter`]: Messages API (`/v1/messages`), also the default for
//!   suspect endpoints
//!
//! [`HttpAdapterFactory`] selects between them from configuration alone.

pub mod anthropic;
mod error;
pub mod factory;
pub mod http;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use factory::HttpAdapterFactory;
pub use openai::OpenAiAdapter;
