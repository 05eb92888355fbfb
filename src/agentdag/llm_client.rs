//! Provider-agnostic interface to a remote language-model service.
//!
//! The core never talks to a vendor SDK directly. Everything it needs from a
//! provider is the single [`LLMClient::invoke`] call: one system prompt, one
//! user message, a model identifier, and a completion budget go in; the
//! generated text plus token accounting come back. Deadlines are enforced by the
//! caller (each [`Agent`](crate::Agent) wraps the call in its own timeout),
//! and there are no retries: one attempt per agent per run.
//!
//! Implementations **must** be thread-safe (`Send + Sync`); a run fans each
//! execution layer out across tokio tasks that share one client.
//!
//! # Example
//!
//! ```
//! use agentdag::{CompletionResponse, LLMClient, TokenUsage};
//! use async_trait::async_trait;
//!
//! struct EchoClient;
//!
//! #[async_trait]
//! impl LLMClient for EchoClient {
//!     async fn invoke(
//!         &self,
//!         _system_prompt: &str,
//!         user_message: &str,
//!         _model: &str,
//!         _max_tokens: usize,
//!     ) -> Result<CompletionResponse, Box<dyn std::error::Error + Send + Sync>> {
//!         Ok(CompletionResponse {
//!             text: user_message.to_string(),
//!             usage: TokenUsage::new(1, 1),
//!         })
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::error::Error;

/// How many tokens were spent on prompt vs. completion?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    /// Number of prompt/input tokens billed by the provider.
    pub input_tokens: usize,
    /// Number of generated/output tokens billed by the provider.
    pub output_tokens: usize,
    /// Convenience total equal to `input_tokens + output_tokens`.
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Build a usage record from input/output counts; the total is derived.
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// The result of one successful LLM invocation.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,
    /// Token accounting reported by the provider.
    pub usage: TokenUsage,
}

/// Trait defining the interface to a remote LLM service.
///
/// Semantics: [`invoke`](LLMClient::invoke) returns exactly once, with a
/// result or with a provider failure (rate limit, invalid request, network).
/// Timeouts are imposed from outside via `tokio::time::timeout`, so an
/// implementation need not carry its own deadline handling.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send one request to the model and await the completion.
    async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
        model: &str,
        max_tokens: usize,
    ) -> Result<CompletionResponse, Box<dyn Error + Send + Sync>>;
}
