// src/lib.rs

// Import the top-level `agentdag` module.
pub mod agentdag;

// Re-exporting key items for easier external access.
pub use agentdag::agent::{Agent, AgentRuntime, MessageBuilder};
pub use agentdag::context::{AgentMetrics, ExecutionContext, ExecutionStatus};
pub use agentdag::dag::DagResolver;
pub use agentdag::error::OrchestratorError;
pub use agentdag::event::{EventHandler, ExecutionEvent};
pub use agentdag::llm_client::{CompletionResponse, LLMClient, TokenUsage};
pub use agentdag::orchestrator::{ExecutionReport, Orchestrator, RunStatus};
pub use agentdag::pricing::{ModelPrice, PriceTable};
pub use agentdag::prompt_store::{MarkdownPromptStore, PromptStore, StaticPromptStore};
pub use agentdag::team::business_analysis_team;
