//! Error types for graph validation and agent execution.
//!
//! A single public enum, [`OrchestratorError`], covers every failure the core
//! can report. Construction-time errors ([`CircularDependency`](OrchestratorError::CircularDependency),
//! [`MissingDependency`](OrchestratorError::MissingDependency),
//! [`DuplicateAgent`](OrchestratorError::DuplicateAgent)) mean no
//! [`Orchestrator`](crate::Orchestrator) is built at all. At run time only
//! [`PromptLoad`](OrchestratorError::PromptLoad) escapes
//! [`Orchestrator::run`](crate::Orchestrator::run); the per-agent variants
//! ([`Timeout`](OrchestratorError::Timeout),
//! [`AgentExecution`](OrchestratorError::AgentExecution)) are captured in the
//! failing agent's [`AgentMetrics`](crate::AgentMetrics) and never abort the run.

use std::error::Error;
use std::fmt;

/// Errors produced while validating an agent graph or executing a run.
///
/// # Examples
///
/// ```
/// use agentdag::OrchestratorError;
///
/// let err = OrchestratorError::MissingDependency {
///     agent: "financial".to_string(),
///     missing: "analyst".to_string(),
/// };
/// assert_eq!(
///     err.to_string(),
///     "agent 'financial' depends on unknown agent 'analyst'"
/// );
/// ```
#[derive(Debug, Clone)]
pub enum OrchestratorError {
    /// The dependency graph contains a cycle. The payload is the ordered list
    /// of agent names forming the cycle, with the repeated node appended so
    /// the loop is explicit (e.g. `["a", "b", "a"]`).
    CircularDependency(Vec<String>),

    /// An agent lists a dependency that does not exist in the agent set.
    MissingDependency {
        /// The agent declaring the dependency.
        agent: String,
        /// The name that could not be resolved.
        missing: String,
    },

    /// Two agents were registered under the same name.
    DuplicateAgent(String),

    /// An agent's system prompt could not be loaded. A missing prompt is a
    /// deployment bug, not a transient failure, so this is fatal to the
    /// whole run.
    PromptLoad {
        /// The agent whose prompt failed to load.
        agent: String,
        /// The opaque reference handed to the prompt store.
        reference: String,
    },

    /// An agent's LLM call did not complete within its deadline. Isolated to
    /// the one agent; siblings keep running.
    Timeout {
        /// The agent that timed out.
        agent: String,
        /// The configured deadline, in seconds.
        seconds: f64,
    },

    /// An agent's LLM call failed for any reason other than a timeout
    /// (provider error, network failure, task panic). Isolated to the one
    /// agent.
    AgentExecution {
        /// The agent that failed.
        agent: String,
        /// Text of the underlying failure.
        cause: String,
    },
}

impl OrchestratorError {
    /// Whether the error aborts the run instead of being recorded against a
    /// single agent.
    pub fn is_fatal(&self) -> bool {
        match self {
            OrchestratorError::CircularDependency(_)
            | OrchestratorError::MissingDependency { .. }
            | OrchestratorError::DuplicateAgent(_)
            | OrchestratorError::PromptLoad { .. } => true,
            OrchestratorError::Timeout { .. } | OrchestratorError::AgentExecution { .. } => false,
        }
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::CircularDependency(cycle) => {
                write!(f, "circular dependency: {}", cycle.join(" -> "))
            }
            OrchestratorError::MissingDependency { agent, missing } => {
                write!(f, "agent '{}' depends on unknown agent '{}'", agent, missing)
            }
            OrchestratorError::DuplicateAgent(name) => {
                write!(f, "agent '{}' registered more than once", name)
            }
            OrchestratorError::PromptLoad { agent, reference } => {
                write!(f, "failed to load prompt '{}' for agent '{}'", reference, agent)
            }
            OrchestratorError::Timeout { agent, seconds } => {
                write!(f, "agent '{}' timed out after {}s", agent, seconds)
            }
            OrchestratorError::AgentExecution { agent, cause } => {
                write!(f, "agent '{}' failed: {}", agent, cause)
            }
        }
    }
}

impl Error for OrchestratorError {}
