//! Run telemetry events.
//!
//! The orchestrator and its agents emit [`ExecutionEvent`]s at every
//! lifecycle boundary: run start, plan, layer start/end, agent start,
//! completion, failure, timeout, and run end. Implement [`EventHandler`] and
//! attach it via
//! [`Orchestrator::with_event_handler`](crate::Orchestrator::with_event_handler)
//! to forward the stream to whatever sink the surrounding service uses,
//! such as structured logs or a metrics pipeline.
//!
//! Events serialize with an `"event"` tag so each one becomes a flat,
//! self-describing JSON record:
//!
//! ```
//! use agentdag::ExecutionEvent;
//!
//! let event = ExecutionEvent::AgentTimeout {
//!     execution_id: "run-1".to_string(),
//!     agent_name: "market".to_string(),
//!     timeout_seconds: 30.0,
//! };
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json["event"], "agent_timeout");
//! assert_eq!(json["agent_name"], "market");
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::agentdag::orchestrator::RunStatus;

/// Events emitted during one orchestration run.
///
/// Every variant carries the `execution_id` so handlers shared across
/// concurrent runs can attribute events without external state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// The run has begun; fired before any layer starts.
    ExecutionStarted {
        execution_id: String,
        agent_count: usize,
        layer_count: usize,
    },

    /// The resolved layer plan, innermost lists in execution order.
    ExecutionPlan {
        execution_id: String,
        layers: Vec<Vec<String>>,
    },

    /// A layer's tasks are about to be spawned.
    LayerStarted {
        execution_id: String,
        layer_index: usize,
        agents: Vec<String>,
    },

    /// One agent has begun executing.
    AgentStarted {
        execution_id: String,
        agent_name: String,
        model: String,
        timeout_seconds: f64,
    },

    /// One agent finished successfully.
    AgentCompleted {
        execution_id: String,
        agent_name: String,
        duration_ms: i64,
        input_tokens: usize,
        output_tokens: usize,
        cost_usd: f64,
    },

    /// One agent failed (anything other than a timeout).
    AgentFailed {
        execution_id: String,
        agent_name: String,
        duration_ms: i64,
        error_kind: String,
        error_message: String,
    },

    /// One agent's LLM call exceeded its deadline.
    AgentTimeout {
        execution_id: String,
        agent_name: String,
        timeout_seconds: f64,
    },

    /// All tasks in a layer reached a terminal state.
    LayerCompleted {
        execution_id: String,
        layer_index: usize,
        duration_ms: i64,
        failed_agents: Vec<String>,
    },

    /// The run finished and the context was stamped.
    ExecutionCompleted {
        execution_id: String,
        status: RunStatus,
        duration_ms: i64,
        total_tokens: usize,
        total_cost_usd: f64,
    },
}

impl ExecutionEvent {
    /// The event as a flat JSON object, ready for a structured log line.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Callback interface for run telemetry.
///
/// The single method has a default no-op body, so a handler only has to
/// match the events it cares about. Handlers are shared as
/// `Arc<dyn EventHandler>` across all agent tasks of a run and must therefore
/// be `Send + Sync`.
///
/// # Example
///
/// ```
/// use agentdag::{EventHandler, ExecutionEvent};
/// use async_trait::async_trait;
///
/// struct JsonLines;
///
/// #[async_trait]
/// impl EventHandler for JsonLines {
///     async fn on_event(&self, event: &ExecutionEvent) {
///         if let Ok(line) = serde_json::to_string(event) {
///             println!("{}", line);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Receive one event. Invoked inline from the emitting task; keep it
    /// cheap or hand the event off to a channel.
    async fn on_event(&self, _event: &ExecutionEvent) {}
}
