//! The shared, append-only record of one run.
//!
//! An [`ExecutionContext`] carries the immutable problem inputs, the output
//! text and [`AgentMetrics`] committed by each agent, and the run-level
//! timestamps. It is shared as `Arc<ExecutionContext>` across every agent
//! task in a run, so the two maps live behind `std::sync::RwLock`s: sibling
//! agents within a layer insert under distinct keys concurrently, and
//! readers see a consistent snapshot of whatever has been committed so far.
//!
//! The writer discipline is strict: **exactly one commit per agent per run**,
//! performed by that agent via [`ExecutionContext::set_agent_output`]. A
//! second commit for the same agent is a bug; debug builds assert, release
//! builds keep the first write.
//!
//! # Example
//!
//! ```
//! use agentdag::ExecutionContext;
//!
//! let context = ExecutionContext::new("Expand a bakery into online sales")
//!     .with_business_type("B2C")
//!     .with_analysis_depth("deep");
//!
//! assert!(context.output("analyst").is_none());
//! assert_eq!(context.total_tokens(), 0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Lifecycle state of one agent within a run.
///
/// `Skipped` is declared for forward compatibility but never emitted by the
/// current orchestrator: agents whose dependencies failed still run, and see
/// the failure encoded in their user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully; output committed.
    Completed,
    /// Finished with an error; output is the empty string.
    Failed,
    /// Reserved: would mark an agent deliberately not run.
    Skipped,
}

impl ExecutionStatus {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution metrics for one agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMetrics {
    /// The agent these metrics belong to.
    pub name: String,
    /// Lifecycle state.
    pub status: ExecutionStatus,
    /// When the agent began executing.
    pub start_time: Option<DateTime<Utc>>,
    /// When the agent reached a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    /// Prompt tokens billed by the provider.
    pub input_tokens: usize,
    /// Completion tokens billed by the provider.
    pub output_tokens: usize,
    /// Dollar cost derived from the run's price table.
    pub cost_usd: f64,
    /// Error text when `status` is `Failed`.
    pub error: Option<String>,
}

impl AgentMetrics {
    /// A fresh `Pending` record with zeroed counters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ExecutionStatus::Pending,
            start_time: None,
            end_time: None,
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            error: None,
        }
    }

    /// Input plus output tokens.
    pub fn total_tokens(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    /// Wall time between start and end in milliseconds, or 0 when either
    /// timestamp is missing.
    pub fn duration_ms(&self) -> i64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.signed_duration_since(start).num_milliseconds(),
            _ => 0,
        }
    }
}

/// Shared state for one orchestration run.
///
/// Constructed by the caller with the problem inputs, threaded through
/// [`Orchestrator::run`](crate::Orchestrator::run), and consumed afterwards
/// for outputs, per-agent metrics, and aggregate totals.
pub struct ExecutionContext {
    execution_id: String,
    problem_description: String,
    business_type: String,
    analysis_depth: String,
    created_at: DateTime<Utc>,
    outputs: RwLock<HashMap<String, String>>,
    metrics: RwLock<HashMap<String, AgentMetrics>>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    completed_at: RwLock<Option<DateTime<Utc>>>,
}

impl ExecutionContext {
    /// Create a context for one run. The execution id defaults to a fresh
    /// UUID v4, the business type to `"B2B"`, and the analysis depth to
    /// `"standard"`.
    pub fn new(problem_description: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            problem_description: problem_description.into(),
            business_type: String::from("B2B"),
            analysis_depth: String::from("standard"),
            created_at: Utc::now(),
            outputs: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            started_at: RwLock::new(None),
            completed_at: RwLock::new(None),
        }
    }

    /// Override the generated execution id (builder pattern).
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    /// Set the business type input (builder pattern).
    pub fn with_business_type(mut self, business_type: impl Into<String>) -> Self {
        self.business_type = business_type.into();
        self
    }

    /// Set the analysis depth input (builder pattern).
    pub fn with_analysis_depth(mut self, analysis_depth: impl Into<String>) -> Self {
        self.analysis_depth = analysis_depth.into();
        self
    }

    /// Opaque identifier of this run.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// The problem statement handed to every agent.
    pub fn problem_description(&self) -> &str {
        &self.problem_description
    }

    /// The business type input.
    pub fn business_type(&self) -> &str {
        &self.business_type
    }

    /// The analysis depth input.
    pub fn analysis_depth(&self) -> &str {
        &self.analysis_depth
    }

    /// When this context was constructed.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the run began, once the orchestrator has stamped it.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the run finished, once the orchestrator has stamped it.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        *self.completed_at.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&self) {
        *self.completed_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    /// Commit an agent's output and metrics. The single write this agent
    /// gets to make in this run.
    ///
    /// A repeated commit for the same agent asserts in debug builds; in
    /// release builds the first write wins and the late write is dropped.
    pub fn set_agent_output(&self, name: &str, output: String, metrics: AgentMetrics) {
        {
            let mut outputs = self.outputs.write().unwrap_or_else(PoisonError::into_inner);
            debug_assert!(
                !outputs.contains_key(name),
                "output for agent '{}' committed twice",
                name
            );
            outputs.entry(name.to_string()).or_insert(output);
        }
        let mut all = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(
            !all.contains_key(name),
            "metrics for agent '{}' committed twice",
            name
        );
        all.entry(name.to_string()).or_insert(metrics);
    }

    /// The committed output of an agent, or `None` when nothing has been
    /// committed under that name. A failed agent's committed output is the
    /// empty string.
    pub fn output(&self, name: &str) -> Option<String> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The status of an agent; `Pending` when no metrics have been committed.
    pub fn status(&self, name: &str) -> ExecutionStatus {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|m| m.status)
            .unwrap_or(ExecutionStatus::Pending)
    }

    /// The committed metrics of an agent, if any.
    pub fn metrics_for(&self, name: &str) -> Option<AgentMetrics> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Snapshot of every committed output.
    pub fn outputs_snapshot(&self) -> HashMap<String, String> {
        self.outputs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of every committed metrics record.
    pub fn metrics_snapshot(&self) -> HashMap<String, AgentMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of agents whose committed status is `Failed`, sorted.
    pub fn failed_agents(&self) -> Vec<String> {
        let mut failed: Vec<String> = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| m.status == ExecutionStatus::Failed)
            .map(|m| m.name.clone())
            .collect();
        failed.sort();
        failed
    }

    /// Whether every committed metrics record is `Completed`. Vacuously true
    /// for an empty run.
    pub fn all_completed(&self) -> bool {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .all(|m| m.status == ExecutionStatus::Completed)
    }

    /// Total tokens across all committed metrics.
    pub fn total_tokens(&self) -> usize {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|m| m.total_tokens())
            .sum()
    }

    /// Total dollar cost across all committed metrics.
    pub fn total_cost_usd(&self) -> f64 {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|m| m.cost_usd)
            .sum()
    }

    /// Wall time of the run in milliseconds, or 0 until both run-level
    /// timestamps have been stamped.
    pub fn total_latency_ms(&self) -> i64 {
        match (self.started_at(), self.completed_at()) {
            (Some(started), Some(completed)) => {
                completed.signed_duration_since(started).num_milliseconds()
            }
            _ => 0,
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("business_type", &self.business_type)
            .field("analysis_depth", &self.analysis_depth)
            .field("outputs", &self.outputs_snapshot().len())
            .field("failed", &self.failed_agents())
            .finish()
    }
}
