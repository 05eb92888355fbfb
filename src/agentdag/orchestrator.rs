//! The orchestration engine: layered, parallel, failure-isolating.
//!
//! An [`Orchestrator`] is built once per run from the agent set and its
//! collaborators (LLM client, prompt store, price table, optional event
//! handler; all injected, no global state). Construction validates the
//! dependency graph via [`DagResolver`](crate::DagResolver); an invalid graph
//! means no orchestrator.
//!
//! [`Orchestrator::run`] then drives the layers in order. Every agent in a
//! layer is spawned as its own tokio task; the layer is a hard barrier: all
//! tasks reach a terminal state before the next layer starts, and a failing
//! task never cancels its siblings. Per-agent failures (timeouts, provider
//! errors) are recorded in the context and the run continues; only a
//! prompt-load failure aborts the run, because a missing prompt is a
//! deployment bug rather than a transient fault.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentdag::{
//!     Agent, CompletionResponse, ExecutionContext, LLMClient, Orchestrator,
//!     StaticPromptStore, TokenUsage,
//! };
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyClient;
//!
//! #[async_trait]
//! impl LLMClient for MyClient {
//!     async fn invoke(
//!         &self,
//!         _system_prompt: &str,
//!         _user_message: &str,
//!         _model: &str,
//!         _max_tokens: usize,
//!     ) -> Result<CompletionResponse, Box<dyn std::error::Error + Send + Sync>> {
//!         // ... call the provider ...
//!         Ok(CompletionResponse { text: String::new(), usage: TokenUsage::new(0, 0) })
//!     }
//! }
//!
//! # async {
//! let agents = vec![
//!     Agent::new("analyst"),
//!     Agent::new("reviewer").with_dependencies(vec!["analyst"]),
//! ];
//! let prompts = StaticPromptStore::new()
//!     .with_prompt("analyst", "You are a business analyst.")
//!     .with_prompt("reviewer", "You review the team's findings.");
//!
//! let orchestrator = Orchestrator::new(agents, Arc::new(MyClient), Arc::new(prompts)).unwrap();
//! println!("{}", orchestrator.execution_plan());
//!
//! let context = Arc::new(ExecutionContext::new("Should we expand to Europe?"));
//! let context = orchestrator.run(context).await.unwrap();
//! println!("reviewer said: {:?}", context.output("reviewer"));
//! # };
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;

use crate::agentdag::agent::{Agent, AgentRuntime};
use crate::agentdag::context::{AgentMetrics, ExecutionContext, ExecutionStatus};
use crate::agentdag::dag::DagResolver;
use crate::agentdag::error::OrchestratorError;
use crate::agentdag::event::{EventHandler, ExecutionEvent};
use crate::agentdag::llm_client::LLMClient;
use crate::agentdag::pricing::PriceTable;
use crate::agentdag::prompt_store::PromptStore;

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every agent completed.
    Completed,
    /// At least one agent failed; the context still carries every committed
    /// output and metrics record.
    PartialFailure,
}

impl RunStatus {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::PartialFailure => "partial_failure",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives an agent graph through its execution layers.
pub struct Orchestrator {
    agents: HashMap<String, Arc<Agent>>,
    dag: DagResolver,
    runtime: AgentRuntime,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("dag", &self.dag)
            .finish()
    }
}

impl Orchestrator {
    /// Build an orchestrator from the agent set and its collaborators.
    ///
    /// Fails with [`DuplicateAgent`](OrchestratorError::DuplicateAgent) when
    /// two agents share a name, and with the graph-validation errors of
    /// [`DagResolver::new`] when the dependency graph is unusable. There is
    /// no partial orchestrator: an `Err` here means nothing was built.
    pub fn new(
        agents: Vec<Agent>,
        client: Arc<dyn LLMClient>,
        prompts: Arc<dyn PromptStore>,
    ) -> Result<Self, OrchestratorError> {
        let mut by_name: HashMap<String, Arc<Agent>> = HashMap::new();
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        for agent in agents {
            let name = agent.name().to_string();
            if by_name.contains_key(&name) {
                return Err(OrchestratorError::DuplicateAgent(name));
            }
            dependencies.insert(name.clone(), agent.dependencies().to_vec());
            by_name.insert(name, Arc::new(agent));
        }
        let dag = DagResolver::new(dependencies)?;
        Ok(Self {
            agents: by_name,
            dag,
            runtime: AgentRuntime::new(client, prompts),
        })
    }

    /// Replace the default price table (builder pattern).
    pub fn with_price_table(mut self, prices: PriceTable) -> Self {
        self.runtime.prices = Arc::new(prices);
        self
    }

    /// Attach a telemetry handler (builder pattern). The handler is shared
    /// with every agent task the run spawns.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.runtime.events = Some(handler);
        self
    }

    /// The validated dependency graph.
    pub fn dag(&self) -> &DagResolver {
        &self.dag
    }

    /// The execution layers, in order.
    pub fn execution_layers(&self) -> &[Vec<String>] {
        self.dag.layers()
    }

    /// Number of agents registered.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Human-readable execution plan, one line per layer.
    ///
    /// ```text
    /// Execution plan:
    ///   Layer 1 (parallel): analyst
    ///   Layer 2 (parallel): commercial, market
    /// ```
    pub fn execution_plan(&self) -> String {
        let mut lines = vec![String::from("Execution plan:")];
        for (idx, layer) in self.dag.layers().iter().enumerate() {
            lines.push(format!("  Layer {} (parallel): {}", idx + 1, layer.join(", ")));
        }
        lines.join("\n")
    }

    /// Execute the full graph against `context` and return it.
    ///
    /// Layers run in sequence; agents within a layer run concurrently and
    /// the layer only ends when every one of them has reached a terminal
    /// state. Per-agent failures are recorded in the context (empty output,
    /// `Failed` metrics) and do not stop the run. The one exception is a
    /// prompt-load failure, which aborts the run with
    /// [`PromptLoad`](OrchestratorError::PromptLoad), after the current
    /// layer's siblings have finished.
    pub async fn run(
        &self,
        context: Arc<ExecutionContext>,
    ) -> Result<Arc<ExecutionContext>, OrchestratorError> {
        context.mark_started();

        log::info!(
            "execution {} started: {} agents in {} layers",
            context.execution_id(),
            self.agents.len(),
            self.dag.layer_count()
        );
        self.emit(ExecutionEvent::ExecutionStarted {
            execution_id: context.execution_id().to_string(),
            agent_count: self.agents.len(),
            layer_count: self.dag.layer_count(),
        })
        .await;
        log::debug!("{}", self.execution_plan());
        self.emit(ExecutionEvent::ExecutionPlan {
            execution_id: context.execution_id().to_string(),
            layers: self.dag.layers().to_vec(),
        })
        .await;

        let mut failed: BTreeSet<String> = BTreeSet::new();
        for (layer_index, layer) in self.dag.layers().iter().enumerate() {
            match self.execute_layer(&context, layer, layer_index).await {
                Ok(layer_failed) => failed.extend(layer_failed),
                Err(fatal) => {
                    context.mark_completed();
                    log::error!(
                        "execution {} failed: {}",
                        context.execution_id(),
                        fatal
                    );
                    return Err(fatal);
                }
            }
        }

        context.mark_completed();

        let status = if failed.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::PartialFailure
        };
        match status {
            RunStatus::Completed => log::info!(
                "execution {} completed in {}ms ({} tokens, ${:.6})",
                context.execution_id(),
                context.total_latency_ms(),
                context.total_tokens(),
                context.total_cost_usd()
            ),
            RunStatus::PartialFailure => log::warn!(
                "execution {} completed with failures: [{}]",
                context.execution_id(),
                failed.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
        self.emit(ExecutionEvent::ExecutionCompleted {
            execution_id: context.execution_id().to_string(),
            status,
            duration_ms: context.total_latency_ms(),
            total_tokens: context.total_tokens(),
            total_cost_usd: context.total_cost_usd(),
        })
        .await;

        Ok(context)
    }

    /// Fan one layer out to tasks and wait for all of them. Returns the
    /// names of agents in this layer that recorded a failure, or the fatal
    /// error that should abort the run.
    async fn execute_layer(
        &self,
        context: &Arc<ExecutionContext>,
        layer: &[String],
        layer_index: usize,
    ) -> Result<Vec<String>, OrchestratorError> {
        log::info!(
            "layer {} started: [{}]",
            layer_index + 1,
            layer.join(", ")
        );
        self.emit(ExecutionEvent::LayerStarted {
            execution_id: context.execution_id().to_string(),
            layer_index,
            agents: layer.to_vec(),
        })
        .await;

        let layer_start = Utc::now();

        let mut names: Vec<&String> = Vec::with_capacity(layer.len());
        let mut handles = Vec::with_capacity(layer.len());
        for name in layer {
            let agent = match self.agents.get(name) {
                Some(agent) => Arc::clone(agent),
                None => {
                    debug_assert!(false, "layer references unknown agent '{}'", name);
                    continue;
                }
            };
            let task_context = Arc::clone(context);
            let task_runtime = self.runtime.clone();
            names.push(name);
            handles.push(tokio::spawn(async move {
                agent.execute(&task_context, &task_runtime).await
            }));
        }

        // The barrier: every task reaches a terminal state before any result
        // is processed, so a failure here can never cancel a sibling.
        let results = join_all(handles).await;

        let mut fatal: Option<OrchestratorError> = None;
        for (name, joined) in names.into_iter().zip(results) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if err.is_fatal() {
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                    } else {
                        // Already committed to the context by the agent.
                        log::warn!("agent '{}' recorded failure: {}", name, err);
                    }
                }
                Err(join_err) => {
                    log::error!("task for agent '{}' did not complete: {}", name, join_err);
                    if context.metrics_for(name).is_none() {
                        let mut metrics = AgentMetrics::new(name.clone());
                        metrics.status = ExecutionStatus::Failed;
                        metrics.error = Some(format!("task join error: {}", join_err));
                        context.set_agent_output(name, String::new(), metrics);
                    }
                }
            }
        }

        let layer_failed: Vec<String> = layer
            .iter()
            .filter(|name| context.status(name) == ExecutionStatus::Failed)
            .cloned()
            .collect();

        let duration_ms = Utc::now()
            .signed_duration_since(layer_start)
            .num_milliseconds();
        if layer_failed.is_empty() {
            log::info!("layer {} completed in {}ms", layer_index + 1, duration_ms);
        } else {
            log::warn!(
                "layer {} completed in {}ms with {} failure(s): [{}]",
                layer_index + 1,
                duration_ms,
                layer_failed.len(),
                layer_failed.join(", ")
            );
        }
        self.emit(ExecutionEvent::LayerCompleted {
            execution_id: context.execution_id().to_string(),
            layer_index,
            duration_ms,
            failed_agents: layer_failed.clone(),
        })
        .await;

        match fatal {
            Some(err) => Err(err),
            None => Ok(layer_failed),
        }
    }

    async fn emit(&self, event: ExecutionEvent) {
        if let Some(handler) = &self.runtime.events {
            handler.on_event(&event).await;
        }
    }
}

/// Read-only facade over a finished run.
///
/// # Example
///
/// ```
/// use agentdag::{ExecutionContext, ExecutionReport};
/// use std::sync::Arc;
///
/// let context = Arc::new(ExecutionContext::new("problem"));
/// let report = ExecutionReport::new(context);
/// assert!(report.success()); // an empty run has nothing failed
/// ```
pub struct ExecutionReport {
    context: Arc<ExecutionContext>,
}

impl ExecutionReport {
    /// Wrap a finished context.
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self { context }
    }

    /// The wrapped context.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// `Completed` when every committed metrics record is `Completed`.
    pub fn status(&self) -> RunStatus {
        if self.context.all_completed() {
            RunStatus::Completed
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Whether every agent completed.
    pub fn success(&self) -> bool {
        self.status() == RunStatus::Completed
    }

    /// Names of the agents that failed, sorted.
    pub fn failed_agents(&self) -> Vec<String> {
        self.context.failed_agents()
    }

    /// Total tokens across all agents.
    pub fn total_tokens(&self) -> usize {
        self.context.total_tokens()
    }

    /// Total dollar cost across all agents.
    pub fn total_cost_usd(&self) -> f64 {
        self.context.total_cost_usd()
    }

    /// Run wall time in milliseconds.
    pub fn total_latency_ms(&self) -> i64 {
        self.context.total_latency_ms()
    }

    /// The committed output of one agent, if any.
    pub fn output(&self, name: &str) -> Option<String> {
        self.context.output(name)
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExecutionReport({}, latency={}ms, tokens={}, cost=${:.4})",
            self.status(),
            self.total_latency_ms(),
            self.total_tokens(),
            self.total_cost_usd()
        )
    }
}
