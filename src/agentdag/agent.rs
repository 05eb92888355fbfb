//! The agent: one bounded LLM invocation inside a run.
//!
//! An [`Agent`] is a static descriptor (name, dependencies, model,
//! completion budget, deadline, prompt reference) plus a message-builder
//! function that projects prior outputs from the shared
//! [`ExecutionContext`](crate::ExecutionContext) into the user message. There
//! is deliberately no trait hierarchy of agent kinds: every specialization
//! this crate has needed fits in the builder function, so one concrete struct
//! does the job.
//!
//! [`Agent::execute`] performs the whole invocation: load the system prompt
//! (cached per instance after the first load), assemble the user message,
//! call the LLM under the agent's own deadline, and commit output plus
//! [`AgentMetrics`](crate::AgentMetrics) into the context exactly once,
//! success or failure.
//!
//! Agents whose dependencies failed still run. The failure is spelled out in
//! the context block appended to their user message, so the model can degrade
//! gracefully instead of the pipeline silently skipping work.
//!
//! # Example
//!
//! ```
//! use agentdag::Agent;
//! use std::time::Duration;
//!
//! let financial = Agent::new("financial")
//!     .with_dependencies(vec!["analyst", "commercial"])
//!     .with_model("claude-3-haiku-20240307")
//!     .with_max_tokens(2048)
//!     .with_timeout(Duration::from_secs(45))
//!     .with_message_builder(|ctx| {
//!         let analysis = ctx
//!             .output("analyst")
//!             .filter(|o| !o.is_empty())
//!             .unwrap_or_else(|| "Analysis not available".to_string());
//!         format!(
//!             "Based on this analysis:\n\n{}\n\nAssess the financials of: {}",
//!             analysis,
//!             ctx.problem_description()
//!         )
//!     });
//!
//! assert_eq!(financial.name(), "financial");
//! assert_eq!(financial.dependencies(), ["analyst", "commercial"]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;

use crate::agentdag::context::{AgentMetrics, ExecutionContext, ExecutionStatus};
use crate::agentdag::error::OrchestratorError;
use crate::agentdag::event::{EventHandler, ExecutionEvent};
use crate::agentdag::llm_client::LLMClient;
use crate::agentdag::pricing::PriceTable;
use crate::agentdag::prompt_store::PromptStore;

/// Projects the shared context into an agent's user message. Must be a pure
/// function of the context snapshot it is handed.
pub type MessageBuilder = Arc<dyn Fn(&ExecutionContext) -> String + Send + Sync>;

/// Shared collaborators handed to every agent invocation by the
/// orchestrator: the LLM client, the prompt store, the price table, and an
/// optional telemetry handler. Cheap to clone across tasks.
#[derive(Clone)]
pub struct AgentRuntime {
    /// The remote model service. One attempt per agent per run.
    pub client: Arc<dyn LLMClient>,
    /// Source of system prompts.
    pub prompts: Arc<dyn PromptStore>,
    /// Cost derivation for metrics.
    pub prices: Arc<PriceTable>,
    /// Telemetry sink, when attached.
    pub events: Option<Arc<dyn EventHandler>>,
}

impl AgentRuntime {
    /// Bundle a client and prompt store with the default price table and no
    /// event handler.
    pub fn new(client: Arc<dyn LLMClient>, prompts: Arc<dyn PromptStore>) -> Self {
        Self {
            client,
            prompts,
            prices: Arc::new(PriceTable::default()),
            events: None,
        }
    }

    async fn emit(&self, event: ExecutionEvent) {
        if let Some(handler) = &self.events {
            handler.on_event(&event).await;
        }
    }
}

fn default_user_message(context: &ExecutionContext) -> String {
    format!("Problem: {}", context.problem_description())
}

/// One unit of work in the dependency graph.
pub struct Agent {
    name: String,
    dependencies: Vec<String>,
    model: String,
    max_tokens: usize,
    timeout: Duration,
    prompt_ref: String,
    prompt_variables: HashMap<String, String>,
    message_builder: MessageBuilder,
    prompt_cache: RwLock<Option<String>>,
}

impl Agent {
    /// Create an agent with defaults: no dependencies,
    /// `claude-3-haiku-20240307`, 1024 completion tokens, a 30 second
    /// deadline, and a prompt reference equal to the agent name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prompt_ref: name.clone(),
            name,
            dependencies: Vec::new(),
            model: String::from("claude-3-haiku-20240307"),
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
            prompt_variables: HashMap::new(),
            message_builder: Arc::new(default_user_message),
            prompt_cache: RwLock::new(None),
        }
    }

    /// Declare the agents this one needs, in the order their outputs should
    /// appear in the context block (builder pattern).
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(|d| d.into()).collect();
        self
    }

    /// Select the model identifier passed to the LLM client (builder pattern).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Cap the completion size (builder pattern).
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-invocation deadline (builder pattern). Expiry fails only
    /// this agent; siblings in the same layer are not cancelled.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the prompt reference (builder pattern). Defaults to the
    /// agent name.
    pub fn with_prompt_ref(mut self, prompt_ref: impl Into<String>) -> Self {
        self.prompt_ref = prompt_ref.into();
        self
    }

    /// Add a `{key}` substitution applied when the prompt is loaded
    /// (builder pattern).
    pub fn with_prompt_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.prompt_variables.insert(key.into(), value.into());
        self
    }

    /// Replace the user-message builder (builder pattern). The default
    /// renders `"Problem: <problem_description>"`.
    pub fn with_message_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&ExecutionContext) -> String + Send + Sync + 'static,
    {
        self.message_builder = Arc::new(builder);
        self
    }

    /// Unique name of this agent within a run.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The completion-token budget.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// The per-invocation deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The deadline in seconds, as reported in errors and events.
    pub fn timeout_seconds(&self) -> f64 {
        self.timeout.as_secs_f64()
    }

    /// The opaque prompt reference.
    pub fn prompt_ref(&self) -> &str {
        &self.prompt_ref
    }

    /// Render the user message: the builder's projection plus the context
    /// block describing each dependency.
    pub fn build_user_message(&self, context: &ExecutionContext) -> String {
        let mut message = (self.message_builder)(context);
        let block = self.context_block(context);
        if !block.is_empty() {
            message.push_str(&block);
        }
        message
    }

    /// The context block: for each dependency in declaration order, either
    /// its output or a marker recording its status. A failed dependency's
    /// committed output is empty, so it falls through to the status marker.
    fn context_block(&self, context: &ExecutionContext) -> String {
        let mut parts = String::new();
        for dep in &self.dependencies {
            match context.output(dep) {
                Some(output) if !output.is_empty() => {
                    parts.push_str(&format!("\n=== Analysis from {} ===\n{}", dep, output));
                }
                _ => {
                    parts.push_str(&format!(
                        "\n=== {} ===\nStatus: {}",
                        dep,
                        context.status(dep)
                    ));
                }
            }
        }
        parts
    }

    async fn load_prompt(
        &self,
        runtime: &AgentRuntime,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let cached = self
            .prompt_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(prompt) = cached {
            return Ok(prompt);
        }
        let loaded = runtime
            .prompts
            .load(&self.prompt_ref, &self.prompt_variables)
            .await?;
        *self
            .prompt_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Run this agent against the shared context.
    ///
    /// On success the agent's output and `Completed` metrics are committed to
    /// the context and `Ok(())` is returned. On timeout or invocation
    /// failure, empty output and `Failed` metrics are committed and the
    /// matching [`OrchestratorError`] is returned; the orchestrator records
    /// it without aborting the run. A prompt-load failure also commits
    /// `Failed` metrics but returns
    /// [`PromptLoad`](OrchestratorError::PromptLoad), which aborts the run.
    pub async fn execute(
        &self,
        context: &ExecutionContext,
        runtime: &AgentRuntime,
    ) -> Result<(), OrchestratorError> {
        let mut metrics = AgentMetrics::new(self.name.as_str());
        metrics.status = ExecutionStatus::Running;
        metrics.start_time = Some(Utc::now());

        log::info!(
            "agent '{}' started (model {}, timeout {}s)",
            self.name,
            self.model,
            self.timeout_seconds()
        );
        runtime
            .emit(ExecutionEvent::AgentStarted {
                execution_id: context.execution_id().to_string(),
                agent_name: self.name.clone(),
                model: self.model.clone(),
                timeout_seconds: self.timeout_seconds(),
            })
            .await;

        let system_prompt = match self.load_prompt(runtime).await {
            Ok(prompt) => prompt,
            Err(cause) => {
                log::error!(
                    "agent '{}' could not load prompt '{}': {}",
                    self.name,
                    self.prompt_ref,
                    cause
                );
                metrics.status = ExecutionStatus::Failed;
                metrics.end_time = Some(Utc::now());
                metrics.error = Some(format!("prompt load failed: {}", cause));
                let duration_ms = metrics.duration_ms();
                runtime
                    .emit(ExecutionEvent::AgentFailed {
                        execution_id: context.execution_id().to_string(),
                        agent_name: self.name.clone(),
                        duration_ms,
                        error_kind: String::from("prompt_load"),
                        error_message: cause.to_string(),
                    })
                    .await;
                context.set_agent_output(&self.name, String::new(), metrics);
                return Err(OrchestratorError::PromptLoad {
                    agent: self.name.clone(),
                    reference: self.prompt_ref.clone(),
                });
            }
        };

        let user_message = self.build_user_message(context);

        let call = runtime
            .client
            .invoke(&system_prompt, &user_message, &self.model, self.max_tokens);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                metrics.status = ExecutionStatus::Completed;
                metrics.end_time = Some(Utc::now());
                metrics.input_tokens = response.usage.input_tokens;
                metrics.output_tokens = response.usage.output_tokens;
                metrics.cost_usd = runtime.prices.cost_usd(
                    &self.model,
                    response.usage.input_tokens,
                    response.usage.output_tokens,
                );

                log::info!(
                    "agent '{}' completed in {}ms ({} tokens, ${:.6})",
                    self.name,
                    metrics.duration_ms(),
                    metrics.total_tokens(),
                    metrics.cost_usd
                );
                runtime
                    .emit(ExecutionEvent::AgentCompleted {
                        execution_id: context.execution_id().to_string(),
                        agent_name: self.name.clone(),
                        duration_ms: metrics.duration_ms(),
                        input_tokens: metrics.input_tokens,
                        output_tokens: metrics.output_tokens,
                        cost_usd: metrics.cost_usd,
                    })
                    .await;

                context.set_agent_output(&self.name, response.text, metrics);
                Ok(())
            }
            Ok(Err(cause)) => {
                metrics.status = ExecutionStatus::Failed;
                metrics.end_time = Some(Utc::now());
                metrics.error = Some(cause.to_string());

                log::error!("agent '{}' failed: {}", self.name, cause);
                runtime
                    .emit(ExecutionEvent::AgentFailed {
                        execution_id: context.execution_id().to_string(),
                        agent_name: self.name.clone(),
                        duration_ms: metrics.duration_ms(),
                        error_kind: String::from("agent_execution"),
                        error_message: cause.to_string(),
                    })
                    .await;

                context.set_agent_output(&self.name, String::new(), metrics);
                Err(OrchestratorError::AgentExecution {
                    agent: self.name.clone(),
                    cause: cause.to_string(),
                })
            }
            Err(_elapsed) => {
                let seconds = self.timeout_seconds();
                metrics.status = ExecutionStatus::Failed;
                metrics.end_time = Some(Utc::now());
                metrics.error = Some(format!("timeout after {}s", seconds));

                log::error!("agent '{}' timed out after {}s", self.name, seconds);
                runtime
                    .emit(ExecutionEvent::AgentTimeout {
                        execution_id: context.execution_id().to_string(),
                        agent_name: self.name.clone(),
                        timeout_seconds: seconds,
                    })
                    .await;

                context.set_agent_output(&self.name, String::new(), metrics);
                Err(OrchestratorError::Timeout {
                    agent: self.name.clone(),
                    seconds,
                })
            }
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("prompt_ref", &self.prompt_ref)
            .finish()
    }
}
