use agentdag::{
    Agent, CompletionResponse, EventHandler, ExecutionContext, ExecutionEvent, ExecutionReport,
    ExecutionStatus, LLMClient, Orchestrator, OrchestratorError, PriceTable, RunStatus,
    StaticPromptStore, TokenUsage,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Responds per model identifier (tests give each agent its own model name),
/// optionally stalling one model past any reasonable deadline, and capturing
/// every user message it receives.
struct ScriptedClient {
    responses: HashMap<String, String>,
    stall: Option<String>,
    captured: Mutex<HashMap<String, String>>,
}

impl ScriptedClient {
    fn new(responses: &[(&str, &str)]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|(model, text)| (model.to_string(), text.to_string()))
                .collect(),
            stall: None,
            captured: Mutex::new(HashMap::new()),
        }
    }

    fn with_stall(mut self, model: &str) -> Self {
        self.stall = Some(model.to_string());
        self
    }

    fn captured_message(&self, model: &str) -> Option<String> {
        self.captured.lock().unwrap().get(model).cloned()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn invoke(
        &self,
        _system_prompt: &str,
        user_message: &str,
        model: &str,
        _max_tokens: usize,
    ) -> Result<CompletionResponse, Box<dyn std::error::Error + Send + Sync>> {
        self.captured
            .lock()
            .unwrap()
            .insert(model.to_string(), user_message.to_string());

        if self.stall.as_deref() == Some(model) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        match self.responses.get(model) {
            Some(text) => Ok(CompletionResponse {
                text: text.clone(),
                usage: TokenUsage::new(10, 20),
            }),
            None => Err(format!("no scripted response for model '{}'", model).into()),
        }
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ExecutionEvent>>,
}

#[async_trait]
impl EventHandler for Recorder {
    async fn on_event(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn prompts_for(names: &[&str]) -> Arc<StaticPromptStore> {
    let mut store = StaticPromptStore::new();
    for name in names {
        store = store.with_prompt(*name, format!("You are the {} specialist.", name));
    }
    Arc::new(store)
}

/// One model row priced so the scripted (10, 20) usage costs exactly $0.001.
fn stub_prices(models: &[&str]) -> PriceTable {
    let mut table = PriceTable::empty();
    for model in models {
        table = table.with_model(*model, 0.04, 0.03);
    }
    table
}

#[tokio::test]
async fn linear_chain_all_succeed() {
    init_logging();
    let client = Arc::new(ScriptedClient::new(&[("a", "A"), ("b", "B"), ("c", "C")]));
    let agents = vec![
        Agent::new("a").with_model("a"),
        Agent::new("b").with_model("b").with_dependencies(vec!["a"]),
        Agent::new("c").with_model("c").with_dependencies(vec!["b"]),
    ];

    let orchestrator = Orchestrator::new(agents, client, prompts_for(&["a", "b", "c"]))
        .unwrap()
        .with_price_table(stub_prices(&["a", "b", "c"]));

    assert_eq!(
        orchestrator.execution_layers(),
        &[
            vec!["a".to_string()],
            vec!["b".to_string()],
            vec!["c".to_string()],
        ]
    );

    let context = Arc::new(ExecutionContext::new("grow revenue"));
    let context = orchestrator.run(context).await.unwrap();

    assert_eq!(context.output("a"), Some("A".to_string()));
    assert_eq!(context.output("b"), Some("B".to_string()));
    assert_eq!(context.output("c"), Some("C".to_string()));
    for name in &["a", "b", "c"] {
        assert_eq!(context.status(name), ExecutionStatus::Completed);
    }
    assert_eq!(context.total_tokens(), 90);
    assert!((context.total_cost_usd() - 0.003).abs() < 1e-9);

    let report = ExecutionReport::new(context);
    assert!(report.success());
    assert_eq!(report.status(), RunStatus::Completed);
    assert!(report.failed_agents().is_empty());
}

#[tokio::test]
async fn diamond_timeout_is_isolated_and_visible_downstream() {
    init_logging();
    let client = Arc::new(
        ScriptedClient::new(&[("a", "A OUTPUT"), ("b", "B OUTPUT"), ("c", "C OUTPUT"), ("d", "D OUTPUT")])
            .with_stall("b"),
    );
    let agents = vec![
        Agent::new("a").with_model("a"),
        Agent::new("b")
            .with_model("b")
            .with_dependencies(vec!["a"])
            .with_timeout(Duration::from_secs(1)),
        Agent::new("c").with_model("c").with_dependencies(vec!["a"]),
        Agent::new("d").with_model("d").with_dependencies(vec!["b", "c"]),
    ];

    let orchestrator =
        Orchestrator::new(agents, client.clone(), prompts_for(&["a", "b", "c", "d"])).unwrap();

    let context = Arc::new(ExecutionContext::new("diversify the product line"));
    let context = orchestrator.run(context).await.unwrap();

    // b timed out; its failure is recorded, not propagated.
    let b_metrics = context.metrics_for("b").unwrap();
    assert_eq!(b_metrics.status, ExecutionStatus::Failed);
    assert!(b_metrics.error.clone().unwrap().contains("timeout"));
    assert!(b_metrics.duration_ms() >= 1000);
    assert_eq!(context.output("b"), Some(String::new()));

    // c ran concurrently with b and was not cancelled.
    assert_eq!(context.status("c"), ExecutionStatus::Completed);
    assert_eq!(context.output("c"), Some("C OUTPUT".to_string()));

    // d still ran, saw b's failure and c's output in its user message.
    assert_eq!(context.status("d"), ExecutionStatus::Completed);
    let d_message = client.captured_message("d").unwrap();
    assert!(d_message.contains("=== b ===\nStatus: failed"));
    assert!(d_message.contains("=== Analysis from c ===\nC OUTPUT"));

    assert_eq!(context.failed_agents(), vec!["b".to_string()]);
    let report = ExecutionReport::new(context);
    assert_eq!(report.status(), RunStatus::PartialFailure);
    assert!(!report.success());
}

#[tokio::test]
async fn missing_prompt_aborts_the_run() {
    let client = Arc::new(ScriptedClient::new(&[("a", "A"), ("b", "B")]));
    let agents = vec![
        Agent::new("a").with_model("a"),
        Agent::new("b").with_model("b").with_dependencies(vec!["a"]),
    ];
    // Only b's prompt is registered; a's load fails at run time.
    let orchestrator = Orchestrator::new(agents, client, prompts_for(&["b"])).unwrap();

    let context = Arc::new(ExecutionContext::new("problem"));
    let err = orchestrator.run(context).await.unwrap_err();
    match err {
        OrchestratorError::PromptLoad { agent, reference } => {
            assert_eq!(agent, "a");
            assert_eq!(reference, "a");
        }
        other => panic!("expected PromptLoad, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_agent_set_runs_to_an_empty_context() {
    let client = Arc::new(ScriptedClient::new(&[]));
    let orchestrator = Orchestrator::new(vec![], client, prompts_for(&[])).unwrap();
    assert!(orchestrator.execution_layers().is_empty());

    let context = Arc::new(ExecutionContext::new("nothing to do"));
    let context = orchestrator.run(context).await.unwrap();

    assert!(context.outputs_snapshot().is_empty());
    assert!(context.metrics_snapshot().is_empty());
    let started = context.started_at().unwrap();
    let completed = context.completed_at().unwrap();
    assert!(completed >= started);
    assert_eq!(context.total_tokens(), 0);
}

#[tokio::test]
async fn construction_rejects_invalid_graphs() {
    let client = Arc::new(ScriptedClient::new(&[]));

    let err = Orchestrator::new(
        vec![Agent::new("a").with_dependencies(vec!["ghost"])],
        client.clone(),
        prompts_for(&["a"]),
    )
    .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingDependency { .. }));

    let err = Orchestrator::new(
        vec![
            Agent::new("a").with_dependencies(vec!["b"]),
            Agent::new("b").with_dependencies(vec!["a"]),
        ],
        client.clone(),
        prompts_for(&["a", "b"]),
    )
    .unwrap_err();
    match err {
        OrchestratorError::CircularDependency(cycle) => {
            assert_eq!(cycle.first(), cycle.last());
        }
        other => panic!("expected CircularDependency, got {:?}", other),
    }

    let err = Orchestrator::new(
        vec![Agent::new("a"), Agent::new("a")],
        client,
        prompts_for(&["a"]),
    )
    .unwrap_err();
    assert!(matches!(err, OrchestratorError::DuplicateAgent(name) if name == "a"));
}

#[tokio::test]
async fn layers_are_a_hard_barrier_and_clocks_are_monotonic() {
    let client = Arc::new(ScriptedClient::new(&[
        ("a", "A"),
        ("b", "B"),
        ("c", "C"),
        ("d", "D"),
    ]));
    let agents = vec![
        Agent::new("a").with_model("a"),
        Agent::new("b").with_model("b").with_dependencies(vec!["a"]),
        Agent::new("c").with_model("c").with_dependencies(vec!["a"]),
        Agent::new("d").with_model("d").with_dependencies(vec!["b", "c"]),
    ];
    let orchestrator =
        Orchestrator::new(agents, client, prompts_for(&["a", "b", "c", "d"])).unwrap();
    let layers = orchestrator.execution_layers().to_vec();

    let context = Arc::new(ExecutionContext::new("problem"));
    let context = orchestrator.run(context).await.unwrap();

    // Every agent in layer i+1 starts at or after the last end in layer i.
    for window in layers.windows(2) {
        let earlier_max_end = window[0]
            .iter()
            .map(|n| context.metrics_for(n).unwrap().end_time.unwrap())
            .max()
            .unwrap();
        for name in &window[1] {
            let start = context.metrics_for(name).unwrap().start_time.unwrap();
            assert!(
                start >= earlier_max_end,
                "{} started before the previous layer finished",
                name
            );
        }
    }

    // Run-level stamps bracket every per-agent clock.
    let started = context.started_at().unwrap();
    let completed = context.completed_at().unwrap();
    for metrics in context.metrics_snapshot().values() {
        let start = metrics.start_time.unwrap();
        let end = metrics.end_time.unwrap();
        assert!(started <= start);
        assert!(start <= end);
        assert!(end <= completed);
    }
}

#[tokio::test]
async fn events_trace_the_whole_run() {
    let recorder = Arc::new(Recorder::default());
    let client = Arc::new(ScriptedClient::new(&[("a", "A"), ("b", "B")]));
    let agents = vec![
        Agent::new("a").with_model("a"),
        Agent::new("b").with_model("b").with_dependencies(vec!["a"]),
    ];
    let orchestrator = Orchestrator::new(agents, client, prompts_for(&["a", "b"]))
        .unwrap()
        .with_event_handler(recorder.clone());

    let context = Arc::new(ExecutionContext::new("problem").with_execution_id("run-7"));
    orchestrator.run(context).await.unwrap();

    let events = recorder.events.lock().unwrap();
    let tags: Vec<String> = events
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        tags,
        vec![
            "execution_started",
            "execution_plan",
            "layer_started",
            "agent_started",
            "agent_completed",
            "layer_completed",
            "layer_started",
            "agent_started",
            "agent_completed",
            "layer_completed",
            "execution_completed",
        ]
    );

    match events.first().unwrap() {
        ExecutionEvent::ExecutionStarted { execution_id, agent_count, layer_count } => {
            assert_eq!(execution_id, "run-7");
            assert_eq!(*agent_count, 2);
            assert_eq!(*layer_count, 2);
        }
        other => panic!("expected ExecutionStarted first, got {:?}", other),
    }
    match events.last().unwrap() {
        ExecutionEvent::ExecutionCompleted { status, total_tokens, .. } => {
            assert_eq!(*status, RunStatus::Completed);
            assert_eq!(*total_tokens, 60);
        }
        other => panic!("expected ExecutionCompleted last, got {:?}", other),
    }

    // Timeouts surface as their own event kind.
    let json = serde_json::to_value(ExecutionEvent::AgentTimeout {
        execution_id: "run-7".to_string(),
        agent_name: "b".to_string(),
        timeout_seconds: 1.0,
    })
    .unwrap();
    assert_eq!(json["event"], "agent_timeout");
    assert_eq!(json["timeout_seconds"], 1.0);
}

#[tokio::test]
async fn execution_plan_is_human_readable() {
    let client = Arc::new(ScriptedClient::new(&[]));
    let agents = vec![
        Agent::new("analyst"),
        Agent::new("commercial").with_dependencies(vec!["analyst"]),
        Agent::new("market").with_dependencies(vec!["analyst"]),
    ];
    let orchestrator =
        Orchestrator::new(agents, client, prompts_for(&["analyst", "commercial", "market"]))
            .unwrap();

    assert_eq!(
        orchestrator.execution_plan(),
        "Execution plan:\n  Layer 1 (parallel): analyst\n  Layer 2 (parallel): commercial, market"
    );
    assert_eq!(format!("{}", orchestrator.dag()), "DAG([analyst] -> [commercial, market])");
}
