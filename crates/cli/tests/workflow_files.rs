//! Workflow files built and run end to end against a scripted model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tandem::{WorkflowBuilder, build_workflow, seed_state};
use tandem_config::{AppConfig, WorkflowConfig};
use tandem_core::error::ProviderError;
use tandem_core::message::{Message, MessageToolCall, Role};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tandem_core::{DomainEvent, LoopTermination, SharedState};
use tandem_workflow::Runner;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays replies in call order across every agent sharing it.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Message>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(system);

        let next = self.replies.lock().unwrap().pop_front();
        let message = next.ok_or_else(|| ProviderError::ApiError {
            status_code: 400,
            message: "script exhausted".into(),
        })?;
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "mock-model".into(),
        })
    }
}

fn text(reply: &str) -> Message {
    Message::assistant(reply)
}

fn tool_call(name: &str, args: serde_json::Value) -> Message {
    Message::assistant("").with_tool_calls(vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }])
}

fn terminations(
    rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>,
) -> Vec<(u32, LoopTermination)> {
    let mut found = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::LoopTerminated { iterations, reason, .. } = event.as_ref() {
            found.push((*iterations, *reason));
        }
    }
    found
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn story_workflow_refines_until_approved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("story.toml");
    std::fs::write(&path, tandem::STORY_WORKFLOW).unwrap();
    let workflow = WorkflowConfig::load(&path).unwrap();

    let provider = ScriptedProvider::new(vec![
        text("A story"),
        text("Add more suspense"),
        text("A darker story"),
        text("APPROVED"),
        tool_call("exit_loop", serde_json::json!({})),
    ]);
    let root = build_workflow(&workflow, &AppConfig::default(), provider.clone()).unwrap();
    let runner = Runner::new(root).unwrap();
    let mut rx = runner.events().subscribe();

    let output = runner.run("a lighthouse keeper", SharedState::new()).await.unwrap();

    assert_eq!(provider.remaining(), 0);
    assert_eq!(terminations(&mut rx), vec![(2, LoopTermination::ExitSignaled)]);
    assert_eq!(output.state.get_str("current_story"), Some("A darker story"));
    assert_eq!(output.state.get_str("critique"), Some("APPROVED"));

    let prompts = provider.prompts();
    assert!(prompts[1].contains("Story: A story"));
    assert!(prompts[2].contains("Critique: Add more suspense"));
    assert!(prompts[3].contains("Story: A darker story"));
}

#[tokio::test]
async fn instruction_files_resolve_next_to_the_workflow() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("writer.md"), "Write about {topic}").unwrap();
    let path = dir.path().join("workflow.toml");
    std::fs::write(
        &path,
        r#"
root = "Pipeline"
seed_keys = ["topic"]

[[agents]]
name = "Pipeline"
kind = "sequential"
sub_agents = ["Writer", "Reviewer"]

[[agents]]
name = "Writer"
instruction_file = "writer.md"
output_key = "draft"

[[agents]]
name = "Reviewer"
instruction_file = "missing.md"
instruction_default = "Review {draft}"
output_key = "verdict"
"#,
    )
    .unwrap();
    let workflow = WorkflowConfig::load(&path).unwrap();

    let provider = ScriptedProvider::new(vec![text("A"), text("A-reviewed")]);
    let root = build_workflow(&workflow, &AppConfig::default(), provider.clone()).unwrap();
    let output = Runner::new(root)
        .unwrap()
        .run("go", seed_state(["topic=tides"]).unwrap())
        .await
        .unwrap();

    assert_eq!(provider.prompts(), vec!["Write about tides", "Review A"]);
    assert_eq!(output.state.get_str("draft"), Some("A"));
    assert_eq!(output.state.get_str("verdict"), Some("A-reviewed"));
    assert_eq!(output.response.as_deref(), Some("A-reviewed"));
}

#[tokio::test]
async fn coordinator_delegates_through_agent_tools() {
    let workflow = WorkflowConfig::from_toml(
        r#"
root = "Coordinator"

[[agents]]
name = "Coordinator"
instruction = "Answer using your researcher"
tools = ["agent:Researcher"]
output_key = "answer"

[[agents]]
name = "Researcher"
instruction = "Find facts"
output_key = "notes"
"#,
    )
    .unwrap();

    let provider = ScriptedProvider::new(vec![
        tool_call("Researcher", serde_json::json!({"request": "tides"})),
        text("Tides follow the moon"),
        text("The moon drives the tides"),
    ]);
    let root = WorkflowBuilder::new(&workflow, &AppConfig::default(), provider.clone())
        .build()
        .unwrap();
    let output = Runner::new(root).unwrap().run("why tides?", SharedState::new()).await.unwrap();

    assert_eq!(output.state.get_str("notes"), Some("Tides follow the moon"));
    assert_eq!(output.state.get_str("answer"), Some("The moon drives the tides"));
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn parallel_research_then_aggregate() {
    let workflow = WorkflowConfig::from_toml(
        r#"
root = "ResearchSystem"

[[agents]]
name = "ResearchSystem"
kind = "sequential"
sub_agents = ["ParallelResearch", "Aggregator"]

[[agents]]
name = "ParallelResearch"
kind = "parallel"
sub_agents = ["TechResearcher", "HealthResearcher"]

[[agents]]
name = "TechResearcher"
instruction = "Research AI"
output_key = "tech_research"

[[agents]]
name = "HealthResearcher"
instruction = "Research medicine"
output_key = "health_research"

[[agents]]
name = "Aggregator"
instruction = "Combine: {tech_research} | {health_research}"
output_key = "executive_summary"
"#,
    )
    .unwrap();

    // Both researchers get the same reply, so call order does not matter
    let provider = ScriptedProvider::new(vec![text("finding"), text("finding"), text("summary")]);
    let root = build_workflow(&workflow, &AppConfig::default(), provider.clone()).unwrap();
    let output = Runner::new(root).unwrap().run("go", SharedState::new()).await.unwrap();

    assert_eq!(provider.prompts()[2], "Combine: finding | finding");
    assert_eq!(output.state.len(), 3);
    assert_eq!(output.response.as_deref(), Some("summary"));
}

/// Always answers with the same HTTP failure.
struct Overloaded {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl Provider for Overloaded {
    fn name(&self) -> &str {
        "overloaded"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "model overloaded".into(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn configured_attempts_bound_every_model_call() {
    let config = AppConfig::from_toml("[retry]\nattempts = 3\ninitial_delay_secs = 0.5").unwrap();
    let workflow = WorkflowConfig::from_toml(
        r#"
root = "Writer"

[[agents]]
name = "Writer"
instruction = "Write"
output_key = "draft"
"#,
    )
    .unwrap();

    let provider = Arc::new(Overloaded {
        calls: AtomicU32::new(0),
    });
    let root = build_workflow(&workflow, &config, provider.clone()).unwrap();
    let runner = Runner::new(root).unwrap();
    let mut rx = runner.events().subscribe();

    let err = runner.run("go", SharedState::new()).await.unwrap_err();

    assert!(matches!(
        err,
        tandem_core::Error::Provider(ProviderError::ExhaustedRetries { attempts: 3, .. })
    ));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

    let mut retries = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event.as_ref(), DomainEvent::ModelCallRetried { .. }) {
            retries += 1;
        }
    }
    assert_eq!(retries, 2);
}
