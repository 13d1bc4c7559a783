//! Hand-written agents for composite tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tandem_core::template::{self, Placeholder};
use tandem_core::{Agent, AgentKind, AgentOutcome, Error, InvocationContext, Result};

async fn pause(ctx: &InvocationContext, delay: Option<Duration>) -> Result<()> {
    let Some(delay) = delay else {
        return Ok(());
    };
    tokio::select! {
        _ = ctx.cancellation().cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Renders `template` against the state and writes the text under `key`.
///
/// `{run}` in the template is replaced by the 1-based run count first.
pub struct TemplateAgent {
    name: String,
    key: Option<String>,
    template: String,
    delay: Option<Duration>,
    runs: AtomicUsize,
}

impl TemplateAgent {
    pub fn new(name: &str, key: Option<&str>, template: &str) -> Self {
        Self {
            name: name.into(),
            key: key.map(String::from),
            template: template.into(),
            delay: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for TemplateAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> AgentKind {
        AgentKind::Leaf
    }
    fn output_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
    fn input_keys(&self) -> Vec<Placeholder> {
        template::placeholders(&self.template)
            .into_iter()
            .filter(|p| p.key != "run")
            .collect()
    }
    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        pause(ctx, self.delay).await?;
        let template = self.template.replace("{run}", &run.to_string());
        let text = ctx.render_instruction(&self.name, &template)?;
        if let Some(key) = &self.key {
            ctx.write_output(&self.name, key, text.clone());
        }
        Ok(AgentOutcome::new(&self.name, Some(text)))
    }
}

/// Writes a scripted value per run and requests exit on the flagged runs.
pub struct ScriptedAgent {
    name: String,
    key: String,
    steps: Vec<(String, bool)>,
    runs: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(name: &str, key: &str, steps: &[(&str, bool)]) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            steps: steps.iter().map(|(v, exit)| (v.to_string(), *exit)).collect(),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> AgentKind {
        AgentKind::Leaf
    }
    fn output_key(&self) -> Option<&str> {
        Some(&self.key)
    }
    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        let (value, exit) = self
            .steps
            .get(run)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or_default();
        ctx.write_output(&self.name, &self.key, value.clone());
        if exit {
            Ok(AgentOutcome::exit(&self.name, Some(value)))
        } else {
            Ok(AgentOutcome::new(&self.name, Some(value)))
        }
    }
}

/// Records the value of `key` it sees, then writes `value` to the same key.
pub struct ObservingAgent {
    name: String,
    key: String,
    value: String,
    delay: Option<Duration>,
    seen: Mutex<Vec<Option<String>>>,
}

impl ObservingAgent {
    pub fn new(name: &str, key: &str, value: &str) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ObservingAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> AgentKind {
        AgentKind::Leaf
    }
    fn output_key(&self) -> Option<&str> {
        Some(&self.key)
    }
    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        pause(ctx, self.delay).await?;
        let before = ctx.state().get_text(&self.key);
        self.seen.lock().unwrap().push(before);
        ctx.write_output(&self.name, &self.key, self.value.clone());
        Ok(AgentOutcome::new(&self.name, Some(self.value.clone())))
    }
}

/// Fails with an internal error, optionally after a delay.
pub struct FailingAgent {
    name: String,
    delay: Option<Duration>,
}

impl FailingAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> AgentKind {
        AgentKind::Leaf
    }
    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        pause(ctx, self.delay).await?;
        Err(Error::Internal(format!("{} failed", self.name)))
    }
}
