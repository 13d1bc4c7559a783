//! `tandem run`: Run a workflow file once.

use std::path::PathBuf;
use std::sync::Arc;
use tandem::{build_workflow, seed_state};
use tandem_config::{AppConfig, WorkflowConfig};
use tandem_core::event::EventBus;
use tandem_workflow::{Runner, validate_state_flow};
use tracing::{info, warn};

pub struct RunArgs {
    pub workflow: PathBuf,
    pub input: String,
    pub set: Vec<String>,
    pub json: bool,
    pub trace: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let workflow = WorkflowConfig::load(&args.workflow)?;

    if !config.has_api_key() {
        warn!("No API key configured; set TANDEM_API_KEY or add api_key to config.toml");
    }

    let router = tandem_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let root = build_workflow(&workflow, &config, provider)?;

    let seed = seed_state(args.set.iter().map(String::as_str))?;
    for key in &workflow.seed_keys {
        if !seed.contains(key) {
            warn!(key = %key, "Declared seed key not set; pass --set {key}=...");
        }
    }
    for issue in validate_state_flow(root.as_ref(), seed.keys()) {
        warn!("{issue}");
    }

    let events = Arc::new(EventBus::new(config.engine.event_capacity));
    let runner = Arc::new(
        Runner::new(root)?
            .with_event_bus(events.clone())
            .with_missing_key_policy(config.engine.missing_key_policy),
    );

    let tracer = args.trace.then(|| {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match serde_json::to_string(event.as_ref()) {
                    Ok(line) => eprintln!("{line}"),
                    Err(e) => warn!(error = %e, "Failed to encode event"),
                }
            }
        })
    });

    let interrupt = {
        let runner = runner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling workflow");
                runner.cancel();
            }
        })
    };

    let result = runner.run(args.input, seed).await;
    interrupt.abort();
    if let Some(tracer) = tracer {
        tracer.abort();
    }
    let output = result?;

    if args.json {
        let report = serde_json::json!({
            "invocation_id": output.invocation_id,
            "response": output.response,
            "state": output.state.as_map(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output.response.unwrap_or_default());
    }

    Ok(())
}
