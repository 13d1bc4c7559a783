//! `tandem validate`: Check a workflow file without calling any model.

use std::path::Path;
use tandem::build_workflow;
use tandem_config::{AppConfig, WorkflowConfig};
use tandem_workflow::validate_state_flow;

pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let workflow = WorkflowConfig::load(path)?;

    let router = tandem_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let root = build_workflow(&workflow, &config, provider)?;

    println!(
        "Workflow {} ({} agents, root: {})",
        path.display(),
        workflow.agents.len(),
        root.name()
    );

    let issues = validate_state_flow(root.as_ref(), workflow.seed_keys.iter().map(String::as_str));
    if issues.is_empty() {
        println!("  ✅ Every placeholder is written before it is read");
        return Ok(());
    }

    for issue in &issues {
        println!("  ⚠️  {issue}");
    }
    println!();
    println!("  {} state-flow issue(s) found.", issues.len());
    Ok(())
}
