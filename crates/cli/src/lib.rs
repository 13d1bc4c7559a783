//! Library half of the `tandem` binary: building agent trees from workflow
//! files and turning command-line input into seed state.

pub mod builder;

pub use builder::{WorkflowBuilder, build_workflow};

use serde_json::Value;
use tandem_core::SharedState;

/// The story-refinement workflow written by `tandem init`.
pub const STORY_WORKFLOW: &str = r#"# Write a short story, then critique and refine it until approved.
root = "StoryPipeline"
description = "Initial draft followed by a critique/refine loop"

[[agents]]
name = "StoryPipeline"
kind = "sequential"
sub_agents = ["InitialWriterAgent", "StoryRefinementLoop"]

[[agents]]
name = "InitialWriterAgent"
description = "Writes the first draft of a short story from the user's prompt."
instruction = """
Based on the user's prompt, write the first draft of a short story (around 100-150 words).
Output only the story text, with no introduction or explanation."""
output_key = "current_story"

[[agents]]
name = "StoryRefinementLoop"
kind = "loop"
description = "Refines the story through critique and revision until approved."
max_iterations = 2
sub_agents = ["CriticAgent", "RefinerAgent"]

[[agents]]
name = "CriticAgent"
description = "Critiques the current story and suggests improvements."
instruction = """
You are a constructive story critic. Review the story provided below.
Story: {current_story}

Evaluate the story's plot, characters and pacing.
- If the story is well-written and complete, you MUST respond with the exact phrase: "APPROVED"
- Otherwise, provide 2-3 specific, actionable suggestions for improvement."""
output_key = "critique"

[[agents]]
name = "RefinerAgent"
description = "Refines the story based on the critique, or exits once approved."
instruction = """
You are a story refiner. You have a story draft and critique.

Story Draft: {current_story}
Critique: {critique}

- IF the critique is EXACTLY "APPROVED", you MUST call the `exit_loop` tool and nothing else.
- OTHERWISE, rewrite the story draft to fully incorporate the feedback from the critique."""
tools = ["exit_loop"]
output_key = "current_story"
"#;

/// Parse `key=value` into a state entry.
///
/// Values that parse as JSON are kept as JSON; anything else is a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Build the seed state from `key=value` assignments. Later assignments win.
pub fn seed_state<'a>(
    assignments: impl IntoIterator<Item = &'a str>,
) -> Result<SharedState, String> {
    let values = assignments
        .into_iter()
        .map(parse_assignment)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SharedState::seeded(values))
}
