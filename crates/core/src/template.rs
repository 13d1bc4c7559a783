//! Instruction templating.
//!
//! Instructions reference state keys with `{key}`. A trailing `?` (`{key?}`)
//! marks the placeholder optional. Brace groups whose content is not a
//! plain identifier (JSON snippets, code) are copied through untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WorkflowError;
use crate::state::SharedState;

/// What to do when a required placeholder names a key that is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Substitute an empty string and continue.
    #[default]
    Empty,
    /// Fail the agent with `WorkflowError::MissingStateKey`.
    Error,
}

/// A `{key}` reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub key: String,
    pub optional: bool,
}

enum Segment<'a> {
    Text(&'a str),
    Key(Placeholder),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_placeholder(inner: &str) -> Option<Placeholder> {
    let inner = inner.trim();
    let (key, optional) = match inner.strip_suffix('?') {
        Some(key) => (key, true),
        None => (inner, false),
    };
    is_identifier(key).then(|| Placeholder {
        key: key.to_string(),
        optional,
    })
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            out.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                match parse_placeholder(&after[..close]) {
                    Some(p) => out.push(Segment::Key(p)),
                    None => out.push(Segment::Text(&rest[open..open + close + 2])),
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push(Segment::Text(&rest[open..open + 1]));
                rest = after;
            }
        }
    }

    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// List the placeholders a template references, in order of appearance.
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    segments(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Key(p) => Some(p),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Resolve every placeholder in `template` against `state`.
///
/// `agent` is only used to label a `MissingStateKey` error.
pub fn render(
    agent: &str,
    template: &str,
    state: &SharedState,
    policy: MissingKeyPolicy,
) -> Result<String, WorkflowError> {
    let mut out = String::with_capacity(template.len());

    for segment in segments(template) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Key(p) => match state.get_text(&p.key) {
                Some(value) => out.push_str(&value),
                None if p.optional || policy == MissingKeyPolicy::Empty => {
                    debug!(agent, key = %p.key, "State key not set, resolving to empty");
                }
                None => {
                    return Err(WorkflowError::MissingStateKey {
                        agent: agent.to_string(),
                        key: p.key,
                    });
                }
            },
        }
    }

    Ok(out)
}
