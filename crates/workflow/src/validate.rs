//! Build-time checks over an agent tree.
//!
//! [`ensure_unique_names`] rejects trees where two nodes share a name.
//! [`validate_state_flow`] walks the tree in control-flow order and reports
//! placeholders that nothing upstream writes.

use std::collections::BTreeSet;
use std::sync::Arc;
use tandem_core::agent::{Agent, AgentKind};
use tandem_core::error::WorkflowError;

/// Fail with `DuplicateAgentName` if any two nodes under (and including)
/// `name` share a name.
pub fn ensure_unique_names(name: &str, children: &[Arc<dyn Agent>]) -> Result<(), WorkflowError> {
    let mut seen = BTreeSet::new();
    seen.insert(name.to_string());
    for child in children {
        collect_names(child.as_ref(), &mut seen)?;
    }
    Ok(())
}

fn collect_names(agent: &dyn Agent, seen: &mut BTreeSet<String>) -> Result<(), WorkflowError> {
    if !seen.insert(agent.name().to_string()) {
        return Err(WorkflowError::DuplicateAgentName(agent.name().to_string()));
    }
    for child in agent.sub_agents() {
        collect_names(child.as_ref(), seen)?;
    }
    Ok(())
}

/// A placeholder whose key may not be set when the agent runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFlowIssue {
    /// Neither the seed nor any earlier agent writes `key`.
    Unwritten { agent: String, key: String },

    /// `key` is only written later in the body of `loop_agent`, so the first
    /// pass reads it unset.
    LoopCarried {
        agent: String,
        key: String,
        loop_agent: String,
    },
}

impl std::fmt::Display for StateFlowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateFlowIssue::Unwritten { agent, key } => {
                write!(f, "agent '{agent}' reads '{{{key}}}' but nothing upstream writes it")
            }
            StateFlowIssue::LoopCarried {
                agent,
                key,
                loop_agent,
            } => write!(
                f,
                "agent '{agent}' reads '{{{key}}}', which is only set from the second pass of '{loop_agent}'"
            ),
        }
    }
}

/// Walk `root` in control-flow order, assuming `seeded` keys are set up
/// front, and report every required placeholder that may resolve unset.
///
/// Parallel siblings never see each other's writes. Inside a loop, a key
/// written by a later child of the same loop counts as loop-carried.
pub fn validate_state_flow<I, K>(root: &dyn Agent, seeded: I) -> Vec<StateFlowIssue>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let mut available: BTreeSet<String> = seeded.into_iter().map(|k| k.into()).collect();
    let mut issues = Vec::new();
    walk(root, &mut available, &[], &mut issues);
    issues
}

/// A loop enclosing the current node, with every key its body writes.
struct LoopScope<'a> {
    name: &'a str,
    writes: BTreeSet<String>,
}

fn walk(
    agent: &dyn Agent,
    available: &mut BTreeSet<String>,
    loops: &[LoopScope<'_>],
    issues: &mut Vec<StateFlowIssue>,
) {
    match agent.kind() {
        AgentKind::Leaf => {
            for placeholder in agent.input_keys() {
                if placeholder.optional || available.contains(&placeholder.key) {
                    continue;
                }
                let carried_by = loops
                    .iter()
                    .rev()
                    .find(|scope| scope.writes.contains(&placeholder.key));
                issues.push(match carried_by {
                    Some(scope) => StateFlowIssue::LoopCarried {
                        agent: agent.name().to_string(),
                        key: placeholder.key,
                        loop_agent: scope.name.to_string(),
                    },
                    None => StateFlowIssue::Unwritten {
                        agent: agent.name().to_string(),
                        key: placeholder.key,
                    },
                });
            }
            if let Some(key) = agent.output_key() {
                available.insert(key.to_string());
            }
        }
        AgentKind::Sequential => {
            for child in agent.sub_agents() {
                walk(child.as_ref(), available, loops, issues);
            }
        }
        AgentKind::Parallel => {
            let snapshot = available.clone();
            for child in agent.sub_agents() {
                let mut branch = snapshot.clone();
                walk(child.as_ref(), &mut branch, loops, issues);
                available.extend(branch);
            }
        }
        AgentKind::Loop { .. } => {
            let mut writes = BTreeSet::new();
            collect_writes(agent, &mut writes);
            let mut scopes: Vec<LoopScope<'_>> = loops
                .iter()
                .map(|s| LoopScope {
                    name: s.name,
                    writes: s.writes.clone(),
                })
                .collect();
            scopes.push(LoopScope {
                name: agent.name(),
                writes,
            });
            for child in agent.sub_agents() {
                walk(child.as_ref(), available, &scopes, issues);
            }
        }
    }
}

fn collect_writes(agent: &dyn Agent, writes: &mut BTreeSet<String>) {
    if let Some(key) = agent.output_key() {
        writes.insert(key.to_string());
    }
    for child in agent.sub_agents() {
        collect_writes(child.as_ref(), writes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TemplateAgent;
    use crate::{LoopAgent, ParallelAgent, SequentialAgent};

    fn leaf(name: &str, key: Option<&str>, template: &str) -> Arc<dyn Agent> {
        Arc::new(TemplateAgent::new(name, key, template))
    }

    #[test]
    fn sequential_pipeline_is_clean() {
        let root = SequentialAgent::new(
            "Pipeline",
            vec![
                leaf("Writer", Some("draft"), "Write about {topic}"),
                leaf("Reviewer", Some("verdict"), "{draft}-reviewed"),
            ],
        )
        .unwrap();
        assert!(validate_state_flow(&root, ["topic"]).is_empty());
    }

    #[test]
    fn missing_seed_is_reported() {
        let root = SequentialAgent::new(
            "Pipeline",
            vec![leaf("Writer", Some("draft"), "Write about {topic}")],
        )
        .unwrap();
        let issues = validate_state_flow(&root, Vec::<String>::new());
        assert_eq!(
            issues,
            vec![StateFlowIssue::Unwritten {
                agent: "Writer".into(),
                key: "topic".into()
            }]
        );
        assert!(issues[0].to_string().contains("{topic}"));
    }

    #[test]
    fn reading_a_later_write_is_reported() {
        let root = SequentialAgent::new(
            "Pipeline",
            vec![
                leaf("Reviewer", Some("verdict"), "{draft}-reviewed"),
                leaf("Writer", Some("draft"), "A"),
            ],
        )
        .unwrap();
        let issues = validate_state_flow(&root, Vec::<String>::new());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn parallel_siblings_do_not_see_each_other() {
        let root = SequentialAgent::new(
            "Root",
            vec![
                Arc::new(
                    ParallelAgent::new(
                        "Research",
                        vec![
                            leaf("Tech", Some("tech"), "tech"),
                            leaf("Health", Some("health"), "{tech} and health"),
                        ],
                    )
                    .unwrap(),
                ) as Arc<dyn Agent>,
                leaf("Aggregator", Some("summary"), "{tech} {health}"),
            ],
        )
        .unwrap();
        let issues = validate_state_flow(&root, Vec::<String>::new());
        assert_eq!(
            issues,
            vec![StateFlowIssue::Unwritten {
                agent: "Health".into(),
                key: "tech".into()
            }]
        );
    }

    #[test]
    fn loop_carried_reads_are_flagged() {
        let refinement = LoopAgent::new(
            "Refinement",
            vec![
                leaf("Critic", Some("critique"), "Review {current_story}"),
                leaf("Refiner", Some("current_story"), "{current_story} + {critique}"),
            ],
            2,
        )
        .unwrap();
        let issues = validate_state_flow(&refinement, Vec::<String>::new());
        assert_eq!(
            issues,
            vec![
                StateFlowIssue::LoopCarried {
                    agent: "Critic".into(),
                    key: "current_story".into(),
                    loop_agent: "Refinement".into()
                },
                StateFlowIssue::LoopCarried {
                    agent: "Refiner".into(),
                    key: "current_story".into(),
                    loop_agent: "Refinement".into()
                },
            ]
        );

        // Seeding the story from an initial writer resolves it
        let pipeline = SequentialAgent::new(
            "Story",
            vec![
                leaf("InitialWriter", Some("current_story"), "first draft"),
                Arc::new(refinement) as Arc<dyn Agent>,
            ],
        )
        .unwrap();
        assert!(validate_state_flow(&pipeline, Vec::<String>::new()).is_empty());
    }

    #[test]
    fn optional_placeholders_are_ignored() {
        let root = leaf("Writer", Some("draft"), "Notes: {notes?}");
        assert!(validate_state_flow(root.as_ref(), Vec::<String>::new()).is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ensure_unique_names(
            "Root",
            &[leaf("Writer", None, ""), leaf("Writer", None, "")],
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateAgentName(ref n) if n == "Writer"));

        let err = ensure_unique_names("Writer", &[leaf("Writer", None, "")]).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateAgentName(_)));
    }
}
