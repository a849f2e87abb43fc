//! Graph validation: lint rules and diagnostics.
//!
//! Structural checks run at compile time, before any run executes. Call
//! [`validate`] for advisory diagnostics or [`validate_or_raise`] to fail
//! on the first `Error`-severity issue.

use std::collections::HashSet;

use codeflow_types::{CodeflowError, Result};

use crate::graph::{Edge, StageGraph, END_STAGE};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &StageGraph) -> Vec<Diagnostic>;
}

fn target_names(edge: &Edge) -> Vec<&str> {
    match edge {
        Edge::Fixed(to) => vec![to.as_str()],
        Edge::Conditional {
            possible_targets, ..
        } => possible_targets.iter().map(String::as_str).collect(),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct EntryStageRule;
impl LintRule for EntryStageRule {
    fn name(&self) -> &str {
        "entry_stage"
    }
    fn apply(&self, graph: &StageGraph) -> Vec<Diagnostic> {
        match &graph.entry {
            None => vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: "graph has no entry stage".into(),
                stage: None,
            }],
            Some(entry) if !graph.stages.contains_key(entry) => vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("entry stage '{entry}' is not registered"),
                stage: Some(entry.clone()),
            }],
            Some(_) => vec![],
        }
    }
}

struct EdgeTargetRule;
impl LintRule for EdgeTargetRule {
    fn name(&self) -> &str {
        "edge_target"
    }
    fn apply(&self, graph: &StageGraph) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for name in &graph.order {
            let Some(edge) = graph.edges.get(name) else {
                continue;
            };
            for target in target_names(edge) {
                if target != END_STAGE && !graph.stages.contains_key(target) {
                    out.push(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Error,
                        message: format!("edge from '{name}' references unknown stage '{target}'"),
                        stage: Some(name.clone()),
                    });
                }
            }
        }
        out
    }
}

struct OutgoingPathRule;
impl LintRule for OutgoingPathRule {
    fn name(&self) -> &str {
        "outgoing_path"
    }
    fn apply(&self, graph: &StageGraph) -> Vec<Diagnostic> {
        graph
            .order
            .iter()
            .filter(|name| !graph.edges.contains_key(*name))
            .map(|name| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("stage '{name}' has no outgoing path"),
                stage: Some(name.clone()),
            })
            .collect()
    }
}

struct ReachabilityRule;
impl LintRule for ReachabilityRule {
    fn name(&self) -> &str {
        "reachability"
    }
    fn apply(&self, graph: &StageGraph) -> Vec<Diagnostic> {
        let Some(entry) = graph.entry.as_deref() else {
            return vec![];
        };
        let mut seen: HashSet<&str> = HashSet::new();
        let mut frontier = vec![entry];
        while let Some(name) = frontier.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(edge) = graph.edges.get(name) {
                frontier.extend(target_names(edge));
            }
        }
        graph
            .order
            .iter()
            .filter(|name| !seen.contains(name.as_str()))
            .map(|name| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("stage '{name}' is unreachable from the entry"),
                stage: Some(name.clone()),
            })
            .collect()
    }
}

fn rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(EntryStageRule),
        Box::new(EdgeTargetRule),
        Box::new(OutgoingPathRule),
        Box::new(ReachabilityRule),
    ]
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply all rules and collect every diagnostic.
pub fn validate(graph: &StageGraph) -> Vec<Diagnostic> {
    rules().iter().flat_map(|r| r.apply(graph)).collect()
}

/// Fail on the first `Error`-severity diagnostic; warnings are logged.
pub fn validate_or_raise(graph: &StageGraph) -> Result<()> {
    for diagnostic in validate(graph) {
        match diagnostic.severity {
            Severity::Error => {
                return Err(CodeflowError::GraphValidation(format!(
                    "[{}] {}",
                    diagnostic.rule, diagnostic.message
                )))
            }
            Severity::Warning => {
                tracing::warn!(rule = %diagnostic.rule, "{}", diagnostic.message);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use codeflow_types::PipelineState;

    use crate::graph::Stage;

    struct NoopStage(&'static str);

    #[async_trait]
    impl Stage for NoopStage {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn run(&self, _state: &mut PipelineState) -> Result<()> {
            Ok(())
        }
    }

    fn graph_with(names: &[&'static str]) -> StageGraph {
        let mut graph = StageGraph::new();
        for name in names {
            graph.add_stage(Arc::new(NoopStage(name)));
        }
        graph
    }

    #[test]
    fn valid_graph_has_no_diagnostics() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_edge("a", "b").add_edge("b", END_STAGE).set_entry("a");
        assert!(validate(&graph).is_empty());
        assert!(validate_or_raise(&graph).is_ok());
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut graph = graph_with(&["a"]);
        graph.add_edge("a", END_STAGE);
        let diags = validate(&graph);
        assert!(diags.iter().any(|d| d.rule == "entry_stage" && d.severity == Severity::Error));
    }

    #[test]
    fn unregistered_entry_is_an_error() {
        let mut graph = graph_with(&["a"]);
        graph.add_edge("a", END_STAGE).set_entry("ghost");
        assert!(validate_or_raise(&graph).is_err());
    }

    #[test]
    fn dangling_conditional_target_is_an_error() {
        let mut graph = graph_with(&["a"]);
        graph
            .add_conditional_edge(
                "a",
                Box::new(|_: &mut PipelineState| "ghost".into()),
                vec!["ghost".into()],
            )
            .set_entry("a");
        let diags = validate(&graph);
        assert!(diags.iter().any(|d| d.rule == "edge_target"));
    }

    #[test]
    fn stage_without_outgoing_path_is_an_error() {
        let mut graph = graph_with(&["a", "dead_end"]);
        graph.add_edge("a", "dead_end").set_entry("a");
        let diags = validate(&graph);
        assert!(diags
            .iter()
            .any(|d| d.rule == "outgoing_path" && d.stage.as_deref() == Some("dead_end")));
    }

    #[test]
    fn unreachable_stage_is_a_warning_only() {
        let mut graph = graph_with(&["a", "island"]);
        graph
            .add_edge("a", END_STAGE)
            .add_edge("island", END_STAGE)
            .set_entry("a");
        let diags = validate(&graph);
        assert!(diags
            .iter()
            .any(|d| d.rule == "reachability" && d.severity == Severity::Warning));
        // Warnings never fail compilation.
        assert!(validate_or_raise(&graph).is_ok());
    }
}
