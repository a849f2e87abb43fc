//! Stage graph: named stages plus fixed and conditional edges, compiled
//! into an immutable executable form.
//!
//! The graph is built once at process start, validated, and then shared
//! read-only across concurrently executing runs. Each run carries its own
//! `PipelineState`; the graph itself is never mutated after [`StageGraph::compile`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use codeflow_types::{PipelineState, Result};

use crate::validation::validate_or_raise;

/// Terminal marker: routing to this name ends the run.
pub const END_STAGE: &str = "__end__";

/// A single pipeline stage. Stages mutate the run state in place and record
/// exactly one decision per execution via [`PipelineState::decide`].
///
/// A returned `Err` is a stage-internal fault: the engine converts it to an
/// error decision and a failed run instead of propagating it.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, state: &mut PipelineState) -> Result<()>;
}

/// Destination routing function for a conditional edge. Routers may mutate
/// the state (the escalation controller moves attempt counters here) and
/// must return a registered stage name or [`END_STAGE`].
pub type Router = Box<dyn Fn(&mut PipelineState) -> String + Send + Sync>;

pub(crate) enum Edge {
    Fixed(String),
    Conditional {
        router: Router,
        /// Every name the router can return, declared up front so the
        /// validator can check them without executing the router.
        possible_targets: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Mutable graph under construction. [`StageGraph::compile`] validates and
/// freezes it.
#[derive(Default)]
pub struct StageGraph {
    pub(crate) stages: HashMap<String, Arc<dyn Stage>>,
    /// Insertion order, for deterministic validation output.
    pub(crate) order: Vec<String>,
    pub(crate) edges: HashMap<String, Edge>,
    pub(crate) entry: Option<String>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        let name = stage.name().to_string();
        if self.stages.insert(name.clone(), stage).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Register an unconditional transition.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.insert(from.into(), Edge::Fixed(to.into()));
        self
    }

    /// Register a transition whose destination is computed from the state,
    /// chiefly from `last_decision`.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<String>,
        router: Router,
        possible_targets: Vec<String>,
    ) -> &mut Self {
        self.edges.insert(
            from.into(),
            Edge::Conditional {
                router,
                possible_targets,
            },
        );
        self
    }

    pub fn set_entry(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    /// Validate and freeze. Fails fast on a missing entry, a dangling edge
    /// target, or a stage with no outgoing path.
    pub fn compile(self) -> Result<CompiledGraph> {
        validate_or_raise(&self)?;
        let entry = self.entry.clone().unwrap_or_default();
        Ok(CompiledGraph {
            inner: Arc::new(GraphInner {
                stages: self.stages,
                edges: self.edges,
                entry,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

struct GraphInner {
    stages: HashMap<String, Arc<dyn Stage>>,
    edges: HashMap<String, Edge>,
    entry: String,
}

/// The immutable executable graph. Cloning shares the same definition.
#[derive(Clone)]
pub struct CompiledGraph {
    inner: Arc<GraphInner>,
}

// Stages are trait objects, so Debug is written by hand over the names.
impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stages: Vec<&str> = self.inner.stages.keys().map(String::as_str).collect();
        stages.sort_unstable();
        f.debug_struct("CompiledGraph")
            .field("entry", &self.inner.entry)
            .field("stages", &stages)
            .finish()
    }
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.inner.entry
    }

    pub fn stage(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.inner.stages.get(name).cloned()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.inner.stages.contains_key(name)
    }

    /// Next stage name after `from`, computed from the state for
    /// conditional edges. `None` means no edge is registered, which the
    /// validator rules out for compiled graphs.
    pub fn next_stage(&self, from: &str, state: &mut PipelineState) -> Option<String> {
        match self.inner.edges.get(from)? {
            Edge::Fixed(to) => Some(to.clone()),
            Edge::Conditional { router, .. } => Some(router(state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_types::{CodeflowError, Decision};

    struct NoopStage(&'static str);

    #[async_trait]
    impl Stage for NoopStage {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, state: &mut PipelineState) -> Result<()> {
            state.decide(Decision::proceed(self.0));
            Ok(())
        }
    }

    fn two_stage_graph() -> StageGraph {
        let mut graph = StageGraph::new();
        graph
            .add_stage(Arc::new(NoopStage("first")))
            .add_stage(Arc::new(NoopStage("second")))
            .add_edge("first", "second")
            .add_edge("second", END_STAGE)
            .set_entry("first");
        graph
    }

    #[test]
    fn compile_freezes_a_valid_graph() {
        let compiled = two_stage_graph().compile().unwrap();
        assert_eq!(compiled.entry(), "first");
        assert!(compiled.has_stage("second"));
        assert!(!compiled.has_stage("third"));
    }

    #[test]
    fn fixed_edge_routes_unconditionally() {
        let compiled = two_stage_graph().compile().unwrap();
        let mut state = PipelineState::new("req", "repo");
        assert_eq!(compiled.next_stage("first", &mut state).as_deref(), Some("second"));
        assert_eq!(
            compiled.next_stage("second", &mut state).as_deref(),
            Some(END_STAGE)
        );
    }

    #[test]
    fn conditional_edge_consults_the_router() {
        let mut graph = StageGraph::new();
        graph
            .add_stage(Arc::new(NoopStage("fork")))
            .add_stage(Arc::new(NoopStage("left")))
            .add_stage(Arc::new(NoopStage("right")))
            .add_conditional_edge(
                "fork",
                Box::new(|state: &mut PipelineState| {
                    if state.requirement_text.contains("left") {
                        "left".into()
                    } else {
                        "right".into()
                    }
                }),
                vec!["left".into(), "right".into()],
            )
            .add_edge("left", END_STAGE)
            .add_edge("right", END_STAGE)
            .set_entry("fork");
        let compiled = graph.compile().unwrap();

        let mut state = PipelineState::new("go left", "repo");
        assert_eq!(compiled.next_stage("fork", &mut state).as_deref(), Some("left"));
        let mut state = PipelineState::new("anything else", "repo");
        assert_eq!(compiled.next_stage("fork", &mut state).as_deref(), Some("right"));
    }

    #[test]
    fn compile_rejects_dangling_edge_target() {
        let mut graph = StageGraph::new();
        graph
            .add_stage(Arc::new(NoopStage("only")))
            .add_edge("only", "ghost")
            .set_entry("only");
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, CodeflowError::GraphValidation(_)));
    }

    #[test]
    fn compile_rejects_missing_entry() {
        let mut graph = StageGraph::new();
        graph
            .add_stage(Arc::new(NoopStage("only")))
            .add_edge("only", END_STAGE);
        assert!(graph.compile().is_err());
    }

    #[test]
    fn debug_output_names_entry_and_stages() {
        let compiled = two_stage_graph().compile().unwrap();
        let rendered = format!("{compiled:?}");
        assert!(rendered.contains("\"first\""));
        assert!(rendered.contains("\"second\""));
    }

    #[test]
    fn compiled_graph_is_cheaply_shareable() {
        let compiled = two_stage_graph().compile().unwrap();
        let clone = compiled.clone();
        assert_eq!(clone.entry(), compiled.entry());
    }
}
