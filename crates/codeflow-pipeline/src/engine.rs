//! The run loop: drive the compiled graph from entry to completion or
//! suspension.
//!
//! Execution is strictly sequential per run. Stage faults never escape:
//! a stage `Err` becomes an error decision routed through the pause stage
//! with the run marked failed. The engine itself raises only for
//! graph-level wiring defects, which validation rules out for the
//! canonical graph.

use std::sync::Arc;

use tokio::sync::broadcast;

use codeflow_collab::Collaborators;
use codeflow_types::{Decision, PipelineState, Result, Role, RunStatus, Settings};

use crate::escalation::{route_gated, AttemptField};
use crate::events::{ProgressEmitter, ProgressEvent};
use crate::graph::{CompiledGraph, Stage, StageGraph, END_STAGE};
use crate::routing::{classification_router, gate_router, post_index_router};
use crate::stages::{
    AnalyzeStage, AssembleStage, BuildValidateStage, DiscoverStage, DocumentStage, GenerateStage,
    IndexStage, PauseStage, PublishStage, ReviewStage, RunTestsStage, ANALYZE, ASSEMBLE,
    BUILD_VALIDATE, DISCOVER, DOCUMENT, GENERATE, INDEX, PAUSE, PUBLISH, REVIEW, RUN_TESTS,
};

// ---------------------------------------------------------------------------
// Canonical graph
// ---------------------------------------------------------------------------

/// Wire the canonical stage graph: a classification branch into a read-only
/// explanation path and a full edit path, with escalation-gated edges
/// leaving build-validate, run-tests, and review.
pub fn canonical_graph(collab: Collaborators, settings: Settings) -> Result<CompiledGraph> {
    let max_attempts = settings.max_attempts;
    let mut graph = StageGraph::new();
    graph
        .add_stage(Arc::new(AnalyzeStage::new(collab.clone())))
        .add_stage(Arc::new(IndexStage::new(collab.clone())))
        .add_stage(Arc::new(DiscoverStage::new(collab.clone(), settings.clone())))
        .add_stage(Arc::new(AssembleStage::new(collab.clone(), settings)))
        .add_stage(Arc::new(GenerateStage::new(collab.clone())))
        .add_stage(Arc::new(BuildValidateStage::new(collab.clone())))
        .add_stage(Arc::new(RunTestsStage::new(collab.clone())))
        .add_stage(Arc::new(ReviewStage::new(collab.clone())))
        .add_stage(Arc::new(PublishStage::new(collab.clone())))
        .add_stage(Arc::new(DocumentStage::new(collab)))
        .add_stage(Arc::new(PauseStage))
        .set_entry(ANALYZE);

    graph.add_conditional_edge(
        ANALYZE,
        classification_router(),
        vec![INDEX.into(), DOCUMENT.into(), PAUSE.into()],
    );
    graph.add_conditional_edge(
        INDEX,
        post_index_router(),
        vec![DISCOVER.into(), DOCUMENT.into(), PAUSE.into()],
    );
    graph.add_conditional_edge(
        DISCOVER,
        gate_router(ASSEMBLE),
        vec![ASSEMBLE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_conditional_edge(
        ASSEMBLE,
        gate_router(GENERATE),
        vec![GENERATE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_conditional_edge(
        GENERATE,
        gate_router(BUILD_VALIDATE),
        vec![BUILD_VALIDATE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_conditional_edge(
        BUILD_VALIDATE,
        Box::new(move |state: &mut PipelineState| {
            route_gated(state, AttemptField::Build, max_attempts, RUN_TESTS)
        }),
        vec![RUN_TESTS.into(), GENERATE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_conditional_edge(
        RUN_TESTS,
        Box::new(move |state: &mut PipelineState| {
            route_gated(state, AttemptField::Build, max_attempts, REVIEW)
        }),
        vec![REVIEW.into(), GENERATE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_conditional_edge(
        REVIEW,
        Box::new(move |state: &mut PipelineState| {
            route_gated(state, AttemptField::Review, max_attempts, PUBLISH)
        }),
        vec![PUBLISH.into(), GENERATE.into(), PAUSE.into(), END_STAGE.into()],
    );
    graph.add_edge(PUBLISH, END_STAGE);
    graph.add_edge(DOCUMENT, END_STAGE);
    // Satisfies the outgoing-path rule; never taken, since the engine stops
    // once the status leaves Running.
    graph.add_edge(PAUSE, END_STAGE);

    graph.compile()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives pipeline runs over one shared compiled graph.
pub struct Engine {
    graph: CompiledGraph,
    settings: Settings,
    emitter: ProgressEmitter,
}

impl Engine {
    /// Build an engine over the canonical graph. The graph is compiled once
    /// here and shared read-only across runs.
    pub fn new(collab: Collaborators, settings: Settings) -> Result<Self> {
        Ok(Self {
            graph: canonical_graph(collab, settings.clone())?,
            settings,
            emitter: ProgressEmitter::default(),
        })
    }

    /// Subscribe to per-transition progress notifications.
    pub fn events(&self) -> broadcast::Receiver<ProgressEvent> {
        self.emitter.subscribe()
    }

    /// Begin a fresh run.
    pub async fn start(
        &self,
        requirement_text: impl Into<String>,
        repo_ref: impl Into<String>,
    ) -> PipelineState {
        let state = PipelineState::new(requirement_text, repo_ref);
        let entry = self.graph.entry().to_string();
        self.drive(state, entry).await
    }

    /// Re-enter a paused run with the human's reply appended to the
    /// conversation. Resumption re-enters the stage that asked (or the
    /// generation stage after a retry-ceiling escalation); counters are
    /// never reset.
    pub async fn resume(&self, mut state: PipelineState, human_reply: &str) -> PipelineState {
        state.push_message(Role::User, human_reply);
        state.status = RunStatus::Running;
        let entry = state
            .resume_stage
            .take()
            .filter(|stage| self.graph.has_stage(stage))
            .unwrap_or_else(|| self.graph.entry().to_string());
        tracing::info!(conversation = %state.conversation_id, %entry, "resuming run");
        self.drive(state, entry).await
    }

    async fn drive(&self, mut state: PipelineState, entry: String) -> PipelineState {
        let mut current = entry;
        let mut steps = 0usize;

        loop {
            if current == END_STAGE {
                state.status = RunStatus::Completed;
                break;
            }

            steps += 1;
            if steps > self.settings.max_steps {
                state.decide(Decision::error(format!(
                    "run exceeded the step limit of {}",
                    self.settings.max_steps
                )));
                state.status = RunStatus::Failed;
                break;
            }

            let Some(stage) = self.graph.stage(&current) else {
                // Unreachable on a validated graph.
                state.decide(Decision::error(format!("unknown stage '{current}'")));
                state.status = RunStatus::Failed;
                break;
            };

            self.emitter
                .emit(&current, format!("entering {current}"));
            tracing::debug!(stage = %current, step = steps, "executing stage");

            if let Err(e) = stage.run(&mut state).await {
                // Stage-internal fault: convert, never propagate. Transient
                // collaborator faults stay resumable at the faulting stage;
                // terminal ones (missing toolchain, unreachable workspace)
                // advertise no resume point.
                tracing::error!(stage = %current, error = %e, "stage fault");
                let explanation = if e.is_retryable() {
                    format!("{current}: {e} (transient; resuming retries this stage)")
                } else {
                    format!("{current}: {e}")
                };
                if !e.is_terminal() {
                    state.resume_stage.get_or_insert(current.clone());
                }
                state.decide(Decision::error(explanation));
                state.status = RunStatus::Failed;
                if current != PAUSE {
                    // Let the pause stage record the failure message.
                    let _ = PauseStage.run(&mut state).await;
                    state.status = RunStatus::Failed;
                }
                break;
            }

            if state.status != RunStatus::Running {
                break;
            }

            let Some(next) = self.graph.next_stage(&current, &mut state) else {
                state.decide(Decision::error(format!("no edge out of '{current}'")));
                state.status = RunStatus::Failed;
                break;
            };

            // Remember where to re-enter when the human replies, unless the
            // escalation controller already chose the generation stage.
            if next == PAUSE && state.resume_stage.is_none() {
                state.resume_stage = Some(current.clone());
            }

            tracing::debug!(from = %current, to = %next, decision = state.last_decision.kind(), "transition");
            current = next;
        }

        self.emitter.emit(
            &current,
            format!("run {:?}: {}", state.status, state.last_decision.explanation()),
        );
        state
    }
}
