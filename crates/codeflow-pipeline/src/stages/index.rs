//! Workspace checkout and code indexing.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{Decision, IndexingResult, PipelineState, Result, StateUpdate};

use crate::graph::Stage;
use crate::stages::INDEX;

const DEFAULT_BRANCH: &str = "main";

pub struct IndexStage {
    collab: Collaborators,
}

impl IndexStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }
}

#[async_trait]
impl Stage for IndexStage {
    fn name(&self) -> &'static str {
        INDEX
    }

    // An unreachable workspace is fatal: the error propagates and the
    // engine fails the run.
    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let workspace = self
            .collab
            .source
            .materialize_workspace(&state.repo_ref, DEFAULT_BRANCH)
            .await?;
        let summary = self.collab.indexer.index(&workspace, &state.repo_ref).await?;

        tracing::info!(
            workspace = %workspace.0,
            units = summary.indexed_units,
            duration_ms = summary.duration_ms,
            "indexing complete"
        );

        state.apply(StateUpdate {
            workspace: Some(workspace.clone()),
            indexing: Some(IndexingResult {
                workspace,
                indexed_units: summary.indexed_units,
                duration_ms: summary.duration_ms,
            }),
            ..Default::default()
        });
        state.decide(Decision::proceed(format!(
            "indexed {} unit(s)",
            summary.indexed_units
        )));
        Ok(())
    }
}
