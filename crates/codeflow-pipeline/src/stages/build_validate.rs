//! Build validation of the edited workspace.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{Decision, PipelineState, Result, StateUpdate};

use crate::graph::Stage;
use crate::stages::{require_workspace, BUILD_VALIDATE};

pub struct BuildValidateStage {
    collab: Collaborators,
}

impl BuildValidateStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }
}

#[async_trait]
impl Stage for BuildValidateStage {
    fn name(&self) -> &'static str {
        BUILD_VALIDATE
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let workspace = require_workspace(state, BUILD_VALIDATE)?;
        let report = self.collab.builder.build_and_verify(&workspace).await?;

        let decision = if report.success {
            Decision::proceed("build green")
        } else {
            tracing::warn!("build failed");
            Decision::retry(format!("build failed:\n{}", report.error_log))
        };

        state.apply(StateUpdate {
            build: Some(report),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}
