//! Context assembly for the approved scope.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_scope::assemble_context;
use codeflow_types::{
    CodeflowError, Decision, HumanQuestion, PipelineState, Result, Settings, StateUpdate,
};

use crate::graph::Stage;
use crate::stages::{require_workspace, ASSEMBLE};

pub struct AssembleStage {
    collab: Collaborators,
    settings: Settings,
}

impl AssembleStage {
    pub fn new(collab: Collaborators, settings: Settings) -> Self {
        Self { collab, settings }
    }
}

#[async_trait]
impl Stage for AssembleStage {
    fn name(&self) -> &'static str {
        ASSEMBLE
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let workspace = require_workspace(state, ASSEMBLE)?;
        let scope = state.scope.clone().ok_or_else(|| CodeflowError::StageFault {
            stage: ASSEMBLE.into(),
            message: "no scope proposal on state".into(),
        })?;
        let domain = state
            .requirement_analysis
            .as_ref()
            .map(|a| a.domain.clone())
            .unwrap_or_default();

        let assembled =
            assemble_context(&self.collab, &workspace, &state.repo_ref, &domain, &scope).await?;
        let confidence = assembled.context.confidence;

        // Generating against partially-unknown context risks incorrect
        // output; below the floor the run asks instead of proceeding.
        let decision = if confidence < self.settings.confidence_floor {
            Decision::ask_human(
                format!(
                    "context resolved for {} of {} file(s) (confidence {:.2}, floor {:.2}). \
                     Unresolved: {}",
                    assembled.context.files.len(),
                    scope.total_files(),
                    confidence,
                    self.settings.confidence_floor,
                    assembled.unresolved.join(", ")
                ),
                vec![HumanQuestion {
                    prompt: "Drop the unresolved files from scope, or fix their paths?".into(),
                    options: vec!["drop unresolved files".into(), "correct the paths".into()],
                }],
            )
        } else {
            Decision::proceed(format!(
                "assembled context for {} file(s), confidence {:.2}",
                assembled.context.files.len(),
                confidence
            ))
        };

        state.apply(StateUpdate {
            context: Some(assembled.context),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}
