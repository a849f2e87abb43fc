//! The pause stage: every "needs human input" route lands here.
//!
//! Pausing is a status transition, not a blocking wait. The stage records
//! the question (or failure) in the conversation and sets the run status;
//! the caller persists the state and re-invokes the engine later with the
//! human's reply.

use async_trait::async_trait;

use codeflow_types::{Decision, PipelineState, Result, Role, RunStatus};

use crate::graph::Stage;
use crate::stages::PAUSE;

pub struct PauseStage;

#[async_trait]
impl Stage for PauseStage {
    fn name(&self) -> &'static str {
        PAUSE
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let mut message = state.last_decision.explanation().to_string();
        if let Decision::AskHuman { questions, .. } = &state.last_decision {
            for question in questions {
                message.push_str(&format!("\n{}", question.prompt));
                if !question.options.is_empty() {
                    message.push_str(&format!(" [{}]", question.options.join(" | ")));
                }
            }
        }
        state.push_message(Role::Assistant, message);

        state.status = match state.last_decision {
            Decision::Error { .. } => RunStatus::Failed,
            _ => RunStatus::Paused,
        };
        tracing::info!(status = ?state.status, "run suspended");
        Ok(())
    }
}
