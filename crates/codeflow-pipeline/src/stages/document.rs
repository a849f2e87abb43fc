//! Grounded explanation, the terminal stage of the read-only branch.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{Decision, PipelineState, Result, Role, StateUpdate};

use crate::graph::Stage;
use crate::stages::DOCUMENT;

pub struct DocumentStage {
    collab: Collaborators,
}

impl DocumentStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    /// Grounded in assembled context when the run has one; a casual request
    /// that skipped indexing answers from the conversation alone.
    fn prompt(state: &PipelineState) -> String {
        let mut prompt = format!("Answer this request: {}\n", state.requirement_text);
        if let Some(context) = &state.context {
            prompt.push_str("Ground the answer strictly in this code:\n");
            for file in &context.files {
                if let Some(code) = &file.current_code {
                    prompt.push_str(&format!("\n--- {} ---\n{}\n", file.path, code));
                }
            }
        }
        if let Some(analysis) = &state.requirement_analysis {
            prompt.push_str(&format!("\nDomain: {}\n", analysis.domain));
        }
        prompt
    }
}

#[async_trait]
impl Stage for DocumentStage {
    fn name(&self) -> &'static str {
        DOCUMENT
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let explanation = self.collab.generator.generate(&Self::prompt(state)).await?;

        state.push_message(Role::Assistant, explanation.clone());
        state.apply(StateUpdate {
            explanation: Some(explanation),
            ..Default::default()
        });
        state.decide(Decision::end("explanation delivered"));
        Ok(())
    }
}
