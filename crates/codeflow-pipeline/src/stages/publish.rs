//! Change-request publication, the terminal stage of the edit branch.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{Decision, PipelineState, Result, Role, StateUpdate};

use crate::graph::Stage;
use crate::stages::{require_workspace, PUBLISH};

pub struct PublishStage {
    collab: Collaborators,
}

impl PublishStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    fn branch_name(state: &PipelineState) -> String {
        let id = state.conversation_id.simple().to_string();
        format!("codeflow/{}", &id[..8])
    }

    fn description(state: &PipelineState) -> String {
        let mut description = format!("Requirement: {}\n", state.requirement_text);
        if let Some(scope) = &state.scope {
            description.push_str(&format!("\n{}\n", scope.reasoning));
        }
        if let Some(edits) = &state.edits {
            description.push_str("\nChanges:\n");
            for edit in &edits.files {
                description.push_str(&format!("- {}: {}\n", edit.path, edit.summary));
            }
        }
        if let Some(tests) = &state.tests {
            description.push_str(&format!("\n{} test(s) passing.\n", tests.passed));
        }
        description
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        PUBLISH
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let workspace = require_workspace(state, PUBLISH)?;
        let branch = Self::branch_name(state);
        let url = self
            .collab
            .publisher
            .open_change_request(&workspace, &branch, &Self::description(state))
            .await?;

        tracing::info!(%url, %branch, "change request opened");
        state.push_message(Role::Assistant, format!("Opened change request: {url}"));
        state.apply(StateUpdate {
            change_request_url: Some(url.clone()),
            ..Default::default()
        });
        state.decide(Decision::end(format!("published {url}")));
        Ok(())
    }
}
