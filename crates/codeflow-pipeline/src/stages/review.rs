//! Generated-edit review, delegated to a generation call and interpreted
//! structurally.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{
    CodeflowError, Decision, PipelineState, Result, Review, StateUpdate,
};

use crate::graph::Stage;
use crate::stages::{extract_json, REVIEW};

pub struct ReviewStage {
    collab: Collaborators,
}

impl ReviewStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    fn prompt(state: &PipelineState) -> String {
        let mut prompt = format!(
            "Review the following change for: {}\n",
            state.requirement_text
        );
        if let Some(edits) = &state.edits {
            for edit in &edits.files {
                prompt.push_str(&format!("\n--- {} ({}) ---\n{}\n", edit.path, edit.summary, edit.content));
            }
        }
        prompt.push_str(
            "\nAnswer with a JSON object: {\"approved\", \"issues\": [{\"severity\", \
             \"description\", \"file\"}], \"summary\"}\n",
        );
        prompt
    }
}

#[async_trait]
impl Stage for ReviewStage {
    fn name(&self) -> &'static str {
        REVIEW
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let text = self.collab.generator.generate(&Self::prompt(state)).await?;

        // Approving unparseable review output would publish unreviewed
        // code; there is no safe default here.
        let review: Review = extract_json(&text)
            .ok_or_else(|| CodeflowError::MalformedOutput {
                stage: REVIEW.into(),
                message: "no JSON object in review output".into(),
            })
            .and_then(|json| {
                serde_json::from_str(json).map_err(|e| CodeflowError::MalformedOutput {
                    stage: REVIEW.into(),
                    message: e.to_string(),
                })
            })?;

        let decision = if review.approved && !review.has_critical_issues() {
            Decision::proceed(format!("review approved: {}", review.summary))
        } else {
            let issues: Vec<String> = review
                .issues
                .iter()
                .map(|i| format!("[{:?}] {}", i.severity, i.description))
                .collect();
            tracing::warn!(issues = review.issues.len(), "review rejected the change");
            Decision::retry(format!("review rejected:\n{}", issues.join("\n")))
        };

        state.apply(StateUpdate {
            review: Some(review),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}
