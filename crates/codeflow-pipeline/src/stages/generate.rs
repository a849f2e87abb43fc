//! Code generation: produce file edits for the assembled context and apply
//! them to the workspace.

use async_trait::async_trait;
use serde::Deserialize;

use codeflow_collab::Collaborators;
use codeflow_types::{
    CodeflowError, Decision, FileEdit, GeneratedEdits, PipelineState, Result, StateUpdate,
};

use crate::graph::Stage;
use crate::stages::{extract_json, require_workspace, GENERATE};

pub struct GenerateStage {
    collab: Collaborators,
}

impl GenerateStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    /// The prompt carries the exact in-scope file contents plus whatever
    /// failure evidence earlier attempts produced, so a retry regenerates
    /// against the build log or review issues instead of repeating itself.
    fn prompt(state: &PipelineState) -> String {
        let mut prompt = format!("Implement this change: {}\n", state.requirement_text);

        if let Some(scope) = &state.scope {
            prompt.push_str("Scope:\n");
            for action in scope.all_actions() {
                prompt.push_str(&format!(
                    "- {:?} {} (symbol {}{})\n",
                    action.kind,
                    action.path,
                    action.target_symbol,
                    if action.target_methods.is_empty() {
                        String::new()
                    } else {
                        format!(", methods {}", action.target_methods.join(", "))
                    }
                ));
            }
        }

        if let Some(context) = &state.context {
            for file in &context.files {
                match &file.current_code {
                    Some(code) => prompt.push_str(&format!("\n--- {} ---\n{}\n", file.path, code)),
                    None => prompt.push_str(&format!("\n--- {} (new file) ---\n", file.path)),
                }
            }
        }

        if let Some(build) = state.build.as_ref().filter(|b| !b.success) {
            prompt.push_str(&format!("\nPrevious build failed:\n{}\n", build.error_log));
        }
        if let Some(tests) = state.tests.as_ref().filter(|t| !t.all_passed()) {
            prompt.push_str(&format!(
                "\nFailing tests: {}\n{}\n",
                tests.failed_names.join(", "),
                tests.log
            ));
        }
        if let Some(review) = state.review.as_ref().filter(|r| !r.approved) {
            prompt.push_str("\nReview issues to address:\n");
            for issue in &review.issues {
                prompt.push_str(&format!("- [{:?}] {}\n", issue.severity, issue.description));
            }
        }

        prompt.push_str(
            "\nAnswer with a JSON object: {\"files\": [{\"path\", \"content\", \"summary\"}], \
             \"notes\"}\n",
        );
        prompt
    }
}

#[derive(Debug, Deserialize)]
struct EditsDto {
    files: Vec<FileEdit>,
    #[serde(default)]
    notes: String,
}

#[async_trait]
impl Stage for GenerateStage {
    fn name(&self) -> &'static str {
        GENERATE
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let workspace = require_workspace(state, GENERATE)?;
        let text = self.collab.generator.generate(&Self::prompt(state)).await?;

        // No safe default exists for malformed edit output.
        let dto: EditsDto = extract_json(&text)
            .ok_or_else(|| CodeflowError::MalformedOutput {
                stage: GENERATE.into(),
                message: "no JSON object in generation output".into(),
            })
            .and_then(|json| {
                serde_json::from_str(json).map_err(|e| CodeflowError::MalformedOutput {
                    stage: GENERATE.into(),
                    message: e.to_string(),
                })
            })?;

        if dto.files.is_empty() {
            return Err(CodeflowError::MalformedOutput {
                stage: GENERATE.into(),
                message: "generation produced no file edits".into(),
            });
        }

        self.collab.source.apply_edits(&workspace, &dto.files).await?;
        tracing::info!(files = dto.files.len(), "edits applied to workspace");

        let decision = Decision::proceed(format!("generated edits for {} file(s)", dto.files.len()));
        state.apply(StateUpdate {
            edits: Some(GeneratedEdits {
                files: dto.files,
                notes: dto.notes,
            }),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}
