//! The canonical pipeline stages.
//!
//! Each stage consumes and produces the shared run state, recording exactly
//! one decision per execution. Human-visible failure messages are assembled
//! inside the stage that detected the condition, remediation options
//! included; routing never invents messages.

mod analyze;
mod assemble;
mod build_validate;
mod discover;
mod document;
mod generate;
mod index;
mod pause;
mod publish;
mod review;

pub use analyze::AnalyzeStage;
pub use assemble::AssembleStage;
pub use build_validate::BuildValidateStage;
pub use discover::DiscoverStage;
pub use document::DocumentStage;
pub use generate::GenerateStage;
pub use index::IndexStage;
pub use pause::PauseStage;
pub use publish::PublishStage;
pub use review::ReviewStage;
pub use run_tests::RunTestsStage;

// Stage names are routing identifiers; keep them in one place.
pub const ANALYZE: &str = "analyze";
pub const INDEX: &str = "index";
pub const DISCOVER: &str = "discover";
pub const ASSEMBLE: &str = "assemble";
pub const GENERATE: &str = "generate";
pub const BUILD_VALIDATE: &str = "build_validate";
pub const RUN_TESTS: &str = "run_tests";
pub const REVIEW: &str = "review";
pub const PUBLISH: &str = "publish";
pub const DOCUMENT: &str = "document";
pub const PAUSE: &str = "pause";

use codeflow_types::{CodeflowError, PipelineState, Result, WorkspaceRef};

// One fence-stripping JSON extractor for every stage that parses
// generation output.
pub(crate) use codeflow_scope::extract_json;

/// A stage that runs after indexing can rely on the workspace being on the
/// state; its absence is a wiring fault, not a user-facing condition.
pub(crate) fn require_workspace(state: &PipelineState, stage: &str) -> Result<WorkspaceRef> {
    state
        .workspace
        .clone()
        .ok_or_else(|| CodeflowError::StageFault {
            stage: stage.to_string(),
            message: "no workspace on state".into(),
        })
}
