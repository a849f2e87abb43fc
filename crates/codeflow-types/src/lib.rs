//! Shared types, errors, and the pipeline state record for the Codeflow engine.
//!
//! This crate provides the foundational types used across all other Codeflow crates:
//! - `CodeflowError` — unified error taxonomy
//! - `PipelineState` — the accumulating record threaded through every stage
//! - `Decision` — the tagged outcome every stage returns
//! - `ScopeProposal` / `Candidate` / `StructuredContext` — scope discovery model

pub mod decision;
pub mod error;
pub mod scope;
pub mod settings;
pub mod state;

pub use decision::{Decision, HumanQuestion};
pub use error::{CodeflowError, Result};
pub use scope::{
    ActionKind, Candidate, CodeUnit, Complexity, DomainContext, FileAction, FileContext,
    ScopeProposal, StructuredContext, TargetSubUnit, UnitKind,
};
pub use settings::Settings;
pub use state::{
    BuildReport, ChatMessage, FileEdit, GeneratedEdits, IndexingResult, IssueSeverity,
    PipelineState, RequirementAnalysis, Review, ReviewIssue, Role, RunStatus, StateUpdate,
    TestReport, WorkspaceRef,
};
