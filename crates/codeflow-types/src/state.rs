//! `PipelineState` — the accumulating record carried through a whole run.
//!
//! The state is mutable by replacement: each stage receives the current
//! state, applies a [`StateUpdate`], and hands it back. Exactly one stage
//! writes at a time; the caller serializes resumption per conversation id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;
use crate::scope::{ScopeProposal, StructuredContext};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-stage artifacts
// ---------------------------------------------------------------------------

/// Opaque handle to a checked-out source tree, owned by the source-control
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef(pub String);

/// Task attributes inferred from the requirement; the classification router
/// reads these to pick the explanation branch or the full edit branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementAnalysis {
    pub task_type: String,
    pub domain: String,
    pub confidence: f64,
    #[serde(default)]
    pub open_questions: Vec<String>,
    pub modifies_code: bool,
    pub needs_code_context: bool,
    #[serde(default)]
    pub is_casual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResult {
    pub workspace: WorkspaceRef,
    pub indexed_units: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub content: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEdits {
    pub files: Vec<FileEdit>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub success: bool,
    pub error_log: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: usize,
    pub failed: usize,
    pub failed_names: Vec<String>,
    pub log: String,
}

impl TestReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: IssueSeverity,
    pub description: String,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub approved: bool,
    pub issues: Vec<ReviewIssue>,
    pub summary: String,
}

impl Review {
    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical)
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The single record threaded through every stage of a run.
///
/// Counters are monotonically non-decreasing within a run and only move
/// through the escalation controller. The state is the unit of persistence
/// for pause/resume; everything on it serializes to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub conversation_id: Uuid,
    pub requirement_text: String,
    pub repo_ref: String,
    pub conversation_history: Vec<ChatMessage>,

    pub requirement_analysis: Option<RequirementAnalysis>,
    pub workspace: Option<WorkspaceRef>,
    pub indexing: Option<IndexingResult>,
    pub scope: Option<ScopeProposal>,
    pub context: Option<StructuredContext>,
    pub edits: Option<GeneratedEdits>,
    pub build: Option<BuildReport>,
    pub tests: Option<TestReport>,
    pub review: Option<Review>,
    pub change_request_url: Option<String>,
    pub explanation: Option<String>,

    pub build_attempt: u32,
    pub review_attempt: u32,
    pub status: RunStatus,
    pub last_decision: Decision,
    /// Stage a paused run re-enters on resume.
    pub resume_stage: Option<String>,
}

impl PipelineState {
    /// Fresh state for a new run; records the requirement as the first
    /// conversation message.
    pub fn new(requirement_text: impl Into<String>, repo_ref: impl Into<String>) -> Self {
        let requirement_text = requirement_text.into();
        Self {
            conversation_id: Uuid::new_v4(),
            requirement_text: requirement_text.clone(),
            repo_ref: repo_ref.into(),
            conversation_history: vec![ChatMessage::now(Role::User, requirement_text)],
            requirement_analysis: None,
            workspace: None,
            indexing: None,
            scope: None,
            context: None,
            edits: None,
            build: None,
            tests: None,
            review: None,
            change_request_url: None,
            explanation: None,
            build_attempt: 0,
            review_attempt: 0,
            status: RunStatus::Running,
            last_decision: Decision::default(),
            resume_stage: None,
        }
    }

    /// Merge a partial update into the state. Fields absent from the update
    /// are preserved; attempt counters are deliberately not part of
    /// [`StateUpdate`] and only move through the escalation controller.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            requirement_analysis,
            workspace,
            indexing,
            scope,
            context,
            edits,
            build,
            tests,
            review,
            change_request_url,
            explanation,
            resume_stage,
        } = update;
        if let Some(v) = requirement_analysis {
            self.requirement_analysis = Some(v);
        }
        if let Some(v) = workspace {
            self.workspace = Some(v);
        }
        if let Some(v) = indexing {
            self.indexing = Some(v);
        }
        if let Some(v) = scope {
            self.scope = Some(v);
        }
        if let Some(v) = context {
            self.context = Some(v);
        }
        if let Some(v) = edits {
            self.edits = Some(v);
        }
        if let Some(v) = build {
            self.build = Some(v);
        }
        if let Some(v) = tests {
            self.tests = Some(v);
        }
        if let Some(v) = review {
            self.review = Some(v);
        }
        if let Some(v) = change_request_url {
            self.change_request_url = Some(v);
        }
        if let Some(v) = explanation {
            self.explanation = Some(v);
        }
        if let Some(v) = resume_stage {
            self.resume_stage = Some(v);
        }
    }

    pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.conversation_history.push(ChatMessage::now(role, content));
    }

    /// Record the stage's decision on the state.
    pub fn decide(&mut self, decision: Decision) {
        tracing::debug!(
            conversation = %self.conversation_id,
            kind = decision.kind(),
            "stage decision"
        );
        self.last_decision = decision;
    }
}

/// Explicit partial record for state merges: every field optional, attempt
/// counters and status excluded by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub requirement_analysis: Option<RequirementAnalysis>,
    pub workspace: Option<WorkspaceRef>,
    pub indexing: Option<IndexingResult>,
    pub scope: Option<ScopeProposal>,
    pub context: Option<StructuredContext>,
    pub edits: Option<GeneratedEdits>,
    pub build: Option<BuildReport>,
    pub tests: Option<TestReport>,
    pub review: Option<Review>,
    pub change_request_url: Option<String>,
    pub explanation: Option<String>,
    pub resume_stage: Option<String>,
}
