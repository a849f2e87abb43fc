//! Scope discovery model: indexed code units, ranked candidates, the bounded
//! scope proposal, and the structured per-file context handed to generation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Code units and candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Type,
    Method,
    Field,
}

/// An indexed code unit as stored by the graph/search collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: String,
    pub qualified_name: String,
    pub kind: UnitKind,
    pub file_path: String,
    pub domain: String,
    pub purpose: String,
    /// Qualified names of direct one-hop dependencies.
    pub dependencies: Vec<String>,
}

/// A similarity match on a sub-unit (method or field) of an already-selected
/// type. Retained so generation can narrow its edits instead of rewriting
/// the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSubUnit {
    pub name: String,
    pub score: f64,
}

/// An indexed code unit considered for inclusion in scope, with its
/// relevance score and any target sub-unit annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub unit: CodeUnit,
    pub relevance: f64,
    pub target_sub_units: Vec<TargetSubUnit>,
}

impl Candidate {
    pub fn new(unit: CodeUnit, relevance: f64) -> Self {
        Self {
            unit,
            relevance,
            target_sub_units: Vec::new(),
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.unit.qualified_name
    }
}

// ---------------------------------------------------------------------------
// Scope proposal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Modify,
    Create,
}

/// One file the run is permitted to touch, with the symbol-level target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAction {
    pub path: String,
    pub kind: ActionKind,
    pub target_symbol: String,
    #[serde(default)]
    pub target_methods: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// The bounded set of files a run may read and modify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeProposal {
    pub files_to_modify: Vec<FileAction>,
    pub files_to_create: Vec<FileAction>,
    pub test_files: Vec<FileAction>,
    pub reasoning: String,
    pub estimated_complexity: Complexity,
    pub risks: Vec<String>,
}

impl ScopeProposal {
    /// Total file count across modify, create, and test actions. The
    /// discovery stage escalates instead of letting this exceed the ceiling.
    pub fn total_files(&self) -> usize {
        self.files_to_modify.len() + self.files_to_create.len() + self.test_files.len()
    }

    /// All actions in modify, create, test order.
    pub fn all_actions(&self) -> impl Iterator<Item = &FileAction> {
        self.files_to_modify
            .iter()
            .chain(self.files_to_create.iter())
            .chain(self.test_files.iter())
    }
}

// ---------------------------------------------------------------------------
// Structured context
// ---------------------------------------------------------------------------

/// Resolved context for a single in-scope file. Dependencies and dependents
/// are unresolved name lists, not full bodies, to keep per-file context bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContext {
    pub path: String,
    /// `None` marks a file that does not exist yet (a CREATE action).
    pub current_code: Option<String>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub purpose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainContext {
    pub domain: String,
    pub business_rules: Vec<String>,
    pub concepts: Vec<String>,
}

/// Everything the generation stage is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredContext {
    pub files: Vec<FileContext>,
    pub domain: DomainContext,
    /// Successfully-resolved files / total files requested.
    pub confidence: f64,
}
