//! The capability traits, one per external collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use codeflow_types::{BuildReport, CodeUnit, FileEdit, Result, TestReport, WorkspaceRef};

// ---------------------------------------------------------------------------
// Wire-adjacent result types
// ---------------------------------------------------------------------------

/// One similarity-search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub snippet: String,
    pub symbol_name: String,
}

/// Result of (re)building the unit index for a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub indexed_units: usize,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Text generation. Used by requirement analysis, scope discovery,
/// code generation, review, and documentation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Embedding for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Vector/text search over the indexed corpus.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, vector: &[f32], repo: &str, top_n: usize) -> Result<Vec<SearchHit>>;
}

/// Dependency queries against the code knowledge graph. Domain metadata
/// lives with the graph store, so the domain-filter strategy queries here
/// too; whether one store or two back this trait is a deployment choice.
#[async_trait]
pub trait CodeGraph: Send + Sync {
    async fn unit(&self, unit_id: &str, repo: &str) -> Result<Option<CodeUnit>>;
    async fn find_unit(&self, qualified_name: &str, repo: &str) -> Result<Option<CodeUnit>>;
    async fn units_in_domain(&self, domain: &str, repo: &str) -> Result<Vec<CodeUnit>>;
    async fn direct_dependencies(&self, unit_id: &str, repo: &str) -> Result<Vec<CodeUnit>>;
    async fn direct_dependents(&self, unit_id: &str, repo: &str) -> Result<Vec<CodeUnit>>;
}

/// Source checkout, file access, and edit application.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn materialize_workspace(&self, repo: &str, branch: &str) -> Result<WorkspaceRef>;
    /// Exact current content of a file, or `None` if it does not exist.
    async fn read_file(&self, workspace: &WorkspaceRef, path: &str) -> Result<Option<String>>;
    async fn apply_edits(&self, workspace: &WorkspaceRef, edits: &[FileEdit]) -> Result<()>;
}

/// (Re)build the unit index for a workspace. Implementations are free to
/// parse files with a bounded worker pool; the stage sees one merged result.
#[async_trait]
pub trait CodeIndexer: Send + Sync {
    async fn index(&self, workspace: &WorkspaceRef, repo: &str) -> Result<IndexSummary>;
}

/// Compile/validate the workspace.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn build_and_verify(&self, workspace: &WorkspaceRef) -> Result<BuildReport>;
}

/// Execute the test suite.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self, workspace: &WorkspaceRef) -> Result<TestReport>;
}

/// Open a change request (PR) from the workspace.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn open_change_request(
        &self,
        workspace: &WorkspaceRef,
        branch: &str,
        description: &str,
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Collaborators bundle
// ---------------------------------------------------------------------------

/// Everything a pipeline run consumes from the outside world, bundled so
/// stages share one handle. Cloning clones the `Arc`s, not the backends.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub embedder: Arc<dyn Embedder>,
    pub search: Arc<dyn SearchIndex>,
    pub graph: Arc<dyn CodeGraph>,
    pub source: Arc<dyn SourceControl>,
    pub indexer: Arc<dyn CodeIndexer>,
    pub builder: Arc<dyn BuildRunner>,
    pub tester: Arc<dyn TestRunner>,
    pub publisher: Arc<dyn Publisher>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_hit_round_trip() {
        let hit = SearchHit {
            id: "u1".into(),
            score: 0.93,
            snippet: "fn process(&self)".into(),
            symbol_name: "OrderService.process".into(),
        };
        let json = serde_json::to_string(&hit).unwrap();
        let back: SearchHit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hit);
    }

    #[tokio::test]
    async fn traits_are_object_safe() {
        // Compile-time check that every capability can live behind Arc<dyn _>.
        use crate::fakes;
        let collab = fakes::scripted_collaborators(vec![]);
        let ws = collab
            .source
            .materialize_workspace("acme/orders", "main")
            .await
            .unwrap();
        assert!(collab.source.read_file(&ws, "absent.rs").await.unwrap().is_none());
    }
}
