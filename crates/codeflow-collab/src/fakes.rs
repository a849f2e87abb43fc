//! Deterministic in-memory collaborator implementations.
//!
//! These back the test suites and the CLI demo: scripted generation,
//! fixed search hits, an in-memory code graph and source tree, and a
//! builder that can be told to fail a number of times before succeeding.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use codeflow_types::{
    BuildReport, CodeUnit, CodeflowError, FileEdit, Result, TestReport, WorkspaceRef,
};

use crate::traits::{
    BuildRunner, CodeGraph, CodeIndexer, Collaborators, Embedder, IndexSummary, Publisher,
    SearchHit, SearchIndex, SourceControl, TestRunner, TextGenerator,
};

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Plays back queued responses in order and records every prompt it saw.
/// Returns an error once the script is exhausted so tests fail loudly on
/// unexpected extra calls.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CodeflowError::GenerationFailed {
                stage: "scripted".into(),
                message: "script exhausted".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedding: a small vector derived from the input bytes.
/// Identical text always embeds identically, which is all the selector
/// idempotence tests need.
pub struct HashEmbedder {
    pub dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 8 }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dim] += f32::from(b) / 255.0;
        }
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// StaticSearchIndex
// ---------------------------------------------------------------------------

/// Returns a fixed hit list regardless of the query vector, truncated to
/// `top_n`.
pub struct StaticSearchIndex {
    hits: Vec<SearchHit>,
}

impl StaticSearchIndex {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self { hits: Vec::new() }
    }
}

#[async_trait]
impl SearchIndex for StaticSearchIndex {
    async fn search(&self, _vector: &[f32], _repo: &str, top_n: usize) -> Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(top_n).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// InMemoryGraph
// ---------------------------------------------------------------------------

/// A code knowledge graph held in memory. Dependents are derived from the
/// dependency lists of the registered units.
#[derive(Default)]
pub struct InMemoryGraph {
    units: Vec<CodeUnit>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: CodeUnit) -> Self {
        self.units.push(unit);
        self
    }

    fn by_id(&self, unit_id: &str) -> Option<&CodeUnit> {
        self.units.iter().find(|u| u.id == unit_id)
    }

    fn by_qualified_name(&self, name: &str) -> Option<&CodeUnit> {
        self.units.iter().find(|u| u.qualified_name == name)
    }
}

#[async_trait]
impl CodeGraph for InMemoryGraph {
    async fn unit(&self, unit_id: &str, _repo: &str) -> Result<Option<CodeUnit>> {
        Ok(self.by_id(unit_id).cloned())
    }

    async fn find_unit(&self, qualified_name: &str, _repo: &str) -> Result<Option<CodeUnit>> {
        Ok(self.by_qualified_name(qualified_name).cloned())
    }

    async fn units_in_domain(&self, domain: &str, _repo: &str) -> Result<Vec<CodeUnit>> {
        Ok(self
            .units
            .iter()
            .filter(|u| u.domain == domain)
            .cloned()
            .collect())
    }

    async fn direct_dependencies(&self, unit_id: &str, _repo: &str) -> Result<Vec<CodeUnit>> {
        let unit = self
            .by_id(unit_id)
            .ok_or_else(|| CodeflowError::GraphQueryFailed {
                unit: unit_id.to_string(),
                message: "unknown unit".into(),
            })?;
        Ok(unit
            .dependencies
            .iter()
            .filter_map(|name| self.by_qualified_name(name).cloned())
            .collect())
    }

    async fn direct_dependents(&self, unit_id: &str, _repo: &str) -> Result<Vec<CodeUnit>> {
        let unit = self
            .by_id(unit_id)
            .ok_or_else(|| CodeflowError::GraphQueryFailed {
                unit: unit_id.to_string(),
                message: "unknown unit".into(),
            })?;
        Ok(self
            .units
            .iter()
            .filter(|u| u.dependencies.contains(&unit.qualified_name))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// InMemorySource
// ---------------------------------------------------------------------------

/// An in-memory source tree. `materialize_workspace` always succeeds and
/// yields a handle derived from the repo ref; edits land in the shared map.
#[derive(Default)]
pub struct InMemorySource {
    files: Mutex<HashMap<String, String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.into());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl SourceControl for InMemorySource {
    async fn materialize_workspace(&self, repo: &str, branch: &str) -> Result<WorkspaceRef> {
        Ok(WorkspaceRef(format!("ws:{repo}@{branch}")))
    }

    async fn read_file(&self, _workspace: &WorkspaceRef, path: &str) -> Result<Option<String>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn apply_edits(&self, _workspace: &WorkspaceRef, edits: &[FileEdit]) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        for edit in edits {
            files.insert(edit.path.clone(), edit.content.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticIndexer
// ---------------------------------------------------------------------------

pub struct StaticIndexer {
    pub units: usize,
}

#[async_trait]
impl CodeIndexer for StaticIndexer {
    async fn index(&self, _workspace: &WorkspaceRef, _repo: &str) -> Result<IndexSummary> {
        Ok(IndexSummary {
            indexed_units: self.units,
            duration_ms: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// FlakyBuilder
// ---------------------------------------------------------------------------

/// Fails the first `failures` build attempts with a fixed error log, then
/// succeeds forever after.
pub struct FlakyBuilder {
    failures: usize,
    calls: AtomicUsize,
    error_log: String,
}

impl FlakyBuilder {
    pub fn new(failures: usize, error_log: impl Into<String>) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            error_log: error_log.into(),
        }
    }

    pub fn always_green() -> Self {
        Self::new(0, "")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildRunner for FlakyBuilder {
    async fn build_and_verify(&self, _workspace: &WorkspaceRef) -> Result<BuildReport> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Ok(BuildReport {
                success: false,
                error_log: self.error_log.clone(),
            })
        } else {
            Ok(BuildReport {
                success: true,
                error_log: String::new(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedTestRunner
// ---------------------------------------------------------------------------

/// Plays back queued test reports; once exhausted every run passes.
pub struct ScriptedTestRunner {
    reports: Mutex<VecDeque<TestReport>>,
}

impl ScriptedTestRunner {
    pub fn new(reports: Vec<TestReport>) -> Self {
        Self {
            reports: Mutex::new(reports.into()),
        }
    }

    pub fn all_green() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TestRunner for ScriptedTestRunner {
    async fn run_tests(&self, _workspace: &WorkspaceRef) -> Result<TestReport> {
        Ok(self
            .reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TestReport {
                passed: 1,
                failed: 0,
                failed_names: vec![],
                log: String::new(),
            }))
    }
}

// ---------------------------------------------------------------------------
// StaticPublisher
// ---------------------------------------------------------------------------

/// Records every published change request and returns a synthetic URL.
#[derive(Default)]
pub struct StaticPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl StaticPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(branch, description)` pairs, in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for StaticPublisher {
    async fn open_change_request(
        &self,
        _workspace: &WorkspaceRef,
        branch: &str,
        description: &str,
    ) -> Result<String> {
        self.published
            .lock()
            .unwrap()
            .push((branch.to_string(), description.to_string()));
        Ok(format!("https://git.example.com/pr/{branch}"))
    }
}

// ---------------------------------------------------------------------------
// Assembly helper
// ---------------------------------------------------------------------------

/// A full collaborator bundle wired to the fakes, with scripted generation
/// responses. Handy default for tests and the CLI demo.
pub fn scripted_collaborators(responses: Vec<String>) -> Collaborators {
    Collaborators {
        generator: Arc::new(ScriptedGenerator::new(responses)),
        embedder: Arc::new(HashEmbedder::default()),
        search: Arc::new(StaticSearchIndex::empty()),
        graph: Arc::new(InMemoryGraph::new()),
        source: Arc::new(InMemorySource::new()),
        indexer: Arc::new(StaticIndexer { units: 0 }),
        builder: Arc::new(FlakyBuilder::always_green()),
        tester: Arc::new(ScriptedTestRunner::all_green()),
        publisher: Arc::new(StaticPublisher::new()),
    }
}
