//! Collaborator capability contracts consumed by the Codeflow engine.
//!
//! Every external capability (text generation, embedding, search, graph
//! queries, source checkout, build, test, publish) is a narrow async trait.
//! The engine owns none of them; implementations are expected to carry
//! their own timeouts and surface failure as a [`codeflow_types::CodeflowError`]
//! rather than hang a stage.
//!
//! The [`fakes`] module provides deterministic in-memory implementations
//! used by the test suites and the CLI demo.

pub mod fakes;
pub mod traits;

pub use traits::{
    BuildRunner, CodeGraph, CodeIndexer, Collaborators, Embedder, IndexSummary, Publisher,
    SearchHit, SearchIndex, SourceControl, TestRunner, TextGenerator,
};
