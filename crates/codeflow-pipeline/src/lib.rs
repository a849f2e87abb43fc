//! Pipeline graph engine.
//!
//! Compiles named stages and conditional edges into an immutable state
//! machine and drives it: requirement analysis branches into a read-only
//! explanation path or a full edit path (index → discover → assemble →
//! generate → build → test → review → publish), with bounded retry loops,
//! human-in-the-loop pauses, and resumption. See [`engine::Engine`] for the
//! entry points.

pub mod engine;
pub mod escalation;
pub mod events;
pub mod graph;
pub mod routing;
pub mod stages;
pub mod validation;

pub use engine::{canonical_graph, Engine};
pub use escalation::{route_gated, AttemptField};
pub use events::{ProgressEmitter, ProgressEvent};
pub use graph::{CompiledGraph, Router, Stage, StageGraph, END_STAGE};
pub use validation::{validate, Diagnostic, Severity};
