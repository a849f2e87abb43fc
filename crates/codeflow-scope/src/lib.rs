//! Scope discovery and context assembly.
//!
//! Given a requirement summary and its inferred domain, this crate decides
//! the minimal bounded set of files a run should see and edit:
//! three independent search strategies unioned and expanded
//! ([`selector`]), an adaptively-thresholded similarity cutoff
//! ([`threshold`]), an LLM-delegated final selection with an explicit
//! degraded path ([`proposal`]), and exact per-file context resolution
//! ([`assembler`]).

pub mod assembler;
pub mod proposal;
pub mod selector;
pub mod threshold;

pub use assembler::{assemble_context, AssembledContext};
pub use proposal::{extract_json, fallback_proposal, parse_proposal, propose_scope, ProposalOutcome};
pub use selector::{discover_candidates, parse_domain_filter};
pub use threshold::{adaptive_threshold, SIGNIFICANT_GAP, THRESHOLD_CEILING, THRESHOLD_FLOOR};
