//! The decision protocol: the tagged outcome every pipeline stage returns.
//!
//! A stage produces exactly one [`Decision`] per execution, never partially
//! filled. Routers translate the decision into the next stage name; the
//! mapping itself lives in the pipeline crate.

use serde::{Deserialize, Serialize};

/// A question for the human, carried by [`Decision::AskHuman`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanQuestion {
    pub prompt: String,
    /// Explicit resumption options, e.g. "split the task" or "retry with guidance".
    pub options: Vec<String>,
}

/// The tagged outcome a stage returns, driving routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Continue to the next stage in the canonical order.
    Proceed { explanation: String },
    /// Re-enter the generation stage, gated by the escalation controller.
    Retry { explanation: String },
    /// Pause the run and hand control to the human.
    AskHuman {
        explanation: String,
        questions: Vec<HumanQuestion>,
    },
    /// A fault the stage could not recover from.
    Error { explanation: String },
    /// Terminal: the run is complete.
    End { explanation: String },
}

impl Decision {
    pub fn proceed(explanation: impl Into<String>) -> Self {
        Decision::Proceed {
            explanation: explanation.into(),
        }
    }

    pub fn retry(explanation: impl Into<String>) -> Self {
        Decision::Retry {
            explanation: explanation.into(),
        }
    }

    pub fn ask_human(explanation: impl Into<String>, questions: Vec<HumanQuestion>) -> Self {
        Decision::AskHuman {
            explanation: explanation.into(),
            questions,
        }
    }

    pub fn error(explanation: impl Into<String>) -> Self {
        Decision::Error {
            explanation: explanation.into(),
        }
    }

    pub fn end(explanation: impl Into<String>) -> Self {
        Decision::End {
            explanation: explanation.into(),
        }
    }

    /// The human-visible message carried by any variant.
    pub fn explanation(&self) -> &str {
        match self {
            Decision::Proceed { explanation }
            | Decision::Retry { explanation }
            | Decision::AskHuman { explanation, .. }
            | Decision::Error { explanation }
            | Decision::End { explanation } => explanation,
        }
    }

    /// The variant name as used in logs and routing traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Proceed { .. } => "proceed",
            Decision::Retry { .. } => "retry",
            Decision::AskHuman { .. } => "ask_human",
            Decision::Error { .. } => "error",
            Decision::End { .. } => "end",
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Decision::proceed("")
    }
}
