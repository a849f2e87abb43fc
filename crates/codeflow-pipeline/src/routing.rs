//! Decision-to-stage routing.
//!
//! Every stage ends by producing exactly one decision; the routers here
//! translate it into the next stage name. The mapping is fixed: PROCEED
//! continues along the canonical order, RETRY re-enters generation (gated
//! by the escalation controller), ASK_HUMAN and ERROR go to the pause
//! stage, END terminates. Branch points are conditional edges, not special
//! cases inside stages, so they stay centrally testable.

use codeflow_types::{Decision, PipelineState};

use crate::graph::{Router, END_STAGE};
use crate::stages::{DISCOVER, DOCUMENT, INDEX, PAUSE};

/// The default mapping for a stage whose PROCEED successor is fixed.
/// RETRY is not expected on these edges and is treated as an escalation.
pub fn gate_router(proceed_to: &'static str) -> Router {
    Box::new(move |state: &mut PipelineState| match &state.last_decision {
        Decision::Proceed { .. } => proceed_to.to_string(),
        Decision::AskHuman { .. } | Decision::Error { .. } | Decision::Retry { .. } => {
            PAUSE.to_string()
        }
        Decision::End { .. } => END_STAGE.to_string(),
    })
}

/// Branch point after requirement analysis: casual conversation answers
/// directly on the explanation branch without touching the workspace;
/// everything else goes through indexing first.
pub fn classification_router() -> Router {
    Box::new(|state: &mut PipelineState| {
        if !matches!(state.last_decision, Decision::Proceed { .. }) {
            return PAUSE.to_string();
        }
        match state.requirement_analysis.as_ref() {
            Some(analysis) if analysis.is_casual && !analysis.needs_code_context => {
                DOCUMENT.to_string()
            }
            Some(_) => INDEX.to_string(),
            None => PAUSE.to_string(),
        }
    })
}

/// Branch point after indexing: the read-only explanation branch ends in
/// documentation; a code-modifying requirement continues into scope
/// discovery.
pub fn post_index_router() -> Router {
    Box::new(|state: &mut PipelineState| {
        if !matches!(state.last_decision, Decision::Proceed { .. }) {
            return PAUSE.to_string();
        }
        match state.requirement_analysis.as_ref() {
            Some(analysis) if analysis.modifies_code => DISCOVER.to_string(),
            Some(_) => DOCUMENT.to_string(),
            None => PAUSE.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_types::RequirementAnalysis;

    fn analysis(modifies_code: bool, is_casual: bool) -> RequirementAnalysis {
        RequirementAnalysis {
            task_type: if modifies_code { "change" } else { "explain" }.into(),
            domain: "order".into(),
            confidence: 0.95,
            open_questions: vec![],
            modifies_code,
            needs_code_context: !is_casual,
            is_casual,
        }
    }

    fn state_with(analysis_value: Option<RequirementAnalysis>, decision: Decision) -> PipelineState {
        let mut state = PipelineState::new("req", "repo");
        state.requirement_analysis = analysis_value;
        state.decide(decision);
        state
    }

    #[test]
    fn gate_router_maps_each_decision() {
        let router = gate_router("generate");

        let mut state = state_with(None, Decision::proceed("ok"));
        assert_eq!(router(&mut state), "generate");

        let mut state = state_with(None, Decision::ask_human("q", vec![]));
        assert_eq!(router(&mut state), PAUSE);

        let mut state = state_with(None, Decision::error("fault"));
        assert_eq!(router(&mut state), PAUSE);

        let mut state = state_with(None, Decision::end("done"));
        assert_eq!(router(&mut state), END_STAGE);
    }

    #[test]
    fn classification_sends_code_tasks_to_indexing() {
        let router = classification_router();
        let mut state = state_with(Some(analysis(true, false)), Decision::proceed("classified"));
        assert_eq!(router(&mut state), INDEX);
    }

    #[test]
    fn classification_answers_casual_chat_directly() {
        let router = classification_router();
        let mut state = state_with(Some(analysis(false, true)), Decision::proceed("classified"));
        assert_eq!(router(&mut state), DOCUMENT);
    }

    #[test]
    fn classification_pauses_on_ask_human() {
        let router = classification_router();
        let mut state = state_with(
            Some(analysis(true, false)),
            Decision::ask_human("ambiguous requirement", vec![]),
        );
        assert_eq!(router(&mut state), PAUSE);
    }

    #[test]
    fn post_index_splits_read_and_write_branches() {
        let router = post_index_router();

        let mut state = state_with(Some(analysis(true, false)), Decision::proceed("indexed"));
        assert_eq!(router(&mut state), DISCOVER);

        let mut state = state_with(Some(analysis(false, false)), Decision::proceed("indexed"));
        assert_eq!(router(&mut state), DOCUMENT);
    }

    #[test]
    fn missing_analysis_pauses_rather_than_guessing() {
        let router = post_index_router();
        let mut state = state_with(None, Decision::proceed("indexed"));
        assert_eq!(router(&mut state), PAUSE);
    }
}
