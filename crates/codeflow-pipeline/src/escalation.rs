//! Retry/escalation controller for the build-validate and review loops.
//!
//! This is the only place attempt counters move. A RETRY decision re-enters
//! the generation stage while the wrapped stage's counter is below the
//! shared ceiling; at the ceiling it escalates to the human with the
//! concrete failure evidence and explicit resumption options. Counters are
//! never reset or decremented, so a run resumed after an escalation
//! escalates again on the next failure instead of silently looping.

use codeflow_types::{Decision, HumanQuestion, PipelineState};

use crate::stages::{GENERATE, PAUSE};

/// Which attempt counter a gated edge moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptField {
    Build,
    Review,
}

impl AttemptField {
    fn get(self, state: &PipelineState) -> u32 {
        match self {
            AttemptField::Build => state.build_attempt,
            AttemptField::Review => state.review_attempt,
        }
    }

    fn bump(self, state: &mut PipelineState) {
        match self {
            AttemptField::Build => state.build_attempt += 1,
            AttemptField::Review => state.review_attempt += 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AttemptField::Build => "build/test",
            AttemptField::Review => "review",
        }
    }
}

/// Failure evidence for the escalation message: build error log, failed
/// test names, or the review issue list, whichever the state carries.
fn failure_evidence(state: &PipelineState, field: AttemptField) -> String {
    match field {
        AttemptField::Build => {
            if let Some(build) = state.build.as_ref().filter(|b| !b.success) {
                return format!("build error log:\n{}", build.error_log);
            }
            if let Some(tests) = state.tests.as_ref().filter(|t| !t.all_passed()) {
                return format!(
                    "{} test(s) failing: {}",
                    tests.failed,
                    tests.failed_names.join(", ")
                );
            }
            "no failure details recorded".into()
        }
        AttemptField::Review => match state.review.as_ref() {
            Some(review) => {
                let issues: Vec<String> = review
                    .issues
                    .iter()
                    .map(|i| format!("[{:?}] {}", i.severity, i.description))
                    .collect();
                format!("review issues:\n{}", issues.join("\n"))
            }
            None => "no review recorded".into(),
        },
    }
}

fn escalate(state: &mut PipelineState, field: AttemptField, max_attempts: u32) -> String {
    let explanation = format!(
        "{} failed {} time(s), reaching the retry ceiling of {}. {}",
        field.label(),
        field.get(state),
        max_attempts,
        failure_evidence(state, field),
    );
    tracing::warn!(field = field.label(), "retry ceiling reached, escalating");
    state.resume_stage = Some(GENERATE.to_string());
    state.decide(Decision::ask_human(
        explanation,
        vec![HumanQuestion {
            prompt: "How should the run continue?".into(),
            options: vec![
                "provide guidance and retry generation".into(),
                "split the task into smaller changes".into(),
                "abandon the change".into(),
            ],
        }],
    ));
    PAUSE.to_string()
}

/// Route the edge leaving a retry-gated stage.
///
/// PROCEED continues to `proceed_to`. RETRY moves the counter and re-enters
/// generation until the ceiling, then escalates. A counter already at the
/// ceiling (a resumed run failing again) escalates immediately without
/// moving, so `attempt <= max_attempts` holds after any number of
/// transitions.
pub fn route_gated(
    state: &mut PipelineState,
    field: AttemptField,
    max_attempts: u32,
    proceed_to: &str,
) -> String {
    match &state.last_decision {
        Decision::Proceed { .. } => proceed_to.to_string(),
        Decision::Retry { .. } => {
            if field.get(state) >= max_attempts {
                return escalate(state, field, max_attempts);
            }
            field.bump(state);
            if field.get(state) >= max_attempts {
                return escalate(state, field, max_attempts);
            }
            tracing::info!(
                field = field.label(),
                attempt = field.get(state),
                "retrying via generation"
            );
            GENERATE.to_string()
        }
        Decision::AskHuman { .. } | Decision::Error { .. } => PAUSE.to_string(),
        Decision::End { .. } => crate::graph::END_STAGE.to_string(),
    }
}
