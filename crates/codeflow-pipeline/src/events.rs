//! Progress notification for external streaming.
//!
//! The engine invokes the sink once per stage transition with
//! `{stage_name, percent_complete, message}` via a
//! [`tokio::sync::broadcast`] channel; transport beyond that channel is the
//! caller's concern. Emission is fire-and-forget: a run never blocks or
//! fails because nobody is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One stage-transition notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage_name: String,
    pub percent_complete: u8,
    pub message: String,
}

/// Rough completion percentage by canonical stage position. The explanation
/// branch jumps straight to the end; pause reports the point it stopped at.
pub fn stage_percent(stage: &str) -> u8 {
    match stage {
        "analyze" => 10,
        "index" => 20,
        "discover" => 35,
        "assemble" => 45,
        "generate" => 55,
        "build_validate" => 70,
        "run_tests" => 80,
        "review" => 90,
        "publish" => 100,
        "document" => 100,
        _ => 0,
    }
}

/// Broadcast wrapper the engine emits through.
#[derive(Clone)]
pub struct ProgressEmitter {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, stage_name: &str, message: impl Into<String>) {
        let event = ProgressEvent {
            stage_name: stage_name.to_string(),
            percent_complete: stage_percent(stage_name),
            message: message.into(),
        };
        tracing::debug!(stage = %event.stage_name, percent = event.percent_complete, "progress");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_emitted_events() {
        let emitter = ProgressEmitter::new(8);
        let mut rx = emitter.subscribe();
        emitter.emit("analyze", "requirement classified");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.stage_name, "analyze");
        assert_eq!(event.percent_complete, 10);
        assert_eq!(event.message, "requirement classified");
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let emitter = ProgressEmitter::new(8);
        emitter.emit("publish", "change request opened");
    }

    #[test]
    fn percent_is_monotone_along_the_edit_branch() {
        let order = [
            "analyze",
            "index",
            "discover",
            "assemble",
            "generate",
            "build_validate",
            "run_tests",
            "review",
            "publish",
        ];
        for pair in order.windows(2) {
            assert!(stage_percent(pair[0]) < stage_percent(pair[1]));
        }
    }

    #[test]
    fn unknown_stage_reports_zero() {
        assert_eq!(stage_percent("pause"), 0);
    }
}
