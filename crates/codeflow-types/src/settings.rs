//! Run-wide configuration knobs with their defaults.

use serde::{Deserialize, Serialize};

/// Tunable limits for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Retry ceiling shared by the build-validate and review loops.
    pub max_attempts: u32,
    /// Ceiling on total files in an accepted scope proposal.
    pub max_scope_files: usize,
    /// Minimum context-assembly confidence before generation may run.
    pub confidence_floor: f64,
    /// Top-N for the similarity search strategy.
    pub search_top_n: usize,
    /// Hard cap on stage executions per run leg, against routing loops.
    pub max_steps: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_scope_files: 7,
            confidence_floor: 0.9,
            search_top_n: 10,
            max_steps: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.max_scope_files, 7);
        assert!((s.confidence_floor - 0.9).abs() < f64::EPSILON);
        assert_eq!(s.search_top_n, 10);
        assert_eq!(s.max_steps, 50);
    }

    #[test]
    fn deserializes_from_json() {
        let s: Settings = serde_json::from_str(
            r#"{"max_attempts":2,"max_scope_files":5,"confidence_floor":0.8,"search_top_n":20,"max_steps":30}"#,
        )
        .unwrap();
        assert_eq!(s.max_attempts, 2);
        assert_eq!(s.max_scope_files, 5);
    }
}
