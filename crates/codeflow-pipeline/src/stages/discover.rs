//! Scope discovery: candidate selection plus the final bounded proposal.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_scope::{discover_candidates, propose_scope, ProposalOutcome};
use codeflow_types::{
    CodeflowError, Decision, HumanQuestion, PipelineState, Result, Settings, StateUpdate,
};

use crate::graph::Stage;
use crate::stages::DISCOVER;

pub struct DiscoverStage {
    collab: Collaborators,
    settings: Settings,
}

impl DiscoverStage {
    pub fn new(collab: Collaborators, settings: Settings) -> Self {
        Self { collab, settings }
    }
}

#[async_trait]
impl Stage for DiscoverStage {
    fn name(&self) -> &'static str {
        DISCOVER
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let analysis =
            state
                .requirement_analysis
                .clone()
                .ok_or_else(|| CodeflowError::StageFault {
                    stage: DISCOVER.into(),
                    message: "no requirement analysis on state".into(),
                })?;

        let candidates = discover_candidates(
            &self.collab,
            &self.settings,
            &state.requirement_text,
            &analysis.domain,
            &state.repo_ref,
        )
        .await?;

        // Empty is terminal: identical inputs cannot produce a different
        // result, so no retry.
        if candidates.is_empty() {
            state.decide(Decision::ask_human(
                format!(
                    "no code units matched domain '{}' or the requirement text. \
                     Confirm the repository is indexed and the domain wording matches \
                     the codebase.",
                    analysis.domain
                ),
                vec![HumanQuestion {
                    prompt: "Re-index the repository, or reword the domain?".into(),
                    options: vec!["re-index".into(), "reword the requirement".into()],
                }],
            ));
            return Ok(());
        }

        let outcome = propose_scope(
            self.collab.generator.as_ref(),
            &state.requirement_text,
            &candidates,
        )
        .await;
        let (proposal, note) = match outcome {
            ProposalOutcome::Parsed(p) => (p, String::new()),
            ProposalOutcome::Fallback { proposal, reason } => {
                (proposal, format!(" (fallback selection: {reason})"))
            }
        };

        // Never truncate silently: an oversized proposal escalates with the
        // full set so the human can split or prioritize.
        if proposal.total_files() > self.settings.max_scope_files {
            let paths: Vec<&str> = proposal.all_actions().map(|a| a.path.as_str()).collect();
            let explanation = format!(
                "the proposed scope spans {} files, above the ceiling of {}: {}",
                proposal.total_files(),
                self.settings.max_scope_files,
                paths.join(", ")
            );
            state.apply(StateUpdate {
                scope: Some(proposal),
                ..Default::default()
            });
            state.decide(Decision::ask_human(
                explanation,
                vec![HumanQuestion {
                    prompt: "Split the task or prioritize a subset?".into(),
                    options: vec!["split the task".into(), "prioritize files".into()],
                }],
            ));
            return Ok(());
        }

        let decision = Decision::proceed(format!(
            "selected {} file(s) from {} candidate(s){}",
            proposal.total_files(),
            candidates.len(),
            note
        ));
        state.apply(StateUpdate {
            scope: Some(proposal),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use codeflow_collab::fakes::{scripted_collaborators, InMemoryGraph, StaticSearchIndex};
    use codeflow_collab::SearchHit;
    use codeflow_types::{CodeUnit, RequirementAnalysis, UnitKind};

    fn analysis() -> RequirementAnalysis {
        RequirementAnalysis {
            task_type: "change".into(),
            domain: "order".into(),
            confidence: 0.95,
            open_questions: vec![],
            modifies_code: true,
            needs_code_context: true,
            is_casual: false,
        }
    }

    fn unit(id: &str, name: &str, kind: UnitKind) -> CodeUnit {
        CodeUnit {
            id: id.into(),
            qualified_name: name.into(),
            kind,
            file_path: "src/order_service.rs".into(),
            domain: "order".into(),
            purpose: String::new(),
            dependencies: vec![],
        }
    }

    fn state() -> PipelineState {
        let mut state =
            PipelineState::new("fix null pointer in OrderService.process", "acme/orders");
        state.requirement_analysis = Some(analysis());
        state
    }

    #[tokio::test]
    async fn empty_candidate_set_escalates_without_retry() {
        let collab = scripted_collaborators(vec![]);
        let stage = DiscoverStage::new(collab, Settings::default());
        let mut state = state();

        stage.run(&mut state).await.unwrap();

        assert_eq!(state.last_decision.kind(), "ask_human");
        assert!(state.last_decision.explanation().contains("indexed"));
        assert!(state.scope.is_none());
    }

    #[tokio::test]
    async fn single_method_match_yields_one_modify_action() {
        // One similarity hit on a method, no domain match: the fallback-free
        // path goes through the scripted selection output.
        let selection = r#"{"files_to_modify": [{"path": "src/order_service.rs",
            "target_symbol": "OrderService", "target_methods": ["process"],
            "reason": "null check"}], "estimated_complexity": "low"}"#;
        let mut collab = scripted_collaborators(vec![selection.into()]);
        collab.graph = Arc::new(InMemoryGraph::new().with_unit(unit(
            "m1",
            "OrderService.process",
            UnitKind::Method,
        )));
        collab.search = Arc::new(StaticSearchIndex::new(vec![SearchHit {
            id: "m1".into(),
            score: 0.93,
            snippet: String::new(),
            symbol_name: "OrderService.process".into(),
        }]));
        let mut state = state();
        state.requirement_analysis.as_mut().unwrap().domain = "ordering".into();

        DiscoverStage::new(collab, Settings::default())
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(state.last_decision.kind(), "proceed");
        let scope = state.scope.unwrap();
        assert_eq!(scope.total_files(), 1);
        assert_eq!(scope.files_to_modify[0].target_methods, vec!["process"]);
    }

    #[tokio::test]
    async fn oversized_proposal_escalates_with_full_set() {
        let actions: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"{{"path": "src/f{i}.rs", "target_symbol": "T{i}", "reason": "r"}}"#
                )
            })
            .collect();
        let selection = format!(r#"{{"files_to_modify": [{}]}}"#, actions.join(","));
        let mut collab = scripted_collaborators(vec![selection]);
        collab.graph = Arc::new(
            InMemoryGraph::new().with_unit(unit("u1", "OrderService", UnitKind::Type)),
        );
        let mut state = state();

        DiscoverStage::new(collab, Settings::default())
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(state.last_decision.kind(), "ask_human");
        assert!(state.last_decision.explanation().contains("src/f7.rs"));
        // The full set is kept for the resumed run.
        assert_eq!(state.scope.unwrap().total_files(), 8);
    }

    #[tokio::test]
    async fn unparseable_selection_falls_back_and_proceeds() {
        let mut collab = scripted_collaborators(vec!["no json".into()]);
        collab.graph = Arc::new(
            InMemoryGraph::new().with_unit(unit("u1", "OrderService", UnitKind::Type)),
        );
        let mut state = state();

        DiscoverStage::new(collab, Settings::default())
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(state.last_decision.kind(), "proceed");
        assert!(state.last_decision.explanation().contains("fallback"));
        assert_eq!(state.scope.unwrap().total_files(), 1);
    }
}
