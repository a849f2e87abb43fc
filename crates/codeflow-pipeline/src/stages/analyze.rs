//! Requirement analysis: classify the request before anything touches the
//! workspace.

use async_trait::async_trait;

use codeflow_collab::Collaborators;
use codeflow_types::{
    Decision, HumanQuestion, PipelineState, RequirementAnalysis, Result, StateUpdate,
};

use crate::graph::Stage;
use crate::stages::{extract_json, ANALYZE};

pub struct AnalyzeStage {
    collab: Collaborators,
}

impl AnalyzeStage {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab }
    }

    fn prompt(state: &PipelineState) -> String {
        let mut prompt = format!(
            "Classify this request against the codebase at {repo}.\n\
             Request: {req}\n",
            repo = state.repo_ref,
            req = state.requirement_text,
        );
        // Resumed runs carry the human's clarification at the tail.
        for message in state.conversation_history.iter().skip(1) {
            prompt.push_str(&format!("{:?}: {}\n", message.role, message.content));
        }
        prompt.push_str(
            "\nAnswer with a JSON object: {\"task_type\", \"domain\", \"confidence\", \
             \"open_questions\", \"modifies_code\", \"needs_code_context\", \"is_casual\"}. \
             The domain field may hold multiple pipe-separated tags.\n",
        );
        prompt
    }
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn name(&self) -> &'static str {
        ANALYZE
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let analysis: Option<RequirementAnalysis> = match self
            .collab
            .generator
            .generate(&Self::prompt(state))
            .await
        {
            Ok(text) => extract_json(&text).and_then(|json| serde_json::from_str(json).ok()),
            Err(e) => {
                tracing::warn!(error = %e, "requirement analysis call failed");
                None
            }
        };

        let Some(analysis) = analysis else {
            state.decide(Decision::ask_human(
                "I could not interpret the request. Please rephrase it, naming the \
                 behavior to change or explain.",
                vec![HumanQuestion {
                    prompt: "What should change, and where?".into(),
                    options: vec![],
                }],
            ));
            return Ok(());
        };

        tracing::info!(
            task_type = %analysis.task_type,
            domain = %analysis.domain,
            confidence = analysis.confidence,
            "requirement classified"
        );

        // Ambiguity is terminal-but-recoverable: retrying without new input
        // cannot help, so ask instead.
        let decision = if analysis.open_questions.is_empty() {
            Decision::proceed(format!(
                "classified as '{}' in domain '{}'",
                analysis.task_type, analysis.domain
            ))
        } else {
            let questions = analysis
                .open_questions
                .iter()
                .map(|q| HumanQuestion {
                    prompt: q.clone(),
                    options: vec![],
                })
                .collect();
            Decision::ask_human("the request leaves open questions", questions)
        };

        state.apply(StateUpdate {
            requirement_analysis: Some(analysis),
            ..Default::default()
        });
        state.decide(decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_collab::fakes::scripted_collaborators;

    fn analysis_json(open_questions: &str) -> String {
        format!(
            r#"{{"task_type": "change", "domain": "order", "confidence": 0.95,
                "open_questions": {open_questions}, "modifies_code": true,
                "needs_code_context": true, "is_casual": false}}"#
        )
    }

    #[tokio::test]
    async fn clean_classification_proceeds() {
        let collab = scripted_collaborators(vec![analysis_json("[]")]);
        let stage = AnalyzeStage::new(collab);
        let mut state = PipelineState::new("fix null pointer in OrderService.process", "acme/orders");

        stage.run(&mut state).await.unwrap();

        assert_eq!(state.last_decision.kind(), "proceed");
        let analysis = state.requirement_analysis.unwrap();
        assert_eq!(analysis.domain, "order");
        assert!(analysis.modifies_code);
    }

    #[tokio::test]
    async fn open_questions_ask_the_human() {
        let collab =
            scripted_collaborators(vec![analysis_json(r#"["Which order status is affected?"]"#)]);
        let stage = AnalyzeStage::new(collab);
        let mut state = PipelineState::new("fix orders", "acme/orders");

        stage.run(&mut state).await.unwrap();

        assert_eq!(state.last_decision.kind(), "ask_human");
        // The analysis is still recorded for the resumed run.
        assert!(state.requirement_analysis.is_some());
    }

    #[tokio::test]
    async fn unparseable_output_asks_for_a_rephrase() {
        let collab = scripted_collaborators(vec!["not a classification".into()]);
        let stage = AnalyzeStage::new(collab);
        let mut state = PipelineState::new("???", "acme/orders");

        stage.run(&mut state).await.unwrap();

        assert_eq!(state.last_decision.kind(), "ask_human");
        assert!(state.requirement_analysis.is_none());
    }

    #[tokio::test]
    async fn generation_fault_asks_rather_than_failing() {
        // Empty script: the generation call errors.
        let collab = scripted_collaborators(vec![]);
        let stage = AnalyzeStage::new(collab);
        let mut state = PipelineState::new("fix orders", "acme/orders");

        stage.run(&mut state).await.unwrap();
        assert_eq!(state.last_decision.kind(), "ask_human");
    }
}
