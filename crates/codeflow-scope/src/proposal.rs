//! Final scope selection, delegated to a text-generation call.
//!
//! The ranked candidate list is rendered into a selection prompt; the
//! model's structured output is parsed into a [`ScopeProposal`]. Parsing
//! is modeled as a tagged result — [`ProposalOutcome::Parsed`] or
//! [`ProposalOutcome::Fallback`] — so callers must explicitly handle the
//! degraded path (the deterministic top-3 fallback) instead of relying on
//! exception-driven control flow.

use serde::Deserialize;

use codeflow_collab::TextGenerator;
use codeflow_types::{
    ActionKind, Candidate, Complexity, FileAction, ScopeProposal, UnitKind,
};

/// How many ranked candidates the deterministic fallback keeps.
const FALLBACK_TOP_N: usize = 3;

/// Outcome of the LLM-delegated selection. `Fallback` still carries a
/// usable proposal; the tag exists so the degraded path stays visible.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalOutcome {
    Parsed(ScopeProposal),
    Fallback {
        proposal: ScopeProposal,
        reason: String,
    },
}

impl ProposalOutcome {
    pub fn proposal(&self) -> &ScopeProposal {
        match self {
            ProposalOutcome::Parsed(p) => p,
            ProposalOutcome::Fallback { proposal, .. } => proposal,
        }
    }

    pub fn into_proposal(self) -> ScopeProposal {
        match self {
            ProposalOutcome::Parsed(p) => p,
            ProposalOutcome::Fallback { proposal, .. } => proposal,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation-output DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FileActionDto {
    path: String,
    target_symbol: String,
    #[serde(default)]
    target_methods: Vec<String>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ScopeProposalDto {
    #[serde(default)]
    files_to_modify: Vec<FileActionDto>,
    #[serde(default)]
    files_to_create: Vec<FileActionDto>,
    #[serde(default)]
    test_files: Vec<FileActionDto>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    estimated_complexity: Option<Complexity>,
    #[serde(default)]
    risks: Vec<String>,
}

fn dto_action(dto: FileActionDto, kind: ActionKind) -> FileAction {
    FileAction {
        path: dto.path,
        kind,
        target_symbol: dto.target_symbol,
        target_methods: dto.target_methods,
        reason: dto.reason,
    }
}

impl ScopeProposalDto {
    fn into_proposal(self) -> ScopeProposal {
        ScopeProposal {
            files_to_modify: self
                .files_to_modify
                .into_iter()
                .map(|d| dto_action(d, ActionKind::Modify))
                .collect(),
            files_to_create: self
                .files_to_create
                .into_iter()
                .map(|d| dto_action(d, ActionKind::Create))
                .collect(),
            test_files: self
                .test_files
                .into_iter()
                .map(|d| dto_action(d, ActionKind::Modify))
                .collect(),
            reasoning: self.reasoning,
            estimated_complexity: self.estimated_complexity.unwrap_or(Complexity::Medium),
            risks: self.risks,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Strip markdown fences and surrounding prose, leaving the outermost JSON
/// object. Models routinely wrap structured output either way; every place
/// that parses generation output goes through this one function.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

/// Parse generation output into a scope proposal. `Err` is a plain reason
/// string; the caller decides whether to fall back.
pub fn parse_proposal(text: &str) -> Result<ScopeProposal, String> {
    let json = extract_json(text).ok_or_else(|| "no JSON object in output".to_string())?;
    let dto: ScopeProposalDto =
        serde_json::from_str(json).map_err(|e| format!("malformed proposal JSON: {e}"))?;
    let proposal = dto.into_proposal();
    if proposal.total_files() == 0 {
        return Err("proposal selected zero files".to_string());
    }
    Ok(proposal)
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Deterministic degraded selection: the top 3 ranked candidates become
/// MODIFY actions, one per distinct file.
pub fn fallback_proposal(candidates: &[Candidate]) -> ScopeProposal {
    let mut files_to_modify: Vec<FileAction> = Vec::new();
    for candidate in candidates.iter().take(FALLBACK_TOP_N) {
        if files_to_modify
            .iter()
            .any(|a| a.path == candidate.unit.file_path)
        {
            continue;
        }

        // A method/field candidate narrows the action to that member.
        let (symbol, methods) = match candidate.unit.kind {
            UnitKind::Method | UnitKind::Field => {
                match candidate.unit.qualified_name.rsplit_once('.') {
                    Some((parent, member)) => (parent.to_string(), vec![member.to_string()]),
                    None => (candidate.unit.qualified_name.clone(), vec![]),
                }
            }
            UnitKind::Type => (
                candidate.unit.qualified_name.clone(),
                candidate
                    .target_sub_units
                    .iter()
                    .map(|s| s.name.clone())
                    .collect(),
            ),
        };

        files_to_modify.push(FileAction {
            path: candidate.unit.file_path.clone(),
            kind: ActionKind::Modify,
            target_symbol: symbol,
            target_methods: methods,
            reason: format!("top-ranked candidate (relevance {:.2})", candidate.relevance),
        });
    }

    ScopeProposal {
        files_to_modify,
        files_to_create: vec![],
        test_files: vec![],
        reasoning: "deterministic fallback: top-ranked candidates".into(),
        estimated_complexity: Complexity::Medium,
        risks: vec!["scope selected without model judgment".into()],
    }
}

// ---------------------------------------------------------------------------
// Selection call
// ---------------------------------------------------------------------------

fn selection_prompt(requirement: &str, candidates: &[Candidate]) -> String {
    let mut prompt = format!(
        "Select the minimal set of files to change for this requirement.\n\
         Requirement: {requirement}\n\nRanked candidates:\n"
    );
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} ({}) — {} [relevance {:.2}]\n",
            i + 1,
            c.qualified_name(),
            c.unit.file_path,
            c.unit.purpose,
            c.relevance,
        ));
        if !c.unit.dependencies.is_empty() {
            prompt.push_str(&format!(
                "   depends on: {}\n",
                c.unit.dependencies.join(", ")
            ));
        }
        if !c.target_sub_units.is_empty() {
            let subs: Vec<String> = c
                .target_sub_units
                .iter()
                .map(|s| format!("{} ({:.2})", s.name, s.score))
                .collect();
            prompt.push_str(&format!("   target members: {}\n", subs.join(", ")));
        }
    }
    prompt.push_str(
        "\nAnswer with a JSON object: {\"files_to_modify\": [{\"path\", \"target_symbol\", \
         \"target_methods\", \"reason\"}], \"files_to_create\": [...], \"test_files\": [...], \
         \"reasoning\", \"estimated_complexity\", \"risks\"}\n",
    );
    prompt
}

/// Delegate final selection to the generation collaborator.
///
/// Never fails: a generation fault or unparseable output degrades to the
/// top-3 fallback. The caller must guard against an empty candidate list
/// first — an empty list is a terminal ask-the-human condition, not
/// something a fallback can repair.
pub async fn propose_scope(
    generator: &dyn TextGenerator,
    requirement: &str,
    candidates: &[Candidate],
) -> ProposalOutcome {
    let prompt = selection_prompt(requirement, candidates);
    match generator.generate(&prompt).await {
        Ok(text) => match parse_proposal(&text) {
            Ok(proposal) => ProposalOutcome::Parsed(proposal),
            Err(reason) => {
                tracing::warn!(%reason, "selection output unparseable, using fallback");
                ProposalOutcome::Fallback {
                    proposal: fallback_proposal(candidates),
                    reason,
                }
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "selection call failed, using fallback");
            ProposalOutcome::Fallback {
                proposal: fallback_proposal(candidates),
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_collab::fakes::ScriptedGenerator;
    use codeflow_types::CodeUnit;

    fn candidate(name: &str, file: &str, kind: UnitKind, relevance: f64) -> Candidate {
        Candidate::new(
            CodeUnit {
                id: name.to_lowercase(),
                qualified_name: name.into(),
                kind,
                file_path: file.into(),
                domain: "order".into(),
                purpose: String::new(),
                dependencies: vec![],
            },
            relevance,
        )
    }

    const GOOD_OUTPUT: &str = r#"Here is the selection:
```json
{
  "files_to_modify": [
    {"path": "src/order_service.rs", "target_symbol": "OrderService",
     "target_methods": ["process"], "reason": "null check"}
  ],
  "reasoning": "only the process method is affected",
  "estimated_complexity": "low",
  "risks": []
}
```"#;

    #[test]
    fn parses_fenced_json_output() {
        let proposal = parse_proposal(GOOD_OUTPUT).unwrap();
        assert_eq!(proposal.total_files(), 1);
        assert_eq!(proposal.files_to_modify[0].kind, ActionKind::Modify);
        assert_eq!(proposal.files_to_modify[0].target_methods, vec!["process"]);
        assert_eq!(proposal.estimated_complexity, Complexity::Low);
    }

    #[test]
    fn create_bucket_gets_create_kind() {
        let text = r#"{"files_to_create": [{"path": "src/refund.rs", "target_symbol": "RefundService"}]}"#;
        let proposal = parse_proposal(text).unwrap();
        assert_eq!(proposal.files_to_create[0].kind, ActionKind::Create);
    }

    #[test]
    fn missing_complexity_defaults_to_medium() {
        let text = r#"{"files_to_modify": [{"path": "a.rs", "target_symbol": "A"}]}"#;
        let proposal = parse_proposal(text).unwrap();
        assert_eq!(proposal.estimated_complexity, Complexity::Medium);
    }

    #[test]
    fn extract_json_strips_fences_and_prose() {
        let text = "Sure, here you go:\n```json\n{\"a\": 1}\n```\nLet me know.";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn extract_json_needs_braces() {
        assert!(extract_json("no structure here").is_none());
    }

    #[test]
    fn rejects_output_without_json() {
        assert!(parse_proposal("I could not decide.").is_err());
    }

    #[test]
    fn rejects_zero_file_proposal() {
        let err = parse_proposal(r#"{"reasoning": "nothing to do"}"#).unwrap_err();
        assert!(err.contains("zero files"));
    }

    #[test]
    fn fallback_takes_top_three_distinct_files() {
        let candidates = vec![
            candidate("A", "src/a.rs", UnitKind::Type, 0.9),
            candidate("B", "src/b.rs", UnitKind::Type, 0.8),
            // Same file as A: skipped, not double-counted.
            candidate("A2", "src/a.rs", UnitKind::Type, 0.7),
            candidate("C", "src/c.rs", UnitKind::Type, 0.6),
        ];
        let proposal = fallback_proposal(&candidates);
        let paths: Vec<_> = proposal
            .files_to_modify
            .iter()
            .map(|a| a.path.as_str())
            .collect();
        assert_eq!(paths, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn fallback_narrows_method_candidates() {
        let candidates = vec![candidate(
            "OrderService.process",
            "src/order_service.rs",
            UnitKind::Method,
            0.93,
        )];
        let proposal = fallback_proposal(&candidates);
        assert_eq!(proposal.files_to_modify.len(), 1);
        assert_eq!(proposal.files_to_modify[0].target_symbol, "OrderService");
        assert_eq!(proposal.files_to_modify[0].target_methods, vec!["process"]);
    }

    #[tokio::test]
    async fn propose_scope_parses_good_output() {
        let generator = ScriptedGenerator::new(vec![GOOD_OUTPUT.into()]);
        let candidates = vec![candidate("OrderService", "src/order_service.rs", UnitKind::Type, 0.93)];
        let outcome = propose_scope(&generator, "fix npe", &candidates).await;
        assert!(matches!(outcome, ProposalOutcome::Parsed(_)));
    }

    #[tokio::test]
    async fn propose_scope_falls_back_on_garbage() {
        let generator = ScriptedGenerator::new(vec!["not json at all".into()]);
        let candidates = vec![candidate("A", "src/a.rs", UnitKind::Type, 0.9)];
        let outcome = propose_scope(&generator, "req", &candidates).await;
        match outcome {
            ProposalOutcome::Fallback { proposal, reason } => {
                assert_eq!(proposal.files_to_modify.len(), 1);
                assert!(reason.contains("JSON") || reason.contains("json"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn propose_scope_falls_back_on_generator_fault() {
        // Exhausted script → generation error → fallback, not a run failure.
        let generator = ScriptedGenerator::new(vec![]);
        let candidates = vec![candidate("A", "src/a.rs", UnitKind::Type, 0.9)];
        let outcome = propose_scope(&generator, "req", &candidates).await;
        assert!(matches!(outcome, ProposalOutcome::Fallback { .. }));
    }

    #[tokio::test]
    async fn identical_inputs_yield_identical_outcome() {
        let candidates = vec![candidate("A", "src/a.rs", UnitKind::Type, 0.9)];
        let g1 = ScriptedGenerator::new(vec![GOOD_OUTPUT.into()]);
        let g2 = ScriptedGenerator::new(vec![GOOD_OUTPUT.into()]);
        let first = propose_scope(&g1, "fix npe", &candidates).await;
        let second = propose_scope(&g2, "fix npe", &candidates).await;
        assert_eq!(first, second);
    }
}
