//! Exact context assembly for an approved scope proposal.
//!
//! For every file the proposal names, resolve its current content from the
//! workspace and its dependency neighborhood from the graph. The result is
//! retrieved verbatim, never generated: generation downstream sees real
//! code or nothing, and the confidence ratio records how much of the
//! requested scope actually resolved.

use codeflow_collab::Collaborators;
use codeflow_types::{
    ActionKind, DomainContext, FileContext, Result, ScopeProposal, StructuredContext,
    WorkspaceRef,
};

use crate::selector::parse_domain_filter;

/// An assembled context plus the paths that failed to resolve. Callers use
/// the unresolved list for escalation messages; it never reaches generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub context: StructuredContext,
    pub unresolved: Vec<String>,
}

/// Resolve per-file context for every action in the proposal.
///
/// MODIFY actions read the file's exact current content; a missing file is
/// recorded as unresolved, not invented. CREATE actions resolve trivially
/// with no current content. Dependency and dependent lists come from the
/// graph, as names only.
pub async fn assemble_context(
    collab: &Collaborators,
    workspace: &WorkspaceRef,
    repo: &str,
    domain: &str,
    proposal: &ScopeProposal,
) -> Result<AssembledContext> {
    let mut files: Vec<FileContext> = Vec::new();
    let mut unresolved: Vec<String> = Vec::new();

    for action in proposal.all_actions() {
        let current_code = match action.kind {
            ActionKind::Create => None,
            ActionKind::Modify => {
                match collab.source.read_file(workspace, &action.path).await? {
                    Some(content) => Some(content),
                    None => {
                        tracing::warn!(path = %action.path, "in-scope file missing from workspace");
                        unresolved.push(action.path.clone());
                        continue;
                    }
                }
            }
        };

        let (dependencies, dependents, purpose) =
            match collab.graph.find_unit(&action.target_symbol, repo).await? {
                Some(unit) => {
                    let dependents = collab
                        .graph
                        .direct_dependents(&unit.id, repo)
                        .await?
                        .into_iter()
                        .map(|u| u.qualified_name)
                        .collect();
                    (unit.dependencies, dependents, unit.purpose)
                }
                // Newly-created symbols are not in the graph yet.
                None => (vec![], vec![], action.reason.clone()),
            };

        files.push(FileContext {
            path: action.path.clone(),
            current_code,
            dependencies,
            dependents,
            purpose,
        });
    }

    let requested = proposal.total_files();
    let confidence = if requested == 0 {
        1.0
    } else {
        files.len() as f64 / requested as f64
    };

    let domain_ctx = DomainContext {
        domain: domain.to_string(),
        business_rules: vec![],
        concepts: parse_domain_filter(domain).into_iter().collect(),
    };

    tracing::info!(
        resolved = files.len(),
        requested,
        confidence,
        "context assembly complete"
    );

    Ok(AssembledContext {
        context: StructuredContext {
            files,
            domain: domain_ctx,
            confidence,
        },
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use codeflow_collab::fakes::{scripted_collaborators, InMemoryGraph, InMemorySource};
    use codeflow_types::{CodeUnit, Complexity, FileAction, UnitKind};

    fn action(path: &str, kind: ActionKind, symbol: &str) -> FileAction {
        FileAction {
            path: path.into(),
            kind,
            target_symbol: symbol.into(),
            target_methods: vec![],
            reason: format!("{symbol} in scope"),
        }
    }

    fn proposal(modify: Vec<FileAction>, create: Vec<FileAction>) -> ScopeProposal {
        ScopeProposal {
            files_to_modify: modify,
            files_to_create: create,
            test_files: vec![],
            reasoning: String::new(),
            estimated_complexity: Complexity::Low,
            risks: vec![],
        }
    }

    fn unit(id: &str, name: &str, file: &str, deps: &[&str]) -> CodeUnit {
        CodeUnit {
            id: id.into(),
            qualified_name: name.into(),
            kind: UnitKind::Type,
            file_path: file.into(),
            domain: "order".into(),
            purpose: format!("{name} unit"),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn collab(graph: InMemoryGraph, source: InMemorySource) -> Collaborators {
        let mut c = scripted_collaborators(vec![]);
        c.graph = Arc::new(graph);
        c.source = Arc::new(source);
        c
    }

    async fn workspace(c: &Collaborators) -> WorkspaceRef {
        c.source
            .materialize_workspace("acme/orders", "main")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn modify_action_resolves_exact_content_and_neighbors() {
        let graph = InMemoryGraph::new()
            .with_unit(unit("u1", "OrderService", "src/order_service.rs", &["OrderRepo"]))
            .with_unit(unit("u2", "CheckoutController", "src/checkout.rs", &["OrderService"]));
        let source =
            InMemorySource::new().with_file("src/order_service.rs", "pub struct OrderService;");
        let c = collab(graph, source);
        let ws = workspace(&c).await;

        let p = proposal(
            vec![action("src/order_service.rs", ActionKind::Modify, "OrderService")],
            vec![],
        );
        let assembled = assemble_context(&c, &ws, "acme/orders", "order", &p)
            .await
            .unwrap();

        assert!(assembled.unresolved.is_empty());
        let file = &assembled.context.files[0];
        assert_eq!(file.current_code.as_deref(), Some("pub struct OrderService;"));
        assert_eq!(file.dependencies, vec!["OrderRepo"]);
        assert_eq!(file.dependents, vec!["CheckoutController"]);
        assert!((assembled.context.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn create_action_resolves_without_content() {
        let c = collab(InMemoryGraph::new(), InMemorySource::new());
        let ws = workspace(&c).await;

        let p = proposal(
            vec![],
            vec![action("src/refund.rs", ActionKind::Create, "RefundService")],
        );
        let assembled = assemble_context(&c, &ws, "acme/orders", "order", &p)
            .await
            .unwrap();

        assert!(assembled.unresolved.is_empty());
        assert_eq!(assembled.context.files.len(), 1);
        assert!(assembled.context.files[0].current_code.is_none());
        assert!((assembled.context.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_modify_file_is_unresolved_not_invented() {
        let graph =
            InMemoryGraph::new().with_unit(unit("u1", "OrderService", "src/order_service.rs", &[]));
        let c = collab(graph, InMemorySource::new());
        let ws = workspace(&c).await;

        let p = proposal(
            vec![
                action("src/absent.rs", ActionKind::Modify, "Absent"),
                action("src/order_service.rs", ActionKind::Modify, "OrderService"),
            ],
            vec![],
        );
        // Even the resolvable symbol fails here because its file is absent
        // from the empty source store.
        let assembled = assemble_context(&c, &ws, "acme/orders", "order", &p)
            .await
            .unwrap();

        assert_eq!(assembled.unresolved.len(), 2);
        assert!(assembled.context.files.is_empty());
        assert!((assembled.context.confidence - 0.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn confidence_is_resolved_over_requested() {
        let graph =
            InMemoryGraph::new().with_unit(unit("u1", "OrderService", "src/order_service.rs", &[]));
        let source = InMemorySource::new().with_file("src/order_service.rs", "struct S;");
        let c = collab(graph, source);
        let ws = workspace(&c).await;

        let p = proposal(
            vec![
                action("src/order_service.rs", ActionKind::Modify, "OrderService"),
                action("src/gone.rs", ActionKind::Modify, "Gone"),
            ],
            vec![],
        );
        let assembled = assemble_context(&c, &ws, "acme/orders", "order", &p)
            .await
            .unwrap();

        assert_eq!(assembled.unresolved, vec!["src/gone.rs"]);
        assert!((assembled.context.confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_proposal_assembles_with_full_confidence() {
        let c = collab(InMemoryGraph::new(), InMemorySource::new());
        let ws = workspace(&c).await;
        let assembled = assemble_context(&c, &ws, "acme/orders", "order", &proposal(vec![], vec![]))
            .await
            .unwrap();
        assert!(assembled.context.files.is_empty());
        assert!((assembled.context.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn domain_tags_become_concepts() {
        let c = collab(InMemoryGraph::new(), InMemorySource::new());
        let ws = workspace(&c).await;
        let assembled = assemble_context(
            &c,
            &ws,
            "acme/orders",
            "order|billing",
            &proposal(vec![], vec![]),
        )
        .await
        .unwrap();
        assert_eq!(assembled.context.domain.domain, "order|billing");
        assert_eq!(assembled.context.domain.concepts, vec!["billing", "order"]);
    }
}
