//! Multi-strategy candidate selection.
//!
//! Three independent strategies, unioned then expanded:
//! 1. domain filter — exact match of the inferred domain tags against
//!    indexed units' domain metadata;
//! 2. similarity search — embed the requirement, query the search
//!    collaborator, discard matches below the adaptive threshold;
//! 3. dependency expansion — one-hop dependencies of everything already
//!    selected, kept only when their domain matches.
//!
//! Deduplication is by qualified name. A similarity match on a sub-unit
//! (method/field) of an already-selected type becomes a target sub-unit
//! annotation on that type instead of a duplicate candidate.

use std::collections::BTreeSet;

use codeflow_collab::Collaborators;
use codeflow_types::{Candidate, Result, Settings, TargetSubUnit, UnitKind};

use crate::threshold::adaptive_threshold;

/// Baseline relevance for exact domain matches, which carry no search score.
const DOMAIN_MATCH_RELEVANCE: f64 = 0.6;

/// Relevance assigned to candidates pulled in by dependency expansion.
const EXPANSION_RELEVANCE: f64 = 0.55;

/// Parse a multi-value domain filter into a set of tags.
///
/// Filter fields may arrive pipe- or comma-separated ("order|billing");
/// they must never be compared as one delimiter-joined literal.
pub fn parse_domain_filter(raw: &str) -> BTreeSet<String> {
    raw.split(['|', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Qualified name of a sub-unit's enclosing type, if it has one.
fn parent_name(qualified_name: &str) -> Option<&str> {
    qualified_name.rsplit_once('.').map(|(parent, _)| parent)
}

fn sub_unit_name(qualified_name: &str) -> &str {
    qualified_name
        .rsplit_once('.')
        .map_or(qualified_name, |(_, name)| name)
}

/// Run all three strategies and return the ranked candidate union,
/// descending by relevance. An empty result means no strategy produced
/// anything; retrying with identical inputs cannot change that, so the
/// caller escalates to the human instead of retrying.
pub async fn discover_candidates(
    collab: &Collaborators,
    settings: &Settings,
    requirement: &str,
    domain: &str,
    repo: &str,
) -> Result<Vec<Candidate>> {
    let domains = parse_domain_filter(domain);
    let mut selected: Vec<Candidate> = Vec::new();

    // Strategy 1: domain filter.
    for tag in &domains {
        for unit in collab.graph.units_in_domain(tag, repo).await? {
            if !selected.iter().any(|c| c.qualified_name() == unit.qualified_name) {
                selected.push(Candidate::new(unit, DOMAIN_MATCH_RELEVANCE));
            }
        }
    }
    tracing::debug!(count = selected.len(), "domain filter matches");

    // Strategy 2: similarity search with adaptive threshold.
    let vector = collab.embedder.embed(requirement).await?;
    let hits = collab
        .search
        .search(&vector, repo, settings.search_top_n)
        .await?;
    let scores: Vec<f64> = hits.iter().map(|h| h.score).collect();
    let cutoff = adaptive_threshold(&scores);
    tracing::debug!(hits = hits.len(), cutoff, "similarity search");

    for hit in hits.into_iter().filter(|h| h.score >= cutoff) {
        let Some(unit) = collab.graph.unit(&hit.id, repo).await? else {
            tracing::warn!(id = %hit.id, "search hit not present in graph, skipping");
            continue;
        };

        match selected
            .iter_mut()
            .find(|c| c.qualified_name() == unit.qualified_name)
        {
            Some(existing) => existing.relevance = existing.relevance.max(hit.score),
            None => selected.push(Candidate::new(unit, hit.score)),
        }
    }

    // Strategy 3: one-hop dependency expansion, gated on domain.
    let anchors: Vec<String> = selected.iter().map(|c| c.unit.id.clone()).collect();
    for anchor in anchors {
        for dep in collab.graph.direct_dependencies(&anchor, repo).await? {
            if !domains.contains(&dep.domain) {
                continue;
            }
            if selected
                .iter()
                .any(|c| c.qualified_name() == dep.qualified_name)
            {
                continue;
            }
            selected.push(Candidate::new(dep, EXPANSION_RELEVANCE));
        }
    }

    // Fold sub-units into their selected parent type: the parent carries a
    // target annotation instead of the list carrying a duplicate entry.
    // Runs after all strategies so selection order cannot matter.
    let names: BTreeSet<String> = selected
        .iter()
        .map(|c| c.qualified_name().to_string())
        .collect();
    let (folded, kept): (Vec<Candidate>, Vec<Candidate>) = selected.into_iter().partition(|c| {
        matches!(c.unit.kind, UnitKind::Method | UnitKind::Field)
            && parent_name(&c.unit.qualified_name).is_some_and(|p| names.contains(p))
    });
    let mut selected = kept;
    for sub in folded {
        let parent = parent_name(&sub.unit.qualified_name).unwrap_or_default().to_string();
        if let Some(existing) = selected.iter_mut().find(|c| c.qualified_name() == parent) {
            existing.target_sub_units.push(TargetSubUnit {
                name: sub_unit_name(&sub.unit.qualified_name).to_string(),
                score: sub.relevance,
            });
        }
    }

    // Rank descending by relevance; qualified name breaks ties so repeated
    // invocations with identical inputs yield identical orderings.
    selected.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.qualified_name().cmp(b.qualified_name()))
    });

    tracing::info!(candidates = selected.len(), "scope discovery complete");
    Ok(selected)
}
