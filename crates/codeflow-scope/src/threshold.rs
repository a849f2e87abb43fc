//! Adaptive relevance threshold computed from the shape of a ranked score
//! list rather than a fixed constant.
//!
//! Rule: look at consecutive score gaps among the top ~10 ranked matches.
//! If the largest gap at or after the 3rd match exceeds [`SIGNIFICANT_GAP`],
//! the threshold is the score immediately after that gap; otherwise it is
//! 70% of the top score. The result is clamped to
//! `[THRESHOLD_FLOOR, THRESHOLD_CEILING]`. This prevents both a noisy long
//! tail and empty results for loosely-worded requirements, without
//! per-corpus tuning.

/// A consecutive score gap larger than this marks the relevance cliff.
pub const SIGNIFICANT_GAP: f64 = 0.15;

pub const THRESHOLD_FLOOR: f64 = 0.5;
pub const THRESHOLD_CEILING: f64 = 0.8;

/// How many ranked matches participate in gap analysis.
const GAP_WINDOW: usize = 10;

/// First gap position eligible for the cliff check: the gap between the
/// 3rd and 4th match. Earlier gaps reflect ordinary rank decay, not a cliff.
const MIN_GAP_POSITION: usize = 2;

/// Compute the relevance cutoff for a ranked (descending) score list.
/// Matches scoring below the returned value are discarded.
///
/// Scores are sorted defensively; an empty list yields [`THRESHOLD_FLOOR`].
pub fn adaptive_threshold(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return THRESHOLD_FLOOR;
    }

    let mut ranked: Vec<f64> = scores.iter().copied().take(GAP_WINDOW).collect();
    ranked.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let top = ranked[0];

    let mut cliff: Option<(usize, f64)> = None;
    for i in MIN_GAP_POSITION..ranked.len().saturating_sub(1) {
        let gap = ranked[i] - ranked[i + 1];
        if gap > SIGNIFICANT_GAP && cliff.map_or(true, |(_, g)| gap > g) {
            cliff = Some((i, gap));
        }
    }

    let raw = match cliff {
        Some((i, gap)) => {
            tracing::debug!(position = i, gap, "relevance cliff found");
            ranked[i + 1]
        }
        None => top * 0.7,
    };

    raw.clamp(THRESHOLD_FLOOR, THRESHOLD_CEILING)
}
