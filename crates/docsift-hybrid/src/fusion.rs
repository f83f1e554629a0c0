//! Reciprocal rank fusion.
//!
//! `fused(d) = 1/(rank_L(d) + c) + 1/(rank_V(d) + c)`, ranks starting at 1,
//! a missing rank contributing nothing. Output order is fused score
//! descending, then lexical rank ascending (absent last), then id ascending.
//! The result depends only on the two input lists, never on their arrival
//! order or on how equal-score entries were permuted.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use docsift_core::config::SearchConfig;
use docsift_core::types::{DocumentId, HitSource, RankedHit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Damping constant `c`.
    pub c: f64,
    /// Entries kept from each input list (`K`).
    pub depth: usize,
}

impl Default for FusionParams {
    fn default() -> Self { Self { c: 60.0, depth: 100 } }
}

impl From<&SearchConfig> for FusionParams {
    fn from(cfg: &SearchConfig) -> Self { Self { c: cfg.rrf_c, depth: cfg.candidate_depth } }
}

/// Order a backend list by score descending then id ascending, keep the first
/// occurrence of each id and cap it at `depth`. Returns ids in rank order.
pub fn canonical_ranking(hits: &[RankedHit], depth: usize) -> Vec<DocumentId> {
    let mut sorted: Vec<&RankedHit> = hits.iter().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .filter(|h| seen.insert(h.id.as_str()))
        .take(depth)
        .map(|h| h.id.clone())
        .collect()
}

#[derive(Default)]
struct Ranks {
    lexical: Option<usize>,
    vector: Option<usize>,
}

pub fn merge(lexical: &[RankedHit], vector: &[RankedHit], params: &FusionParams) -> Vec<RankedHit> {
    let mut ranks: BTreeMap<DocumentId, Ranks> = BTreeMap::new();
    for (i, id) in canonical_ranking(lexical, params.depth).into_iter().enumerate() {
        ranks.entry(id).or_default().lexical = Some(i + 1);
    }
    for (i, id) in canonical_ranking(vector, params.depth).into_iter().enumerate() {
        ranks.entry(id).or_default().vector = Some(i + 1);
    }

    let term = |rank: Option<usize>| rank.map_or(0.0, |r| 1.0 / (r as f64 + params.c));
    let mut fused: Vec<(RankedHit, Option<usize>)> = ranks
        .into_iter()
        .map(|(id, r)| (RankedHit::new(id, term(r.lexical) + term(r.vector), HitSource::Fused), r.lexical))
        .collect();
    fused.sort_by(|(a, la), (b, lb)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| cmp_rank(*la, *lb))
            .then_with(|| a.id.cmp(&b.id))
    });
    fused.into_iter().map(|(hit, _)| hit).collect()
}

fn cmp_rank(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
