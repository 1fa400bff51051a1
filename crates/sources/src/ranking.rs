//! Shared score ordering.
//!
//! Every ranked list in the engine (neighbor lists, generator output, fused
//! lists, reranked lists) goes through the same ordering: score descending,
//! ties broken by ascending key, NaN scores last. Keeping one comparator
//! makes results reproducible across runs and across sources.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Order two `(key, score)` entries: higher score first, then lower key.
pub fn compare_scored<K: Ord>(a: &(K, f64), b: &(K, f64)) -> Ordering {
    let by_score = match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
    };
    by_score.then_with(|| a.0.cmp(&b.0))
}

/// Sort entries in place with [`compare_scored`]
pub fn sort_by_score<K: Ord>(entries: &mut [(K, f64)]) {
    entries.sort_by(compare_scored);
}

/// The `k` best entries, ranked. Fewer than `k` entries are all returned.
pub fn top_k_by_score<K: Ord>(mut entries: Vec<(K, f64)>, k: usize) -> Vec<(K, f64)> {
    if k == 0 {
        return Vec::new();
    }
    if entries.len() > k {
        // partition first so only the kept prefix is fully sorted
        entries.select_nth_unstable_by(k - 1, compare_scored);
        entries.truncate(k);
    }
    sort_by_score(&mut entries);
    entries
}

/// Per-request accumulator: each key appears once, its value is the sum of
/// every contribution.
#[derive(Debug, Clone)]
pub struct CandidateScoreMap<K> {
    scores: HashMap<K, f64>,
}

impl<K: Eq + Hash + Ord> CandidateScoreMap<K> {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: K, score: f64) {
        *self.scores.entry(key).or_insert(0.0) += score;
    }

    pub fn get(&self, key: &K) -> Option<f64> {
        self.scores.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.scores.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Every accumulated entry, ranked
    pub fn into_ranked(self) -> Vec<(K, f64)> {
        let mut entries: Vec<(K, f64)> = self.scores.into_iter().collect();
        sort_by_score(&mut entries);
        entries
    }

    /// The `k` best accumulated entries, ranked
    pub fn into_top_k(self, k: usize) -> Vec<(K, f64)> {
        top_k_by_score(self.scores.into_iter().collect(), k)
    }
}

impl<K: Eq + Hash + Ord> Default for CandidateScoreMap<K> {
    fn default() -> Self {
        Self::new()
    }
}
