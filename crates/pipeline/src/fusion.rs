//! Fusion of several generator outputs into one ranking.
//!
//! Each input list carries a weight and a tier. Scores are scaled by the
//! weight and summed per business. Under [`OverlapPolicy::TieredExclusion`]
//! a business already proposed by a higher-priority tier (lower number)
//! is ignored when a lower-priority tier proposes it again, so it is not
//! counted twice.

use data_loader::BusinessId;
use serde::{Deserialize, Serialize};
use sources::ranking::{sort_by_score, top_k_by_score};
use sources::{Candidate, CandidateSource, RecommendError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// How candidates proposed by several inputs are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Ignore tiers and sum every contribution
    Sum,
    /// Sum within a tier; lower tiers yield to higher ones
    #[default]
    TieredExclusion,
}

/// One generator's output as fusion input
#[derive(Debug, Clone)]
pub struct FusionInput {
    pub source: CandidateSource,
    pub candidates: Vec<Candidate>,
    /// Score multiplier; `None` means 1.0
    pub weight: Option<f64>,
    /// Priority group; 0 is the highest priority
    pub tier: u32,
}

impl FusionInput {
    pub fn new(source: CandidateSource, candidates: Vec<Candidate>) -> Self {
        Self {
            source,
            candidates,
            weight: None,
            tier: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }
}

/// A business in the fused ranking
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub business_id: BusinessId,
    pub score: f64,
    /// Sources that contributed to the score, in source order
    pub sources: Vec<CandidateSource>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FusionEngine {
    policy: OverlapPolicy,
}

impl FusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the overlap policy (default: tiered exclusion)
    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merge `inputs` into one list ranked by fused score, then business id.
    ///
    /// The result does not depend on the order of `inputs`.
    pub fn fuse(&self, inputs: Vec<FusionInput>, result_k: Option<usize>) -> Result<Vec<FusedCandidate>> {
        for input in &inputs {
            if let Some(weight) = input.weight {
                if !weight.is_finite() {
                    return Err(RecommendError::InvalidArgument(format!(
                        "fusion weight of {} must be finite, got {}",
                        input.source, weight
                    )));
                }
            }
        }

        let mut tiers: BTreeMap<u32, Vec<FusionInput>> = BTreeMap::new();
        for input in inputs {
            let tier = match self.policy {
                OverlapPolicy::Sum => 0,
                OverlapPolicy::TieredExclusion => input.tier,
            };
            tiers.entry(tier).or_default().push(input);
        }

        let mut fused: HashMap<BusinessId, (f64, Vec<CandidateSource>)> = HashMap::new();
        let mut claimed: HashSet<BusinessId> = HashSet::new();
        let mut excluded = 0usize;

        for (tier, inputs) in tiers {
            let mut proposed: HashSet<BusinessId> = HashSet::new();
            for input in inputs {
                let weight = input.weight.unwrap_or(1.0);
                for candidate in input.candidates {
                    if claimed.contains(&candidate.business_id) {
                        excluded += 1;
                        continue;
                    }
                    let entry = fused
                        .entry(candidate.business_id.clone())
                        .or_insert((0.0, Vec::new()));
                    entry.0 += candidate.score * weight;
                    if !entry.1.contains(&input.source) {
                        entry.1.push(input.source);
                    }
                    proposed.insert(candidate.business_id);
                }
            }
            debug!("Tier {}: {} businesses proposed", tier, proposed.len());
            claimed.extend(proposed);
        }
        if excluded > 0 {
            debug!("Excluded {} lower-tier contributions", excluded);
        }

        let mut sources_by_id: HashMap<BusinessId, Vec<CandidateSource>> = HashMap::new();
        let mut scored: Vec<(BusinessId, f64)> = Vec::with_capacity(fused.len());
        for (business_id, (score, mut sources)) in fused {
            sources.sort_unstable();
            sources_by_id.insert(business_id.clone(), sources);
            scored.push((business_id, score));
        }

        let ranked = match result_k {
            Some(k) => top_k_by_score(scored, k),
            None => {
                sort_by_score(&mut scored);
                scored
            }
        };

        Ok(ranked
            .into_iter()
            .map(|(business_id, score)| {
                let sources = sources_by_id.remove(&business_id).unwrap_or_default();
                FusedCandidate {
                    business_id,
                    score,
                    sources,
                }
            })
            .collect())
    }
}
