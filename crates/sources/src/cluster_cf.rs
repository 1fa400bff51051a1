//! ClusterCF Source - cluster-level item similarity
//!
//! Serves users through the cluster they belong to, which is what makes
//! cold-start requests work: the seed only needs a cluster id.
//!
//! ## Algorithm
//! 1. Collect the businesses the seed's cluster interacted with
//! 2. For each one, take its `per_seed_k` most similar businesses from the
//!    cluster-item similarity graph
//! 3. Sum the similarity scores per candidate
//! 4. Return the `result_k` best candidates

use crate::error::{Result, require_positive};
use crate::ranking::CandidateScoreMap;
use crate::similarity::SimilarityIndex;
use crate::traits::{CandidateGenerator, ClusterTable};
use crate::types::{Candidate, CandidateSource, SeedContext};
use async_trait::async_trait;
use data_loader::Namespace;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct ClusterCfSource {
    index: SimilarityIndex,
    clusters: Arc<dyn ClusterTable>,
}

impl ClusterCfSource {
    pub fn new(index: SimilarityIndex, clusters: Arc<dyn ClusterTable>) -> Self {
        Self { index, clusters }
    }
}

#[async_trait]
impl CandidateGenerator for ClusterCfSource {
    fn source(&self) -> CandidateSource {
        CandidateSource::ClusterCf
    }

    #[instrument(skip(self, seed), fields(cluster = ?seed.cluster))]
    async fn generate(
        &self,
        seed: &SeedContext,
        per_seed_k: usize,
        result_k: usize,
    ) -> Result<Vec<Candidate>> {
        require_positive("per_seed_k", per_seed_k)?;
        require_positive("result_k", result_k)?;

        let Some(cluster) = seed.cluster else {
            debug!("Seed has no cluster; nothing to expand");
            return Ok(Vec::new());
        };

        let interactions = self.clusters.cluster_interactions(cluster).await?;
        let mut seen = HashSet::new();
        let seeds: Vec<_> = interactions
            .into_iter()
            .map(|(business_id, _)| business_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        debug!("Expanding {} businesses of {}", seeds.len(), cluster);

        let mut scores = CandidateScoreMap::new();
        for business_id in &seeds {
            let neighbors = self
                .index
                .top_k_neighbors(Namespace::Cluster, business_id, per_seed_k)
                .await?;
            for (neighbor, score) in neighbors {
                scores.add(neighbor, score);
            }
            tokio::task::yield_now().await;
        }

        let candidates: Vec<Candidate> = scores
            .into_top_k(result_k)
            .into_iter()
            .map(|(business_id, score)| {
                Candidate::new(business_id, CandidateSource::ClusterCf, score)
            })
            .collect();

        debug!("Generated {} ClusterCF candidates", candidates.len());
        Ok(candidates)
    }
}
