//! ItemCF Source - item-based collaborative filtering
//!
//! "Businesses similar to the ones you rated"
//!
//! ## Algorithm
//! 1. Collect the businesses the user rated (deduplicated, history order)
//! 2. For each one, take its `per_seed_k` most similar businesses from the
//!    item similarity graph
//! 3. Sum the similarity scores per candidate
//! 4. Return the `result_k` best candidates

use crate::error::{Result, require_positive};
use crate::ranking::CandidateScoreMap;
use crate::similarity::SimilarityIndex;
use crate::traits::{CandidateGenerator, EntityCatalog};
use crate::types::{Candidate, CandidateSource, SeedContext};
use async_trait::async_trait;
use data_loader::{BusinessId, Namespace};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Item-based candidates for known users
#[derive(Clone)]
pub struct ItemCfSource {
    index: SimilarityIndex,
    catalog: Arc<dyn EntityCatalog>,

    /// Ratings below this are not expanded
    min_seed_rating: f32,
}

impl ItemCfSource {
    pub fn new(index: SimilarityIndex, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self {
            index,
            catalog,
            min_seed_rating: 0.0,
        }
    }

    /// Only expand businesses rated at least `rating` (default: every rating)
    pub fn with_min_seed_rating(mut self, rating: f32) -> Self {
        self.min_seed_rating = rating;
        self
    }

    async fn seed_businesses(&self, seed: &SeedContext) -> Result<Vec<BusinessId>> {
        let Some(user_id) = seed.user_id.as_ref() else {
            return Ok(Vec::new());
        };
        let interactions = self.catalog.user_interactions(user_id).await?;

        let mut seen = HashSet::new();
        Ok(interactions
            .into_iter()
            .filter(|i| i.rating >= self.min_seed_rating)
            .map(|i| i.business_id)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }
}

#[async_trait]
impl CandidateGenerator for ItemCfSource {
    fn source(&self) -> CandidateSource {
        CandidateSource::ItemCf
    }

    #[instrument(skip(self, seed), fields(user_id = ?seed.user_id))]
    async fn generate(
        &self,
        seed: &SeedContext,
        per_seed_k: usize,
        result_k: usize,
    ) -> Result<Vec<Candidate>> {
        require_positive("per_seed_k", per_seed_k)?;
        require_positive("result_k", result_k)?;

        let seeds = self.seed_businesses(seed).await?;
        debug!("Expanding {} rated businesses", seeds.len());

        let mut scores = CandidateScoreMap::new();
        for business_id in &seeds {
            let neighbors = self
                .index
                .top_k_neighbors(Namespace::Item, business_id, per_seed_k)
                .await?;
            for (neighbor, score) in neighbors {
                scores.add(neighbor, score);
            }
            tokio::task::yield_now().await;
        }

        let candidates: Vec<Candidate> = scores
            .into_top_k(result_k)
            .into_iter()
            .map(|(business_id, score)| Candidate::new(business_id, CandidateSource::ItemCf, score))
            .collect();

        debug!("Generated {} ItemCF candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Interaction, Snapshot, UserId};

    fn rate(snapshot: &mut Snapshot, user: &str, business: &str, rating: f32) {
        snapshot.insert_interaction(Interaction {
            user_id: UserId::from(user),
            business_id: BusinessId::from(business),
            rating,
        });
    }

    fn build_source(snapshot: Snapshot) -> ItemCfSource {
        let snapshot = Arc::new(snapshot);
        let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());
        ItemCfSource::new(index, snapshot)
    }

    fn scenario_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        rate(&mut snapshot, "U1", "B1", 5.0);
        rate(&mut snapshot, "U1", "B2", 3.0);
        snapshot.insert_neighbors(Namespace::Item, "B1", &[("B3", 0.9), ("B4", 0.4)]);
        snapshot.insert_neighbors(Namespace::Item, "B2", &[("B3", 0.2), ("B5", 0.5)]);
        snapshot
    }

    fn pairs(candidates: &[Candidate]) -> Vec<(&str, f64)> {
        candidates
            .iter()
            .map(|c| (c.business_id.as_str(), c.score))
            .collect()
    }

    #[tokio::test]
    async fn test_item_cf_accumulates_across_seeds() {
        let source = build_source(scenario_snapshot());
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 2, 3).await.unwrap();
        let ranked = pairs(&candidates);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, "B3");
        assert!((ranked[0].1 - 1.1).abs() < 1e-9);
        assert_eq!(ranked[1], ("B5", 0.5));
        assert_eq!(ranked[2], ("B4", 0.4));
        assert!(candidates.iter().all(|c| c.source == CandidateSource::ItemCf));
    }

    #[tokio::test]
    async fn test_per_seed_k_limits_each_expansion() {
        let source = build_source(scenario_snapshot());
        let seed = SeedContext::for_user(UserId::from("U1"));

        // B1 keeps only B3, B2 keeps only B5
        let candidates = source.generate(&seed, 1, 10).await.unwrap();
        assert_eq!(pairs(&candidates), vec![("B3", 0.9), ("B5", 0.5)]);
    }

    #[tokio::test]
    async fn test_duplicate_ratings_expand_once() {
        let mut snapshot = scenario_snapshot();
        rate(&mut snapshot, "U1", "B1", 4.0);
        let source = build_source(snapshot);
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 2, 3).await.unwrap();
        assert!((candidates[0].score - 1.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_min_seed_rating() {
        let source = build_source(scenario_snapshot()).with_min_seed_rating(4.0);
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 2, 3).await.unwrap();
        assert_eq!(pairs(&candidates), vec![("B3", 0.9), ("B4", 0.4)]);
    }

    #[tokio::test]
    async fn test_equal_scores_break_ties_by_id() {
        let mut snapshot = Snapshot::new();
        rate(&mut snapshot, "U1", "B1", 5.0);
        snapshot.insert_neighbors(
            Namespace::Item,
            "B1",
            &[("B9", 0.5), ("B7", 0.5), ("B8", 0.5)],
        );
        let source = build_source(snapshot);
        let seed = SeedContext::for_user(UserId::from("U1"));

        for _ in 0..5 {
            let candidates = source.generate(&seed, 3, 3).await.unwrap();
            let ids: Vec<&str> = candidates.iter().map(|c| c.business_id.as_str()).collect();
            assert_eq!(ids, vec!["B7", "B8", "B9"]);
        }
    }

    #[tokio::test]
    async fn test_no_history_is_empty() {
        let source = build_source(scenario_snapshot());

        let candidates = source
            .generate(&SeedContext::for_user(UserId::from("U2")), 2, 3)
            .await
            .unwrap();
        assert!(candidates.is_empty());

        let cold = SeedContext::for_cluster(data_loader::ClusterId(1));
        assert!(source.generate(&cold, 2, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limits_are_rejected() {
        let source = build_source(scenario_snapshot());
        let seed = SeedContext::for_user(UserId::from("U1"));

        assert!(source.generate(&seed, 0, 3).await.is_err());
        assert!(source.generate(&seed, 2, 0).await.is_err());
    }
}
