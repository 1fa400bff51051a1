//! UserCF Source - user-based collaborative filtering
//!
//! "Businesses rated by users similar to you"
//!
//! ## Algorithm
//! 1. Take the `per_seed_k` most similar users from the user similarity graph
//! 2. Walk each neighbor's ratings
//! 3. Add the rating to the business's score, optionally scaled by the
//!    neighbor's similarity
//! 4. Return the `result_k` best businesses

use crate::error::{Result, require_positive};
use crate::ranking::CandidateScoreMap;
use crate::similarity::SimilarityIndex;
use crate::traits::{CandidateGenerator, EntityCatalog};
use crate::types::{Candidate, CandidateSource, SeedContext};
use async_trait::async_trait;
use data_loader::{Namespace, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// How a neighbor's rating contributes to a candidate's score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCfWeighting {
    /// The raw rating
    #[default]
    Unweighted,
    /// Rating times the neighbor's similarity to the seed user
    BySimilarity,
}

/// User-based candidates for known users
#[derive(Clone)]
pub struct UserCfSource {
    index: SimilarityIndex,
    catalog: Arc<dyn EntityCatalog>,
    weighting: UserCfWeighting,
}

impl UserCfSource {
    pub fn new(index: SimilarityIndex, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self {
            index,
            catalog,
            weighting: UserCfWeighting::default(),
        }
    }

    /// Configure how neighbor ratings are weighted (default: unweighted)
    pub fn with_weighting(mut self, weighting: UserCfWeighting) -> Self {
        self.weighting = weighting;
        self
    }
}

#[async_trait]
impl CandidateGenerator for UserCfSource {
    fn source(&self) -> CandidateSource {
        CandidateSource::UserCf
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

        let Some(user_id) = seed.user_id.as_ref() else {
            return Ok(Vec::new());
        };

        let similar_users: Vec<(UserId, f64)> = self
            .index
            .top_k_neighbors(Namespace::User, user_id, per_seed_k)
            .await?;
        debug!("Found {} similar users", similar_users.len());

        let mut scores = CandidateScoreMap::new();
        for (neighbor, similarity) in &similar_users {
            let interactions = self.catalog.user_interactions(neighbor).await?;
            for interaction in interactions {
                let rating = f64::from(interaction.rating);
                let contribution = match self.weighting {
                    UserCfWeighting::Unweighted => rating,
                    UserCfWeighting::BySimilarity => rating * similarity,
                };
                scores.add(interaction.business_id, contribution);
            }
            tokio::task::yield_now().await;
        }

        let candidates: Vec<Candidate> = scores
            .into_top_k(result_k)
            .into_iter()
            .map(|(business_id, score)| Candidate::new(business_id, CandidateSource::UserCf, score))
            .collect();

        debug!("Generated {} UserCF candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{BusinessId, Interaction, Snapshot};

    fn rate(snapshot: &mut Snapshot, user: &str, business: &str, rating: f32) {
        snapshot.insert_interaction(Interaction {
            user_id: UserId::from(user),
            business_id: BusinessId::from(business),
            rating,
        });
    }

    fn create_test_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        rate(&mut snapshot, "U1", "B1", 5.0);

        // U2 is close, U3 less so, U4 is outside the top 2
        snapshot.insert_neighbors(
            Namespace::User,
            "U1",
            &[("U2", 0.8), ("U3", 0.5), ("U4", 0.1)],
        );
        rate(&mut snapshot, "U2", "B2", 4.0);
        rate(&mut snapshot, "U2", "B3", 2.0);
        rate(&mut snapshot, "U3", "B3", 5.0);
        rate(&mut snapshot, "U4", "B9", 5.0);
        snapshot
    }

    fn build_source(snapshot: Snapshot) -> UserCfSource {
        let snapshot = Arc::new(snapshot);
        let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());
        UserCfSource::new(index, snapshot)
    }

    #[tokio::test]
    async fn test_user_cf_sums_neighbor_ratings() {
        let source = build_source(create_test_snapshot());
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 2, 10).await.unwrap();
        let ranked: Vec<(&str, f64)> = candidates
            .iter()
            .map(|c| (c.business_id.as_str(), c.score))
            .collect();

        // B3: 2 + 5, B2: 4; B9 comes from U4 which is outside the top 2
        assert_eq!(ranked, vec![("B3", 7.0), ("B2", 4.0)]);
    }

    #[tokio::test]
    async fn test_user_cf_similarity_weighting() {
        let source = build_source(create_test_snapshot()).with_weighting(UserCfWeighting::BySimilarity);
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 2, 10).await.unwrap();

        // B3: 2*0.8 + 5*0.5 = 4.1, B2: 4*0.8 = 3.2
        assert_eq!(candidates[0].business_id, BusinessId::from("B3"));
        assert!((candidates[0].score - 4.1).abs() < 1e-9);
        assert_eq!(candidates[1].business_id, BusinessId::from("B2"));
        assert!((candidates[1].score - 3.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_user_cf_truncates_to_result_k() {
        let source = build_source(create_test_snapshot());
        let seed = SeedContext::for_user(UserId::from("U1"));

        let candidates = source.generate(&seed, 3, 1).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].business_id, BusinessId::from("B3"));
    }

    #[tokio::test]
    async fn test_user_without_neighbors() {
        let source = build_source(create_test_snapshot());
        let seed = SeedContext::for_user(UserId::from("U2"));

        assert!(source.generate(&seed, 5, 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_weighting_serde_names() {
        let parsed: UserCfWeighting = serde_json::from_str("\"by_similarity\"").unwrap();
        assert_eq!(parsed, UserCfWeighting::BySimilarity);
        assert_eq!(UserCfWeighting::default(), UserCfWeighting::Unweighted);
    }
}
