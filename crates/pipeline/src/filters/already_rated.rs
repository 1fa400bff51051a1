//! Filter to remove businesses the user has already rated.
//!
//! Typically the first filter in the pipeline: there is no point in
//! recommending a place the user has already reviewed.

use crate::fusion::FusedCandidate;
use crate::traits::Filter;
use async_trait::async_trait;
use sources::{Result, SeedContext};

/// Removes candidates that the user has already rated.
///
/// ## Algorithm
/// Uses the HashSet in SeedContext.rated for O(1) lookups. Cold-start
/// seeds have no history, so nothing is removed for them.
pub struct AlreadyRatedFilter;

#[async_trait]
impl Filter for AlreadyRatedFilter {
    fn name(&self) -> &str {
        "AlreadyRatedFilter"
    }

    async fn apply(
        &self,
        candidates: Vec<FusedCandidate>,
        context: &SeedContext,
    ) -> Result<Vec<FusedCandidate>> {
        let filtered: Vec<FusedCandidate> = candidates
            .into_iter()
            .filter(|candidate| !context.rated.contains(&candidate.business_id))
            .collect();
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{BusinessId, ClusterId, UserId};
    use sources::CandidateSource;

    fn fused(id: &str, score: f64) -> FusedCandidate {
        FusedCandidate {
            business_id: BusinessId::from(id),
            score,
            sources: vec![CandidateSource::UserCf],
        }
    }

    #[tokio::test]
    async fn test_already_rated_filter() {
        let mut context = SeedContext::for_user(UserId::from("U1"));
        context.rated.insert(BusinessId::from("B100"));
        context.rated.insert(BusinessId::from("B200"));

        let candidates = vec![
            fused("B100", 0.9),
            fused("B101", 0.8),
            fused("B200", 0.7),
            fused("B300", 0.6),
        ];

        let filtered = AlreadyRatedFilter.apply(candidates, &context).await.unwrap();

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].business_id, BusinessId::from("B101"));
        assert_eq!(filtered[1].business_id, BusinessId::from("B300"));
    }

    #[tokio::test]
    async fn test_cold_start_keeps_everything() {
        let context = SeedContext::for_cluster(ClusterId(4));
        let candidates = vec![fused("B1", 0.9), fused("B2", 0.8)];

        let filtered = AlreadyRatedFilter.apply(candidates, &context).await.unwrap();
        assert_eq!(filtered.len(), 2);
    }
}
