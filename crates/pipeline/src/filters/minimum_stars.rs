//! Filter to ensure a minimum quality threshold.
//!
//! Removes businesses with a low published star rating or too few reviews.

use crate::fusion::FusedCandidate;
use crate::traits::Filter;
use async_trait::async_trait;
use data_loader::BusinessId;
use sources::{EntityCatalog, Result, SeedContext};
use std::sync::Arc;

/// Removes candidates below quality thresholds.
///
/// ## Algorithm
/// 1. Batch-fetch BusinessAttributes for every candidate
/// 2. Keep a candidate if stars >= min_stars and review_count >= min_reviews
/// 3. Candidates without a profile are removed
pub struct MinimumStarsFilter {
    catalog: Arc<dyn EntityCatalog>,
    min_stars: f32,
    min_reviews: u32,
}

impl MinimumStarsFilter {
    /// Create a new MinimumStarsFilter.
    ///
    /// # Arguments
    /// * `catalog` - Source of business attributes
    /// * `min_stars` - Minimum published star rating (typically 3.5)
    /// * `min_reviews` - Minimum number of reviews (typically 10)
    pub fn new(catalog: Arc<dyn EntityCatalog>, min_stars: f32, min_reviews: u32) -> Self {
        Self {
            catalog,
            min_stars,
            min_reviews,
        }
    }
}

#[async_trait]
impl Filter for MinimumStarsFilter {
    fn name(&self) -> &str {
        "MinimumStarsFilter"
    }

    async fn apply(
        &self,
        candidates: Vec<FusedCandidate>,
        _context: &SeedContext,
    ) -> Result<Vec<FusedCandidate>> {
        let ids: Vec<BusinessId> = candidates.iter().map(|c| c.business_id.clone()).collect();
        let profiles = self.catalog.business_attributes(&ids).await?;

        let filtered: Vec<FusedCandidate> = candidates
            .into_iter()
            .filter(|candidate| match profiles.get(&candidate.business_id) {
                Some(business) => {
                    business.stars >= self.min_stars && business.review_count >= self.min_reviews
                }
                None => false,
            })
            .collect();

        Ok(filtered)
    }
}
