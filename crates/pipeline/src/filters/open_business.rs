//! Filter to remove businesses that have closed.

use crate::fusion::FusedCandidate;
use crate::traits::Filter;
use async_trait::async_trait;
use data_loader::BusinessId;
use sources::{EntityCatalog, Result, SeedContext};
use std::sync::Arc;

/// Keeps open businesses. A candidate without a profile is kept, since
/// nothing says it closed.
pub struct OpenBusinessFilter {
    catalog: Arc<dyn EntityCatalog>,
}

impl OpenBusinessFilter {
    pub fn new(catalog: Arc<dyn EntityCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Filter for OpenBusinessFilter {
    fn name(&self) -> &str {
        "OpenBusinessFilter"
    }

    async fn apply(
        &self,
        candidates: Vec<FusedCandidate>,
        _context: &SeedContext,
    ) -> Result<Vec<FusedCandidate>> {
        let ids: Vec<BusinessId> = candidates.iter().map(|c| c.business_id.clone()).collect();
        let profiles = self.catalog.business_attributes(&ids).await?;

        Ok(candidates
            .into_iter()
            .filter(|candidate| {
                profiles
                    .get(&candidate.business_id)
                    .map_or(true, |business| business.is_open)
            })
            .collect())
    }
}
