//! Core traits for the post-fusion pipeline.
//!
//! - [`Filter`]: composable, extensible filters applied to the fused list
//! - [`RerankModel`]: the external model that scores feature rows

use crate::features::FeatureRow;
use crate::fusion::FusedCandidate;
use async_trait::async_trait;
use data_loader::UserId;
use sources::{Result, SeedContext};

/// Core trait for filtering candidates.
///
/// All filters must implement this trait to be used in the FilterPipeline.
///
/// ## Design Note
/// - `Send + Sync` allows filters to be shared across request tasks
/// - Filters take ownership of the Vec and return the survivors in order
/// - `async` because attribute lookups go through the catalog
#[async_trait]
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of candidates.
    ///
    /// # Arguments
    /// * `candidates` - The candidates to filter (takes ownership)
    /// * `context` - Resolved seed, including the businesses already rated
    async fn apply(
        &self,
        candidates: Vec<FusedCandidate>,
        context: &SeedContext,
    ) -> Result<Vec<FusedCandidate>>;
}

/// A second-pass scoring model.
///
/// Returns one score per row, in row order. Transport failures surface as
/// `UpstreamUnavailable`.
#[async_trait]
pub trait RerankModel: Send + Sync {
    async fn score(&self, user_id: &UserId, rows: &[FeatureRow]) -> Result<Vec<f64>>;
}
