//! Second-pass scoring of the fused candidates.

use crate::features::FeatureAssembler;
use crate::traits::RerankModel;
use data_loader::{BusinessId, UserId};
use sources::error::require_positive;
use sources::ranking::top_k_by_score;
use sources::{EntityCatalog, RecommendError, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Scores candidates with an external model and keeps the best `result_k`
#[derive(Clone)]
pub struct Reranker {
    catalog: Arc<dyn EntityCatalog>,
    assembler: FeatureAssembler,
    model: Arc<dyn RerankModel>,
}

impl Reranker {
    pub fn new(catalog: Arc<dyn EntityCatalog>, model: Arc<dyn RerankModel>) -> Self {
        Self {
            assembler: FeatureAssembler::new(catalog.clone()),
            catalog,
            model,
        }
    }

    /// Rank `candidates` by model score descending, ties by business id.
    ///
    /// Candidates without attributes are dropped. A user without a profile
    /// is `NotFound`; a score count that does not match the row count is
    /// `UpstreamUnavailable`.
    #[instrument(skip(self, user_id, candidates), fields(user_id = %user_id, candidates = candidates.len()))]
    pub async fn rerank(
        &self,
        user_id: &UserId,
        candidates: &[BusinessId],
        result_k: usize,
    ) -> Result<Vec<(BusinessId, f64)>> {
        require_positive("result_k", result_k)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let user = self
            .catalog
            .user_attributes(user_id)
            .await?
            .ok_or_else(|| RecommendError::user_not_found(user_id))?;

        let batch = self.assembler.assemble(&user, candidates).await?;
        if batch.rows.is_empty() {
            debug!("No candidate could be assembled; nothing to score");
            return Ok(Vec::new());
        }

        let scores = self.model.score(user_id, &batch.rows).await?;
        if scores.len() != batch.rows.len() {
            return Err(RecommendError::UpstreamUnavailable(format!(
                "rerank model returned {} scores for {} rows",
                scores.len(),
                batch.rows.len()
            )));
        }

        let scored: Vec<(BusinessId, f64)> = batch
            .rows
            .into_iter()
            .map(|row| row.business_id)
            .zip(scores)
            .collect();

        let ranked = top_k_by_score(scored, result_k);
        debug!("Reranked to {} candidates", ranked.len());
        Ok(ranked)
    }
}
