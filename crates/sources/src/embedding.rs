//! Embedding Source - two-tower retrieval
//!
//! "Businesses whose embedding is close to yours"
//!
//! ## Algorithm
//! 1. Look up the user's precomputed embedding (user tower output)
//! 2. Scan the business embeddings (business tower output) for the
//!    `result_k` highest cosine similarities
//!
//! Both towers run offline; the snapshot only carries their outputs. Seeds
//! without a user or without an embedding get nothing from this source.

use crate::error::{Result, require_positive};
use crate::traits::{CandidateGenerator, EmbeddingStore};
use crate::types::{Candidate, CandidateSource, SeedContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct EmbeddingSource {
    store: Arc<dyn EmbeddingStore>,
}

impl EmbeddingSource {
    pub fn new(store: Arc<dyn EmbeddingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateGenerator for EmbeddingSource {
    fn source(&self) -> CandidateSource {
        CandidateSource::Embedding
    }

    /// `per_seed_k` is validated but unused: the user is the only seed.
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
        let Some(query) = self.store.user_embedding(user_id).await? else {
            debug!("No embedding for user {}", user_id);
            return Ok(Vec::new());
        };

        // The scan does not suspend; give an expired deadline its chance first
        tokio::task::yield_now().await;

        let candidates: Vec<Candidate> = self
            .store
            .nearest_businesses(&query, result_k)
            .await?
            .into_iter()
            .map(|(business_id, score)| Candidate::new(business_id, CandidateSource::Embedding, score))
            .collect();

        debug!("Generated {} embedding candidates", candidates.len());
        Ok(candidates)
    }
}
