//! Collaborator interfaces.
//!
//! The engine only reads through these traits. `memory.rs` implements them
//! over a loaded [`data_loader::Snapshot`]; a remote store would implement
//! them over the network and report failures as `UpstreamUnavailable`.

use crate::error::Result;
use crate::types::{Candidate, CandidateSource, SeedContext};
use async_trait::async_trait;
use data_loader::{
    BusinessAttributes, BusinessId, CategoryVocabulary, ClusterCentroid, ClusterId, EntityIndex,
    Interaction, Namespace, NeighborList, UserAttributes, UserId,
};
use std::collections::HashMap;

/// Read-only access to precomputed neighbor lists
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Neighbor list of `raw_id`, or `None` if none was computed
    async fn lookup(&self, namespace: Namespace, raw_id: &str) -> Result<Option<NeighborList>>;
}

/// Id <-> index mappings, attributes, and interaction history
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Map indices back to raw ids, position for position. Unknown indices map to `None`.
    async fn ids_at(&self, namespace: Namespace, indices: &[EntityIndex]) -> Result<Vec<Option<String>>>;

    async fn contains_user(&self, user_id: &UserId) -> Result<bool>;

    async fn user_attributes(&self, user_id: &UserId) -> Result<Option<UserAttributes>>;

    /// Batch lookup; businesses without a profile are absent from the map
    async fn business_attributes(
        &self,
        ids: &[BusinessId],
    ) -> Result<HashMap<BusinessId, BusinessAttributes>>;

    async fn user_interactions(&self, user_id: &UserId) -> Result<Vec<Interaction>>;
}

/// Offline cluster tables
#[async_trait]
pub trait ClusterTable: Send + Sync {
    async fn vocabulary(&self) -> Result<CategoryVocabulary>;

    async fn centroids(&self) -> Result<Vec<ClusterCentroid>>;

    /// Businesses associated with a cluster and their interaction scores
    async fn cluster_interactions(&self, cluster: ClusterId) -> Result<Vec<(BusinessId, f64)>>;

    async fn assigned_cluster(&self, user_id: &UserId) -> Result<Option<ClusterId>>;
}

/// Precomputed two-tower embeddings
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn user_embedding(&self, user_id: &UserId) -> Result<Option<Vec<f32>>>;

    /// The `k` businesses closest to `query` by cosine similarity, ranked.
    /// A query whose dimension differs from the business embeddings is
    /// `InvalidArgument`.
    async fn nearest_businesses(&self, query: &[f32], k: usize) -> Result<Vec<(BusinessId, f64)>>;
}

/// A retrieval strategy that expands a seed into scored candidates
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    fn source(&self) -> CandidateSource;

    /// At most `result_k` candidates, ranked. `per_seed_k` bounds the
    /// neighbors taken from each seed entity.
    async fn generate(
        &self,
        seed: &SeedContext,
        per_seed_k: usize,
        result_k: usize,
    ) -> Result<Vec<Candidate>>;
}
