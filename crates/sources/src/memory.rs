//! In-memory collaborators backed by a loaded [`Snapshot`].
//!
//! Lookups never fail; absence is reported as `None` or an empty list.

use crate::error::{RecommendError, Result};
use crate::ranking::top_k_by_score;
use crate::traits::{ClusterTable, EmbeddingStore, EntityCatalog, SimilarityStore};
use async_trait::async_trait;
use data_loader::embedding::dot;
use data_loader::{
    BusinessAttributes, BusinessId, CategoryVocabulary, ClusterCentroid, ClusterId, EntityIndex,
    Interaction, Namespace, NeighborList, Snapshot, UserAttributes, UserId,
};
use rayon::prelude::*;
use std::collections::HashMap;

#[async_trait]
impl SimilarityStore for Snapshot {
    async fn lookup(&self, namespace: Namespace, raw_id: &str) -> Result<Option<NeighborList>> {
        Ok(self.graph(namespace).neighbors(raw_id).cloned())
    }
}

#[async_trait]
impl EntityCatalog for Snapshot {
    async fn ids_at(&self, namespace: Namespace, indices: &[EntityIndex]) -> Result<Vec<Option<String>>> {
        let graph = self.graph(namespace);
        Ok(indices
            .iter()
            .map(|&index| graph.id_at(index).map(str::to_string))
            .collect())
    }

    async fn contains_user(&self, user_id: &UserId) -> Result<bool> {
        Ok(Snapshot::contains_user(self, user_id))
    }

    async fn user_attributes(&self, user_id: &UserId) -> Result<Option<UserAttributes>> {
        Ok(self.get_user(user_id).cloned())
    }

    async fn business_attributes(
        &self,
        ids: &[BusinessId],
    ) -> Result<HashMap<BusinessId, BusinessAttributes>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.get_business(id).map(|b| (id.clone(), b.clone())))
            .collect())
    }

    async fn user_interactions(&self, user_id: &UserId) -> Result<Vec<Interaction>> {
        Ok(self.get_user_interactions(user_id).to_vec())
    }
}

#[async_trait]
impl ClusterTable for Snapshot {
    async fn vocabulary(&self) -> Result<CategoryVocabulary> {
        Ok(Snapshot::vocabulary(self).clone())
    }

    async fn centroids(&self) -> Result<Vec<ClusterCentroid>> {
        Ok(Snapshot::centroids(self).to_vec())
    }

    async fn cluster_interactions(&self, cluster: ClusterId) -> Result<Vec<(BusinessId, f64)>> {
        Ok(self.get_cluster_interactions(cluster).to_vec())
    }

    async fn assigned_cluster(&self, user_id: &UserId) -> Result<Option<ClusterId>> {
        Ok(Snapshot::assigned_cluster(self, user_id))
    }
}

/// Brute-force scan: every business row is scored, then the shared top-k
/// ordering picks the result.
#[async_trait]
impl EmbeddingStore for Snapshot {
    async fn user_embedding(&self, user_id: &UserId) -> Result<Option<Vec<f32>>> {
        Ok(self.user_embeddings().get(user_id).map(<[f32]>::to_vec))
    }

    async fn nearest_businesses(&self, query: &[f32], k: usize) -> Result<Vec<(BusinessId, f64)>> {
        let table = self.business_embeddings();
        if table.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != table.dim() {
            return Err(RecommendError::InvalidArgument(format!(
                "query has {} dimensions, business embeddings have {}",
                query.len(),
                table.dim()
            )));
        }
        let norm = dot(query, query).sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(RecommendError::InvalidArgument(
                "query embedding must be finite and non-zero".to_string(),
            ));
        }

        let scored: Vec<(&BusinessId, f64)> = table
            .ids()
            .par_iter()
            .zip(table.vectors().par_chunks_exact(table.dim()))
            .map(|(id, vector)| (id, dot(query, vector) / norm))
            .collect();

        Ok(top_k_by_score(scored, k)
            .into_iter()
            .map(|(id, score)| (id.clone(), score))
            .collect())
    }
}
