//! Cold-start cluster resolution.
//!
//! A user with no history is described by a set of category tags. The tags
//! are encoded over the vocabulary the clusters were built with and matched
//! to the nearest cluster representative by Jaccard distance (1-NN).

use crate::error::{RecommendError, Result};
use crate::traits::{ClusterTable, EntityCatalog};
use data_loader::{ClusterCentroid, ClusterId, UserId};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maps category tags (or a known user's rating history) to a cluster
#[derive(Clone)]
pub struct ClusterResolver {
    clusters: Arc<dyn ClusterTable>,
    catalog: Arc<dyn EntityCatalog>,
}

impl ClusterResolver {
    pub fn new(clusters: Arc<dyn ClusterTable>, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self { clusters, catalog }
    }

    /// Nearest cluster to a tag set.
    ///
    /// Unknown tags are dropped. Ties on distance go to the lowest cluster id.
    #[instrument(skip(self, tags), fields(tags = tags.len()))]
    pub async fn resolve_cluster<S: AsRef<str> + Sync>(&self, tags: &[S]) -> Result<ClusterId> {
        self.resolve_with_distance(tags).await.map(|(cluster, _)| cluster)
    }

    /// Like [`resolve_cluster`](Self::resolve_cluster), also returning the winning distance
    pub async fn resolve_with_distance<S: AsRef<str> + Sync>(
        &self,
        tags: &[S],
    ) -> Result<(ClusterId, f64)> {
        if tags.is_empty() {
            return Err(RecommendError::InvalidArgument(
                "category list must not be empty".to_string(),
            ));
        }

        let centroids = self.clusters.centroids().await?;
        if centroids.is_empty() {
            return Err(RecommendError::NoClustersAvailable);
        }

        let vocabulary = self.clusters.vocabulary().await?;
        for tag in tags {
            if !vocabulary.contains(tag.as_ref()) {
                debug!("Dropping category '{}' not in the cluster vocabulary", tag.as_ref());
            }
        }
        let query = vocabulary.encode(tags);

        let (cluster, distance) = nearest_centroid(&centroids, |centroid| {
            query.jaccard_distance(&centroid.vector)
        })
        .ok_or(RecommendError::NoClustersAvailable)?;

        debug!("Resolved {} categories to {} (distance {:.4})", tags.len(), cluster, distance);
        Ok((cluster, distance))
    }

    /// Cluster of a known user: the stored assignment, otherwise the cluster
    /// nearest to the categories of the businesses the user rated.
    ///
    /// `None` when there is no assignment and no usable history.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn cluster_for_user(&self, user_id: &UserId) -> Result<Option<ClusterId>> {
        if let Some(cluster) = self.clusters.assigned_cluster(user_id).await? {
            return Ok(Some(cluster));
        }

        let interactions = self.catalog.user_interactions(user_id).await?;
        if interactions.is_empty() {
            return Ok(None);
        }
        let rated: Vec<_> = interactions.into_iter().map(|i| i.business_id).collect();
        let profiles = self.catalog.business_attributes(&rated).await?;

        let mut categories: Vec<String> = profiles
            .into_values()
            .flat_map(|business| business.categories)
            .collect();
        categories.sort_unstable();
        categories.dedup();
        if categories.is_empty() {
            debug!("No categories among the businesses {} rated", user_id);
            return Ok(None);
        }

        match self.resolve_cluster(categories.as_slice()).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(RecommendError::NoClustersAvailable) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Brute-force 1-NN over every representative.
///
/// Distances compare with `total_cmp`, then cluster id, so the winner does not
/// depend on how the scan is split across threads.
fn nearest_centroid<F>(centroids: &[ClusterCentroid], distance: F) -> Option<(ClusterId, f64)>
where
    F: Fn(&ClusterCentroid) -> f64 + Sync,
{
    centroids
        .par_iter()
        .map(|centroid| (centroid.cluster, distance(centroid)))
        .min_by(|a, b| compare_candidates(a, b))
}

fn compare_candidates(a: &(ClusterId, f64), b: &(ClusterId, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}
