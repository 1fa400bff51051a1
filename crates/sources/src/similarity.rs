//! Top-k neighbor lookup over the precomputed similarity graphs.

use crate::error::{Result, require_positive};
use crate::ranking::sort_by_score;
use crate::traits::{EntityCatalog, SimilarityStore};
use data_loader::{EntityIndex, EntityKey, Namespace};
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed, ranked access to the neighbor lists of one snapshot.
///
/// Cheap to clone; all generators share one instance.
#[derive(Clone)]
pub struct SimilarityIndex {
    store: Arc<dyn SimilarityStore>,
    catalog: Arc<dyn EntityCatalog>,
}

impl SimilarityIndex {
    pub fn new(store: Arc<dyn SimilarityStore>, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self { store, catalog }
    }

    /// The `k` most similar entities to `entity` in `namespace`.
    ///
    /// Ranked by score descending, ties by ascending neighbor index. An
    /// entity without a neighbor list yields an empty result. Neighbor
    /// indices with no id in the namespace are skipped.
    ///
    /// Ids are resolved for the ranked prefix only; a further batch is
    /// fetched when skipped indices leave fewer than `k` neighbors.
    pub async fn top_k_neighbors<K: EntityKey>(
        &self,
        namespace: Namespace,
        entity: &K,
        k: usize,
    ) -> Result<Vec<(K, f64)>> {
        require_positive("k", k)?;

        let Some(mut list) = self.store.lookup(namespace, entity.as_raw()).await? else {
            debug!("No {} neighbor list for {}", namespace, entity);
            return Ok(Vec::new());
        };
        sort_by_score(&mut list);

        let mut neighbors = Vec::with_capacity(k.min(list.len()));
        let mut next = 0;
        while neighbors.len() < k && next < list.len() {
            let end = (next + k - neighbors.len()).min(list.len());
            let batch = &list[next..end];
            let indices: Vec<EntityIndex> = batch.iter().map(|(index, _)| *index).collect();
            let ids = self.catalog.ids_at(namespace, &indices).await?;

            for (&(index, score), id) in batch.iter().zip(ids) {
                match id {
                    Some(raw) => neighbors.push((K::from_raw(raw), score)),
                    None => warn!(
                        "{} neighbor index {} of {} has no id; skipping",
                        namespace, index.0, entity
                    ),
                }
            }
            next = end;
        }
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecommendError;
    use data_loader::{BusinessId, Snapshot, UserId};

    fn build_index(snapshot: Snapshot) -> SimilarityIndex {
        let snapshot = Arc::new(snapshot);
        SimilarityIndex::new(snapshot.clone(), snapshot)
    }

    fn item_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert_neighbors(
            Namespace::Item,
            "B1",
            &[("B4", 0.4), ("B3", 0.9), ("B5", -0.2), ("B6", 0.7)],
        );
        snapshot
    }

    #[tokio::test]
    async fn test_top_k_sorted_and_truncated() {
        let index = build_index(item_snapshot());

        let neighbors = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B1"), 2)
            .await
            .unwrap();

        assert_eq!(
            neighbors,
            vec![(BusinessId::from("B3"), 0.9), (BusinessId::from("B6"), 0.7)]
        );
    }

    #[tokio::test]
    async fn test_top_k_scores_non_increasing() {
        let index = build_index(item_snapshot());

        for k in 1..=6 {
            let neighbors = index
                .top_k_neighbors(Namespace::Item, &BusinessId::from("B1"), k)
                .await
                .unwrap();
            assert!(neighbors.len() <= k);
            assert!(neighbors.windows(2).all(|w| w[0].1 >= w[1].1));
        }
    }

    #[tokio::test]
    async fn test_fewer_neighbors_than_k() {
        let index = build_index(item_snapshot());

        let neighbors = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B1"), 50)
            .await
            .unwrap();

        assert_eq!(neighbors.len(), 4);
        assert_eq!(neighbors[3], (BusinessId::from("B5"), -0.2));
    }

    #[tokio::test]
    async fn test_absent_entity_is_empty() {
        let index = build_index(item_snapshot());

        let neighbors = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B404"), 5)
            .await
            .unwrap();
        assert!(neighbors.is_empty());

        // B3 is registered but has no list of its own
        let neighbors = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B3"), 5)
            .await
            .unwrap();
        assert!(neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_is_invalid() {
        let index = build_index(item_snapshot());

        let result = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B1"), 0)
            .await;
        assert!(matches!(result, Err(RecommendError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_ties_break_by_neighbor_index() {
        let mut snapshot = Snapshot::new();
        // registration order fixes the indices: U1=0, U9=1, U2=2, U5=3
        snapshot.register_entity(Namespace::User, "U1");
        snapshot.register_entity(Namespace::User, "U9");
        snapshot.register_entity(Namespace::User, "U2");
        snapshot.insert_neighbors(
            Namespace::User,
            "U1",
            &[("U5", 0.5), ("U2", 0.5), ("U9", 0.5)],
        );
        let index = build_index(snapshot);

        let neighbors = index
            .top_k_neighbors(Namespace::User, &UserId::from("U1"), 3)
            .await
            .unwrap();

        let ids: Vec<&str> = neighbors.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["U9", "U2", "U5"]);
    }

    #[tokio::test]
    async fn test_unmapped_index_is_skipped() {
        struct DanglingStore;

        #[async_trait::async_trait]
        impl SimilarityStore for DanglingStore {
            async fn lookup(
                &self,
                _namespace: Namespace,
                _raw_id: &str,
            ) -> Result<Option<data_loader::NeighborList>> {
                Ok(Some(vec![
                    (EntityIndex(0), 0.3),
                    (EntityIndex(42), 0.9),
                    (EntityIndex(1), 0.1),
                ]))
            }
        }

        let mut snapshot = Snapshot::new();
        snapshot.register_entity(Namespace::Item, "B1");
        snapshot.register_entity(Namespace::Item, "B2");
        let index = SimilarityIndex::new(Arc::new(DanglingStore), Arc::new(snapshot));

        let neighbors = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B1"), 2)
            .await
            .unwrap();

        assert_eq!(
            neighbors,
            vec![(BusinessId::from("B1"), 0.3), (BusinessId::from("B2"), 0.1)]
        );
    }

    /// Delegates to a snapshot and counts the indices it is asked to resolve
    struct CountingCatalog {
        snapshot: Snapshot,
        resolved: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EntityCatalog for CountingCatalog {
        async fn ids_at(&self, namespace: Namespace, indices: &[EntityIndex]) -> Result<Vec<Option<String>>> {
            self.resolved
                .fetch_add(indices.len(), std::sync::atomic::Ordering::SeqCst);
            self.snapshot.ids_at(namespace, indices).await
        }

        async fn contains_user(&self, user_id: &UserId) -> Result<bool> {
            EntityCatalog::contains_user(&self.snapshot, user_id).await
        }

        async fn user_attributes(&self, user_id: &UserId) -> Result<Option<data_loader::UserAttributes>> {
            self.snapshot.user_attributes(user_id).await
        }

        async fn business_attributes(
            &self,
            ids: &[BusinessId],
        ) -> Result<std::collections::HashMap<BusinessId, data_loader::BusinessAttributes>> {
            self.snapshot.business_attributes(ids).await
        }

        async fn user_interactions(&self, user_id: &UserId) -> Result<Vec<data_loader::Interaction>> {
            self.snapshot.user_interactions(user_id).await
        }
    }

    /// B000 with 100 neighbors, B001 scoring lowest and B100 highest
    fn wide_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        let names: Vec<String> = (0..100).map(|i| format!("B{:03}", i + 1)).collect();
        let neighbors: Vec<(&str, f64)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i as f64 / 100.0))
            .collect();
        snapshot.insert_neighbors(Namespace::Item, "B000", &neighbors);
        snapshot
    }

    #[tokio::test]
    async fn test_only_kept_neighbors_are_resolved() {
        let catalog = Arc::new(CountingCatalog {
            snapshot: wide_snapshot(),
            resolved: std::sync::atomic::AtomicUsize::new(0),
        });
        let index = SimilarityIndex::new(Arc::new(wide_snapshot()), catalog.clone());

        let top = index
            .top_k_neighbors(Namespace::Item, &BusinessId::from("B000"), 3)
            .await
            .unwrap();

        let ids: Vec<&str> = top.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["B100", "B099", "B098"]);
        assert_eq!(catalog.resolved.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
