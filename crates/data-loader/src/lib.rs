//! # Data Loader Crate
//!
//! This crate loads the offline-built similarity snapshot that the
//! recommendation engine serves from.
//!
//! ## Main Components
//!
//! - **types**: Typed ids (UserId, BusinessId, ClusterId), attribute records,
//!   neighbor graphs and the `Snapshot` itself
//! - **category**: Category vocabulary and packed multi-hot vectors
//! - **embedding**: Normalized user and business embeddings
//! - **parser**: JSON-lines parsing of the snapshot tables
//! - **index**: Parallel loading and validation
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Namespace, Snapshot, UserId};
//! use std::path::Path;
//!
//! let snapshot = Snapshot::load_from_dir(Path::new("data/snapshot"))?;
//! let history = snapshot.get_user_interactions(&UserId::from("U1"));
//! let graph = snapshot.graph(Namespace::Item);
//!
//! println!("U1 rated {} businesses, {} items indexed", history.len(), graph.len());
//! ```

// Public modules
pub mod category;
pub mod embedding;
pub mod error;
pub mod index;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use category::{CategoryVector, CategoryVocabulary};
pub use embedding::EmbeddingTable;
pub use error::{DataLoadError, Result};
pub use index::RATING_RANGE;
pub use types::{
    BusinessAttributes,
    BusinessId,
    ClusterCentroid,
    ClusterId,
    Compliment,
    EntityIndex,
    EntityKey,
    Interaction,
    Namespace,
    NeighborGraph,
    NeighborList,
    Snapshot,
    UserAttributes,
    UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserAttributes {
        UserAttributes {
            user_id: UserId::from(id),
            name: Some("Ada".to_string()),
            review_count: 10,
            useful: 4,
            funny: 1,
            cool: 2,
            fans: 0,
            average_stars: 4.1,
            compliments: vec![Compliment::Cool],
        }
    }

    #[test]
    fn test_snapshot_creation() {
        let snapshot = Snapshot::new();
        let (users, businesses, interactions, clusters) = snapshot.counts();

        assert_eq!(users, 0);
        assert_eq!(businesses, 0);
        assert_eq!(interactions, 0);
        assert_eq!(clusters, 0);
    }

    #[test]
    fn test_insert_user_and_interaction() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_user(user("U1"));
        snapshot.insert_interaction(Interaction {
            user_id: UserId::from("U1"),
            business_id: BusinessId::from("B1"),
            rating: 5.0,
        });

        let retrieved = snapshot.get_user(&UserId::from("U1")).unwrap();
        assert_eq!(retrieved.review_count, 10);
        assert_eq!(snapshot.get_user_interactions(&UserId::from("U1")).len(), 1);
        assert!(snapshot.contains_user(&UserId::from("U1")));
    }

    #[test]
    fn test_insert_neighbors_assigns_dense_indices() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_neighbors(Namespace::Item, "B1", &[("B3", 0.9), ("B4", 0.4)]);
        snapshot.insert_neighbors(Namespace::Item, "B2", &[("B3", 0.2), ("B5", 0.5)]);

        let graph = snapshot.graph(Namespace::Item);
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.index_of("B1"), Some(EntityIndex(0)));
        assert_eq!(graph.index_of("B3"), Some(EntityIndex(1)));
        assert_eq!(graph.index_of("B2"), Some(EntityIndex(3)));
        assert_eq!(graph.id_at(EntityIndex(4)), Some("B5"));
        assert!(snapshot.graph(Namespace::User).is_empty());
    }

    #[test]
    fn test_empty_queries() {
        let snapshot = Snapshot::new();

        assert!(snapshot.get_user(&UserId::from("nobody")).is_none());
        assert!(snapshot.get_business(&BusinessId::from("nowhere")).is_none());
        assert!(snapshot.get_user_interactions(&UserId::from("nobody")).is_empty());
        assert!(snapshot.get_cluster_interactions(ClusterId(9)).is_empty());
        assert!(snapshot.graph(Namespace::Cluster).neighbors("B1").is_none());
        assert!(!snapshot.contains_user(&UserId::from("nobody")));
    }

    #[test]
    fn test_ids_of_different_namespaces_are_distinct_types() {
        let user = UserId::from("42");
        let business = BusinessId::from("42");
        assert_eq!(user.as_str(), business.as_str());
        assert_eq!(format!("{}", ClusterId(3)), "cluster-3");
        assert_eq!("Cluster".parse::<Namespace>(), Ok(Namespace::Cluster));
    }
}
