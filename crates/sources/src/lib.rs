//! # Sources Crate
//!
//! Candidate retrieval for business recommendations.
//!
//! ## Components
//!
//! ### SimilarityIndex
//! Ranked top-k lookups over the precomputed item, user, and cluster-item
//! neighbor graphs.
//!
//! ### ClusterResolver
//! Maps a cold-start category list to the nearest cluster (Jaccard 1-NN), and
//! a known user to their stored or inferred cluster.
//!
//! ### Generators
//! - **ItemCF**: "businesses similar to the ones you rated"
//! - **UserCF**: "businesses rated by users like you"
//! - **ClusterCF**: "businesses similar to the ones your cluster likes"
//! - **Embedding**: "businesses whose embedding is close to yours"
//!
//! Every generator ranks with the shared ordering in [`ranking`]: score
//! descending, then business id ascending.
//!
//! Snapshot-backed collaborators never suspend, so the generators yield to
//! the runtime between seeds. That keeps a request deadline enforceable and
//! lets other requests run on the same worker.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{build_seed_context, CandidateGenerator, ClusterResolver, ItemCfSource, Seed, SimilarityIndex};
//! use data_loader::{Snapshot, UserId};
//! use std::sync::Arc;
//!
//! let snapshot = Arc::new(Snapshot::load_from_dir("data/snapshot".as_ref())?);
//! let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());
//! let resolver = ClusterResolver::new(snapshot.clone(), snapshot.clone());
//!
//! let seed = Seed::Known(UserId::from("U1"));
//! let context = build_seed_context(&*snapshot, &resolver, &seed, false).await?;
//!
//! let item_cf = ItemCfSource::new(index, snapshot.clone());
//! let candidates = item_cf.generate(&context, 20, 100).await?;
//! ```

// Public modules
pub mod cluster;
pub mod cluster_cf;
pub mod embedding;
pub mod error;
pub mod item_cf;
pub mod memory;
pub mod ranking;
pub mod seed_context;
pub mod similarity;
pub mod traits;
pub mod types;
pub mod user_cf;

// Re-export commonly used types
pub use cluster::ClusterResolver;
pub use cluster_cf::ClusterCfSource;
pub use embedding::EmbeddingSource;
pub use error::{RecommendError, Result};
pub use item_cf::ItemCfSource;
pub use ranking::{CandidateScoreMap, top_k_by_score};
pub use seed_context::build_seed_context;
pub use similarity::SimilarityIndex;
pub use traits::{CandidateGenerator, ClusterTable, EmbeddingStore, EntityCatalog, SimilarityStore};
pub use types::{Candidate, CandidateSource, Seed, SeedContext};
pub use user_cf::{UserCfSource, UserCfWeighting};

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{BusinessId, Interaction, Namespace, Snapshot, UserId};
    use std::sync::Arc;

    fn create_test_snapshot() -> Arc<Snapshot> {
        let mut snapshot = Snapshot::new();
        snapshot.insert_interaction(Interaction {
            user_id: UserId::from("U1"),
            business_id: BusinessId::from("B1"),
            rating: 5.0,
        });
        snapshot.insert_neighbors(Namespace::Item, "B1", &[("B2", 0.5)]);
        Arc::new(snapshot)
    }

    #[tokio::test]
    async fn test_generators_share_one_index() {
        let snapshot = create_test_snapshot();
        let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());

        let generators: Vec<Box<dyn CandidateGenerator>> = vec![
            Box::new(ItemCfSource::new(index.clone(), snapshot.clone())),
            Box::new(UserCfSource::new(index.clone(), snapshot.clone())),
            Box::new(ClusterCfSource::new(index, snapshot.clone())),
            Box::new(EmbeddingSource::new(snapshot.clone())),
        ];
        let sources: Vec<CandidateSource> = generators.iter().map(|g| g.source()).collect();
        assert_eq!(sources, CandidateSource::ALL.to_vec());

        let seed = SeedContext::for_user(UserId::from("U1"));
        let item_cf = generators[0].generate(&seed, 5, 5).await.unwrap();
        assert_eq!(item_cf, vec![Candidate::new("B2", CandidateSource::ItemCf, 0.5)]);
    }

    #[test]
    fn test_candidate_creation() {
        let candidate = Candidate::new("B1", CandidateSource::UserCf, 0.85);
        assert_eq!(candidate.business_id, BusinessId::from("B1"));
        assert_eq!(candidate.source, CandidateSource::UserCf);
        assert_eq!(candidate.score, 0.85);
    }

    #[test]
    fn test_candidate_source_parsing() {
        assert_eq!("item-cf".parse::<CandidateSource>(), Ok(CandidateSource::ItemCf));
        assert_eq!("UserCF".parse::<CandidateSource>(), Ok(CandidateSource::UserCf));
        assert_eq!("cluster_cf".parse::<CandidateSource>(), Ok(CandidateSource::ClusterCf));
        assert_eq!("two-tower".parse::<CandidateSource>(), Ok(CandidateSource::Embedding));
        assert!("popularity".parse::<CandidateSource>().is_err());
        assert_eq!(CandidateSource::ClusterCf.to_string(), "cluster_cf");
    }
}
