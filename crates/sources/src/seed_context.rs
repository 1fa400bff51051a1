//! Build a [`SeedContext`] from a request seed.
//!
//! Everything the generators need about the seed is gathered here once:
//! - known users: existence check, rated businesses, and (when ClusterCF
//!   will run) their cluster
//! - cold-start seeds: the nearest cluster to the given categories

use crate::cluster::ClusterResolver;
use crate::error::{RecommendError, Result};
use crate::traits::EntityCatalog;
use crate::types::{Seed, SeedContext};
use tracing::debug;

/// Resolve `seed` into a context.
///
/// `needs_cluster` controls whether a known user's cluster is looked up;
/// cold-start seeds always resolve one since it is all they have.
pub async fn build_seed_context(
    catalog: &dyn EntityCatalog,
    resolver: &ClusterResolver,
    seed: &Seed,
    needs_cluster: bool,
) -> Result<SeedContext> {
    match seed {
        Seed::Known(user_id) => {
            if !catalog.contains_user(user_id).await? {
                return Err(RecommendError::user_not_found(user_id));
            }

            let mut context = SeedContext::for_user(user_id.clone());
            context.rated = catalog
                .user_interactions(user_id)
                .await?
                .into_iter()
                .map(|i| i.business_id)
                .collect();

            if needs_cluster {
                context.cluster = resolver.cluster_for_user(user_id).await?;
                if context.cluster.is_none() {
                    debug!("User {} has no cluster; ClusterCF will be empty", user_id);
                }
            }
            Ok(context)
        }
        Seed::ColdStart(categories) => {
            let cluster = resolver.resolve_cluster(categories.as_slice()).await?;
            debug!("Cold-start seed mapped to {}", cluster);
            Ok(SeedContext::for_cluster(cluster))
        }
    }
}
