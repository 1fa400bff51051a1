//! Feature rows for the rerank model.
//!
//! The user vector is fetched once and broadcast across every candidate:
//! one row per (user, candidate) pair, user columns first.
//!
//! ## Row layout
//! | columns | content |
//! |---------|---------|
//! | 0..6    | review_count, useful, funny, cool, fans, average_stars |
//! | 6..17   | compliment one-hot, in [`Compliment::ALL`] order |
//! | 17..22  | stars, review_count, avg_review, latitude, longitude |

use data_loader::{BusinessAttributes, BusinessId, Compliment, UserAttributes, UserId};
use rayon::prelude::*;
use sources::{EntityCatalog, RecommendError, Result};
use std::sync::Arc;
use tracing::warn;

/// Width of the user block
pub const USER_FEATURES: usize = 6 + Compliment::ALL.len();

/// Width of the business block
pub const BUSINESS_FEATURES: usize = 5;

/// Width of a full row
pub const FEATURE_WIDTH: usize = USER_FEATURES + BUSINESS_FEATURES;

/// One model input row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub user_id: UserId,
    pub business_id: BusinessId,
    pub features: Vec<f32>,
}

/// Rows built for a batch, plus the candidates that could not be assembled
#[derive(Debug, Default)]
pub struct FeatureBatch {
    pub rows: Vec<FeatureRow>,
    pub dropped: Vec<RecommendError>,
}

/// User block of a row
pub fn user_vector(user: &UserAttributes) -> Vec<f32> {
    let mut features = Vec::with_capacity(USER_FEATURES);
    features.push(user.review_count as f32);
    features.push(user.useful as f32);
    features.push(user.funny as f32);
    features.push(user.cool as f32);
    features.push(user.fans as f32);
    features.push(user.average_stars);
    for compliment in Compliment::ALL {
        let present = user.compliments.contains(&compliment);
        features.push(if present { 1.0 } else { 0.0 });
    }
    features
}

/// Business block of a row. A missing review mean counts as 0.
pub fn business_vector(business: &BusinessAttributes) -> Vec<f32> {
    vec![
        business.stars,
        business.review_count as f32,
        business.avg_review_stars.unwrap_or(0.0),
        business.latitude as f32,
        business.longitude as f32,
    ]
}

/// Builds feature rows from catalog attributes
#[derive(Clone)]
pub struct FeatureAssembler {
    catalog: Arc<dyn EntityCatalog>,
}

impl FeatureAssembler {
    pub fn new(catalog: Arc<dyn EntityCatalog>) -> Self {
        Self { catalog }
    }

    /// One row per candidate, in candidate order.
    ///
    /// Candidates without attributes are dropped with a
    /// `FeatureAssemblyError`; the rest of the batch is unaffected.
    pub async fn assemble(&self, user: &UserAttributes, candidates: &[BusinessId]) -> Result<FeatureBatch> {
        let profiles = self.catalog.business_attributes(candidates).await?;
        let user_block = user_vector(user);

        let rows: Vec<std::result::Result<FeatureRow, RecommendError>> = candidates
            .par_iter()
            .map(|business_id| match profiles.get(business_id) {
                Some(business) => {
                    let mut features = Vec::with_capacity(FEATURE_WIDTH);
                    features.extend_from_slice(&user_block);
                    features.extend(business_vector(business));
                    Ok(FeatureRow {
                        user_id: user.user_id.clone(),
                        business_id: business_id.clone(),
                        features,
                    })
                }
                None => Err(RecommendError::FeatureAssemblyError {
                    entity: business_id.to_string(),
                    reason: "no business attributes".to_string(),
                }),
            })
            .collect();

        let mut batch = FeatureBatch::default();
        for row in rows {
            match row {
                Ok(row) => batch.rows.push(row),
                Err(e) => {
                    warn!("{}; dropping candidate", e);
                    batch.dropped.push(e);
                }
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::Snapshot;

    fn user() -> UserAttributes {
        UserAttributes {
            user_id: UserId::from("U1"),
            name: None,
            review_count: 12,
            useful: 3,
            funny: 1,
            cool: 2,
            fans: 5,
            average_stars: 3.5,
            compliments: vec![Compliment::Hot, Compliment::Photos],
        }
    }

    fn business(id: &str, avg_review_stars: Option<f32>) -> BusinessAttributes {
        BusinessAttributes {
            business_id: BusinessId::from(id),
            name: format!("Business {id}"),
            address: None,
            city: Some("Tucson".to_string()),
            state: Some("AZ".to_string()),
            postal_code: None,
            latitude: 32.25,
            longitude: -110.75,
            stars: 4.5,
            review_count: 80,
            is_open: true,
            categories: vec!["Pizza".to_string()],
            avg_review_stars,
        }
    }

    #[test]
    fn test_user_vector_layout() {
        let features = user_vector(&user());

        assert_eq!(features.len(), USER_FEATURES);
        assert_eq!(features[..6].to_vec(), vec![12.0, 3.0, 1.0, 2.0, 5.0, 3.5]);
        // Hot is the first compliment, Photos the last
        assert_eq!(features[6], 1.0);
        assert_eq!(features[USER_FEATURES - 1], 1.0);
        assert_eq!(features[6..].iter().sum::<f32>(), 2.0);
    }

    #[test]
    fn test_business_vector_defaults_review_mean() {
        assert_eq!(business_vector(&business("B1", None))[2], 0.0);
        assert_eq!(
            business_vector(&business("B1", Some(4.25))),
            vec![4.5, 80.0, 4.25, 32.25, -110.75]
        );
    }

    #[tokio::test]
    async fn test_assemble_broadcasts_user_and_drops_missing() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_business(business("B1", Some(4.0)));
        snapshot.insert_business(business("B3", None));
        let assembler = FeatureAssembler::new(Arc::new(snapshot));

        let candidates = vec![
            BusinessId::from("B1"),
            BusinessId::from("B2"),
            BusinessId::from("B3"),
        ];
        let batch = assembler.assemble(&user(), &candidates).await.unwrap();

        let ids: Vec<&str> = batch.rows.iter().map(|r| r.business_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B3"]);
        assert!(batch.rows.iter().all(|r| r.features.len() == FEATURE_WIDTH));
        assert_eq!(batch.rows[0].features[..USER_FEATURES], batch.rows[1].features[..USER_FEATURES]);

        assert_eq!(batch.dropped.len(), 1);
        assert!(matches!(
            &batch.dropped[0],
            RecommendError::FeatureAssemblyError { entity, .. } if entity == "B2"
        ));
    }
}
