//! Snapshot loading and validation.
//!
//! A snapshot directory is parsed in parallel with Rayon, assembled into a
//! `Snapshot`, and validated before anything is allowed to serve from it.

use crate::error::{DataLoadError, Result};
use crate::parser::{
    self, AssignmentRecord, ClusterInteractionRecord, ClusterRecord, EmbeddingRecord, NeighborRecord,
};
use crate::types::*;
use std::path::Path;
use tracing::info;

/// Valid rating range for interactions
pub const RATING_RANGE: std::ops::RangeInclusive<f32> = 1.0..=5.0;

struct ClusterTables {
    vocabulary: Vec<String>,
    clusters: Vec<ClusterRecord>,
    assignments: Vec<AssignmentRecord>,
    interactions: Vec<ClusterInteractionRecord>,
}

struct EmbeddingTables {
    users: Vec<EmbeddingRecord<UserId>>,
    businesses: Vec<EmbeddingRecord<BusinessId>>,
}

impl Snapshot {
    /// Load a snapshot directory.
    ///
    /// Steps:
    /// 1. Parse every table in parallel
    /// 2. Build the three neighbor graphs (checks the index bijection)
    /// 3. Insert profiles, interactions, cluster tables and embeddings
    /// 4. Validate
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        if !data_dir.is_dir() {
            return Err(DataLoadError::FileNotFound {
                path: data_dir.display().to_string(),
            });
        }
        info!("Loading snapshot from {:?}", data_dir);

        let (((users, businesses), interactions), (graphs, (cluster_tables, embeddings))) = rayon::join(
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || parser::parse_optional_jsonl::<UserAttributes>(&data_dir.join("users.jsonl")),
                            || {
                                parser::parse_optional_jsonl::<BusinessAttributes>(
                                    &data_dir.join("businesses.jsonl"),
                                )
                            },
                        )
                    },
                    || parser::parse_optional_jsonl::<Interaction>(&data_dir.join("interactions.jsonl")),
                )
            },
            || {
                rayon::join(
                    || load_graphs(data_dir),
                    || rayon::join(|| load_cluster_tables(data_dir), || load_embeddings(data_dir)),
                )
            },
        );

        let users = users?;
        let businesses = businesses?;
        let interactions = interactions?;
        let graphs = graphs?;
        let cluster_tables = cluster_tables?;
        let embeddings = embeddings?;

        let mut snapshot = Snapshot::new();
        snapshot.graphs = graphs;

        for user in users {
            snapshot.insert_user(user);
        }
        for business in businesses {
            snapshot.insert_business(business);
        }
        for interaction in interactions {
            snapshot.insert_interaction(interaction);
        }

        snapshot.set_vocabulary(cluster_tables.vocabulary.as_slice());
        for record in &cluster_tables.clusters {
            if let Some(unknown) = record
                .categories
                .iter()
                .find(|tag| !snapshot.vocabulary.contains(tag))
            {
                return Err(DataLoadError::MissingReference {
                    entity: format!("category of {}", record.cluster),
                    id: unknown.clone(),
                });
            }
            snapshot.insert_centroid(record.cluster, record.categories.as_slice());
        }
        for record in cluster_tables.assignments {
            snapshot.assign_cluster(record.user_id, record.cluster);
        }
        for record in cluster_tables.interactions {
            snapshot.insert_cluster_interaction(record.cluster, record.business_id, record.score);
        }
        for record in embeddings.users {
            snapshot.insert_user_embedding(record.id, &record.vector)?;
        }
        for record in embeddings.businesses {
            snapshot.insert_business_embedding(record.id, &record.vector)?;
        }

        snapshot.validate()?;

        let (users, businesses, interactions, clusters) = snapshot.counts();
        info!(
            "Loaded {} users, {} businesses, {} interactions, {} clusters",
            users, businesses, interactions, clusters
        );
        for namespace in Namespace::ALL {
            info!(
                "{} graph: {} entities, {} neighbor lists",
                namespace,
                snapshot.graph(namespace).len(),
                snapshot.graph(namespace).lists.len()
            );
        }
        info!(
            "Embeddings: {} users, {} businesses ({} dimensions)",
            snapshot.user_embeddings.len(),
            snapshot.business_embeddings.len(),
            snapshot.business_embeddings.dim()
        );
        Ok(snapshot)
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - interaction ratings are in range
    /// - cluster interaction scores are finite
    /// - user and business embeddings share one dimension
    pub fn validate(&self) -> Result<()> {
        for interactions in self.user_interactions.values() {
            for interaction in interactions {
                if !RATING_RANGE.contains(&interaction.rating) {
                    return Err(DataLoadError::InvalidValue {
                        field: format!(
                            "rating of {} by {}",
                            interaction.business_id, interaction.user_id
                        ),
                        value: interaction.rating.to_string(),
                    });
                }
            }
        }
        for (cluster, interactions) in &self.cluster_interactions {
            if let Some((business_id, score)) = interactions.iter().find(|(_, s)| !s.is_finite()) {
                return Err(DataLoadError::InvalidValue {
                    field: format!("{cluster} score of {business_id}"),
                    value: score.to_string(),
                });
            }
        }
        let (user_dim, business_dim) = (self.user_embeddings.dim(), self.business_embeddings.dim());
        if user_dim != 0 && business_dim != 0 && user_dim != business_dim {
            return Err(DataLoadError::InvalidValue {
                field: "embedding dimension (users vs businesses)".to_string(),
                value: format!("{user_dim} vs {business_dim}"),
            });
        }
        Ok(())
    }
}

fn load_graphs(data_dir: &Path) -> Result<[NeighborGraph; 3]> {
    let files = [
        (Namespace::Item, "item_similarity.jsonl"),
        (Namespace::User, "user_similarity.jsonl"),
        (Namespace::Cluster, "cluster_item_similarity.jsonl"),
    ];
    let mut graphs: [NeighborGraph; 3] = Default::default();
    for (namespace, file) in files {
        let records = parser::parse_optional_jsonl::<NeighborRecord>(&data_dir.join(file))?;
        graphs[namespace.slot()] = parser::build_graph(namespace, records)?;
    }
    Ok(graphs)
}

fn load_cluster_tables(data_dir: &Path) -> Result<ClusterTables> {
    Ok(ClusterTables {
        vocabulary: parser::parse_vocabulary(&data_dir.join("vocabulary.json"))?,
        clusters: parser::parse_optional_jsonl(&data_dir.join("clusters.jsonl"))?,
        assignments: parser::parse_optional_jsonl(&data_dir.join("cluster_assignments.jsonl"))?,
        interactions: parser::parse_optional_jsonl(&data_dir.join("cluster_interactions.jsonl"))?,
    })
}

fn load_embeddings(data_dir: &Path) -> Result<EmbeddingTables> {
    Ok(EmbeddingTables {
        users: parser::parse_optional_jsonl(&data_dir.join("user_embeddings.jsonl"))?,
        businesses: parser::parse_optional_jsonl(&data_dir.join("business_embeddings.jsonl"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("data-loader-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("users.jsonl"),
            r#"{"user_id": "U1", "review_count": 12, "fans": 2, "average_stars": 3.9, "compliments": ["cool", "funny"]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("businesses.jsonl"),
            concat!(
                r#"{"business_id": "B1", "name": "Slice House", "stars": 4.0, "categories": ["Pizza"]}"#,
                "\n",
                r#"{"business_id": "B2", "name": "Night Owl", "stars": 3.5, "categories": ["Bars"]}"#,
            ),
        )
        .unwrap();
        fs::write(
            dir.join("interactions.jsonl"),
            concat!(
                r#"{"user_id": "U1", "business_id": "B1", "rating": 5.0}"#,
                "\n\n",
                r#"{"user_id": "U1", "business_id": "B2", "rating": 3.0}"#,
            ),
        )
        .unwrap();
        fs::write(
            dir.join("item_similarity.jsonl"),
            concat!(
                r#"{"id": "B1", "index": 0, "neighbors": [[1, 0.7]]}"#,
                "\n",
                r#"{"id": "B2", "index": 1, "neighbors": [[0, 0.7]]}"#,
            ),
        )
        .unwrap();
        fs::write(dir.join("vocabulary.json"), r#"["Pizza", "Bars"]"#).unwrap();
        fs::write(dir.join("clusters.jsonl"), r#"{"cluster": 4, "categories": ["Pizza"]}"#).unwrap();
        fs::write(dir.join("cluster_assignments.jsonl"), r#"{"user_id": "U1", "cluster": 4}"#).unwrap();
        fs::write(
            dir.join("cluster_interactions.jsonl"),
            r#"{"cluster": 4, "business_id": "B1", "score": 4.2}"#,
        )
        .unwrap();
        fs::write(dir.join("user_embeddings.jsonl"), r#"{"id": "U1", "vector": [0.0, 2.0]}"#).unwrap();
        fs::write(
            dir.join("business_embeddings.jsonl"),
            concat!(
                r#"{"id": "B1", "vector": [1.0, 1.0]}"#,
                "\n",
                r#"{"id": "B2", "vector": [0.0, 0.5]}"#,
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_load_snapshot_dir() {
        let dir = scratch_dir("load");
        write_fixture(&dir);

        let snapshot = Snapshot::load_from_dir(&dir).unwrap();
        let (users, businesses, interactions, clusters) = snapshot.counts();

        assert_eq!(users, 1);
        assert_eq!(businesses, 2);
        assert_eq!(interactions, 2);
        assert_eq!(clusters, 1);
        assert_eq!(snapshot.graph(Namespace::Item).len(), 2);
        assert!(snapshot.graph(Namespace::User).is_empty());
        assert_eq!(snapshot.assigned_cluster(&UserId::from("U1")), Some(ClusterId(4)));
        assert_eq!(snapshot.get_cluster_interactions(ClusterId(4)).len(), 1);
        assert_eq!(snapshot.business_embeddings().len(), 2);
        assert_eq!(
            snapshot.user_embeddings().get(&UserId::from("U1")),
            Some(&[0.0, 1.0][..])
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory() {
        let result = Snapshot::load_from_dir(Path::new("/definitely/not/a/snapshot"));
        assert!(matches!(result, Err(DataLoadError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let dir = scratch_dir("parse-error");
        fs::write(
            dir.join("interactions.jsonl"),
            concat!(
                r#"{"user_id": "U1", "business_id": "B1", "rating": 5.0}"#,
                "\n",
                r#"{"user_id": "U1", "business_id": }"#,
            ),
        )
        .unwrap();

        match Snapshot::load_from_dir(&dir) {
            Err(DataLoadError::ParseError { file, line, .. }) => {
                assert_eq!(file, "interactions.jsonl");
                assert_eq!(line, 2);
            }
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_rejects_out_of_range_rating() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_interaction(Interaction {
            user_id: UserId::from("U1"),
            business_id: BusinessId::from("B1"),
            rating: 7.0,
        });

        assert!(matches!(
            snapshot.validate(),
            Err(DataLoadError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_embedding_dimensions_must_agree() {
        let dir = scratch_dir("embedding-dims");
        fs::write(dir.join("user_embeddings.jsonl"), r#"{"id": "U1", "vector": [1.0, 0.0, 0.0]}"#).unwrap();
        fs::write(dir.join("business_embeddings.jsonl"), r#"{"id": "B1", "vector": [1.0, 0.0]}"#).unwrap();

        let result = Snapshot::load_from_dir(&dir);
        assert!(matches!(result, Err(DataLoadError::InvalidValue { .. })));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_centroid_with_unknown_category_is_rejected() {
        let dir = scratch_dir("unknown-category");
        fs::write(dir.join("vocabulary.json"), r#"["Pizza"]"#).unwrap();
        fs::write(dir.join("clusters.jsonl"), r#"{"cluster": 1, "categories": ["Tacos"]}"#).unwrap();

        let result = Snapshot::load_from_dir(&dir);
        assert!(matches!(result, Err(DataLoadError::MissingReference { .. })));

        let _ = fs::remove_dir_all(&dir);
    }
}
