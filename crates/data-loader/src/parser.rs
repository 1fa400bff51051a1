//! Parsers for the snapshot files written by the offline build.
//!
//! Every table is JSON-lines (one record per line) except the category
//! vocabulary, which is a single JSON array:
//! - users.jsonl: `UserAttributes`
//! - businesses.jsonl: `BusinessAttributes`
//! - interactions.jsonl: `{"user_id", "business_id", "rating"}`
//! - {item,user,cluster_item}_similarity.jsonl: `{"id", "index", "neighbors": [[index, score], ...]}`
//! - vocabulary.json: `["Pizza", "Bars", ...]`
//! - clusters.jsonl: `{"cluster", "categories": [...]}`
//! - cluster_assignments.jsonl: `{"user_id", "cluster"}`
//! - cluster_interactions.jsonl: `{"cluster", "business_id", "score"}`
//! - {user,business}_embeddings.jsonl: `{"id", "vector": [...]}`

use crate::error::{DataLoadError, Result};
use crate::types::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// One row of a neighbor graph file
#[derive(Debug, Clone, Deserialize)]
pub struct NeighborRecord {
    pub id: String,
    pub index: u32,
    #[serde(default)]
    pub neighbors: Vec<(u32, f64)>,
}

/// Category profile of one cluster representative
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterRecord {
    pub cluster: ClusterId,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRecord {
    pub user_id: UserId,
    pub cluster: ClusterId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterInteractionRecord {
    pub cluster: ClusterId,
    pub business_id: BusinessId,
    pub score: f64,
}

/// One row of an embedding file
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingRecord<K> {
    pub id: K,
    pub vector: Vec<f32>,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a JSON-lines file into records, skipping blank lines
pub fn parse_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(DataLoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path)?;
    let file = file_label(path);
    let mut records = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line_trimmed).map_err(|e| DataLoadError::ParseError {
            file: file.clone(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Like [`parse_jsonl`], but a missing file is an empty table
pub fn parse_optional_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        parse_jsonl(path)
    } else {
        Ok(Vec::new())
    }
}

/// Parse `vocabulary.json`. A missing file yields an empty vocabulary.
pub fn parse_vocabulary(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| DataLoadError::ParseError {
        file: file_label(path),
        line: e.line(),
        reason: e.to_string(),
    })
}

/// Build a namespace graph from its records.
///
/// Indices must form exactly `0..n` and ids must be unique, otherwise the
/// id <-> index mapping would not be a bijection.
pub fn build_graph(namespace: Namespace, mut records: Vec<NeighborRecord>) -> Result<NeighborGraph> {
    records.sort_by_key(|r| r.index);
    let mut graph = NeighborGraph::new();

    for (position, record) in records.iter().enumerate() {
        if record.index as usize != position {
            return Err(DataLoadError::IndexMapping {
                namespace,
                reason: format!("index {} is not dense (expected {position})", record.index),
            });
        }
        if graph.index_of(&record.id).is_some() {
            return Err(DataLoadError::IndexMapping {
                namespace,
                reason: format!("id '{}' mapped to more than one index", record.id),
            });
        }
        graph.register(&record.id);
    }

    let len = graph.len() as u32;
    for record in records {
        let mut list = Vec::with_capacity(record.neighbors.len());
        for (neighbor, score) in record.neighbors {
            if neighbor >= len {
                return Err(DataLoadError::MissingReference {
                    entity: format!("{namespace} index"),
                    id: neighbor.to_string(),
                });
            }
            if !score.is_finite() {
                return Err(DataLoadError::InvalidValue {
                    field: format!("{namespace} similarity of '{}'", record.id),
                    value: score.to_string(),
                });
            }
            list.push((EntityIndex(neighbor), score));
        }
        if !list.is_empty() {
            graph.insert_list(EntityIndex(record.index), list);
        }
    }

    Ok(graph)
}
