//! Dense embeddings produced by the offline two-tower model.
//!
//! Vectors are L2-normalized on insert, so the dot product of two stored
//! vectors is their cosine similarity.

use crate::error::{DataLoadError, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Row-major table of unit vectors keyed by id.
///
/// Every row has the dimension of the first vector inserted.
#[derive(Debug, Clone)]
pub struct EmbeddingTable<K> {
    dim: usize,
    ids: Vec<K>,
    rows: HashMap<K, usize>,
    values: Vec<f32>,
}

impl<K> Default for EmbeddingTable<K> {
    fn default() -> Self {
        Self {
            dim: 0,
            ids: Vec::new(),
            rows: HashMap::new(),
            values: Vec::new(),
        }
    }
}

impl<K: Clone + Eq + Hash + fmt::Display> EmbeddingTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector dimension; 0 while the table is empty
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Normalize and store `vector` for `id`, replacing any previous row.
    ///
    /// Rejects empty, non-finite, and zero vectors, and vectors whose
    /// dimension differs from the rows already stored.
    pub fn insert(&mut self, id: K, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(invalid(&id, "empty vector".to_string()));
        }
        if self.dim != 0 && vector.len() != self.dim {
            return Err(invalid(
                &id,
                format!("{} dimensions, expected {}", vector.len(), self.dim),
            ));
        }
        if let Some(value) = vector.iter().find(|v| !v.is_finite()) {
            return Err(invalid(&id, value.to_string()));
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(invalid(&id, "zero vector".to_string()));
        }

        self.dim = vector.len();
        let normalized = vector.iter().map(|v| v / norm);
        match self.rows.get(&id) {
            Some(&row) => {
                let start = row * self.dim;
                for (slot, value) in self.values[start..start + self.dim].iter_mut().zip(normalized) {
                    *slot = value;
                }
            }
            None => {
                self.rows.insert(id.clone(), self.ids.len());
                self.ids.push(id);
                self.values.extend(normalized);
            }
        }
        Ok(())
    }

    /// The normalized vector of `id`
    pub fn get(&self, id: &K) -> Option<&[f32]> {
        let start = self.rows.get(id)? * self.dim;
        Some(&self.values[start..start + self.dim])
    }

    /// Ids in row order
    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    /// All rows back to back, `dim` values each, in the order of [`Self::ids`]
    pub fn vectors(&self) -> &[f32] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[f32])> + '_ {
        self.ids.iter().zip(self.values.chunks_exact(self.dim.max(1)))
    }
}

fn invalid<K: fmt::Display>(id: &K, value: String) -> DataLoadError {
    DataLoadError::InvalidValue {
        field: format!("embedding of {id}"),
        value,
    }
}

/// Dot product accumulated in f64
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BusinessId;

    fn business(id: &str) -> BusinessId {
        BusinessId::from(id)
    }

    #[test]
    fn test_insert_normalizes() {
        let mut table = EmbeddingTable::new();
        table.insert(business("B1"), &[3.0, 4.0]).unwrap();

        assert_eq!(table.dim(), 2);
        assert_eq!(table.get(&business("B1")), Some(&[0.6, 0.8][..]));
        assert!((dot(&[0.6, 0.8], &[0.6, 0.8]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reinsert_replaces_row() {
        let mut table = EmbeddingTable::new();
        table.insert(business("B1"), &[1.0, 0.0]).unwrap();
        table.insert(business("B2"), &[0.0, 2.0]).unwrap();
        table.insert(business("B1"), &[0.0, -5.0]).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&business("B1")), Some(&[0.0, -1.0][..]));
        let rows: Vec<(&str, &[f32])> = table.iter().map(|(id, v)| (id.as_str(), v)).collect();
        assert_eq!(rows, vec![("B1", &[0.0, -1.0][..]), ("B2", &[0.0, 1.0][..])]);
    }

    #[test]
    fn test_rejects_bad_vectors() {
        let mut table = EmbeddingTable::new();
        assert!(table.insert(business("B1"), &[]).is_err());
        assert!(table.insert(business("B1"), &[0.0, 0.0]).is_err());
        assert!(table.insert(business("B1"), &[f32::NAN, 1.0]).is_err());
        // failed inserts leave the dimension open
        assert_eq!(table.dim(), 0);

        table.insert(business("B1"), &[1.0, 1.0, 1.0]).unwrap();
        assert!(matches!(
            table.insert(business("B2"), &[1.0, 1.0]),
            Err(DataLoadError::InvalidValue { .. })
        ));
        assert!(table.get(&business("B2")).is_none());
    }
}
