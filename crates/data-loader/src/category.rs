//! Multi-hot category vectors over a fixed vocabulary.
//!
//! Vectors are packed bitsets so the Jaccard distance used for cold-start
//! cluster resolution is a handful of popcounts per centroid.

use std::collections::HashMap;

const WORD_BITS: usize = 64;

/// The ordered tag vocabulary recorded when clusters were built
#[derive(Debug, Default, Clone)]
pub struct CategoryVocabulary {
    tags: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CategoryVocabulary {
    /// Build a vocabulary; duplicate tags keep their first position
    pub fn new<S: AsRef<str>>(tags: &[S]) -> Self {
        let mut vocabulary = Self::default();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() || vocabulary.positions.contains_key(tag) {
                continue;
            }
            vocabulary.positions.insert(tag.to_string(), vocabulary.tags.len());
            vocabulary.tags.push(tag.to_string());
        }
        vocabulary
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.positions.get(tag.trim()).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.position(tag).is_some()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Encode a tag set. Tags outside the vocabulary are ignored.
    pub fn encode<S: AsRef<str>>(&self, tags: &[S]) -> CategoryVector {
        let mut vector = CategoryVector::with_width(self.tags.len());
        for tag in tags {
            if let Some(position) = self.position(tag.as_ref()) {
                vector.set(position);
            }
        }
        vector
    }
}

/// Packed multi-hot vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryVector {
    words: Vec<u64>,
    width: usize,
}

impl CategoryVector {
    pub fn with_width(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(WORD_BITS)],
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set(&mut self, position: usize) {
        if position < self.width {
            self.words[position / WORD_BITS] |= 1u64 << (position % WORD_BITS);
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        position < self.width && self.words[position / WORD_BITS] & (1u64 << (position % WORD_BITS)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// `1 - |a ∩ b| / |a ∪ b|`; two empty vectors are at distance 0.
    pub fn jaccard_distance(&self, other: &CategoryVector) -> f64 {
        let len = self.words.len().max(other.words.len());
        let mut intersection = 0u32;
        let mut union = 0u32;
        for i in 0..len {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            intersection += (a & b).count_ones();
            union += (a | b).count_ones();
        }
        if union == 0 {
            return 0.0;
        }
        1.0 - f64::from(intersection) / f64::from(union)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> CategoryVocabulary {
        CategoryVocabulary::new(&["Pizza", "Bars", "Coffee & Tea", "Sushi Bars"])
    }

    #[test]
    fn test_encode_ignores_unknown_tags() {
        let vocab = vocabulary();
        let vector = vocab.encode(&["Pizza", "Laundromat", " Bars "]);

        assert!(vector.contains(0));
        assert!(vector.contains(1));
        assert!(!vector.contains(2));
        assert_eq!(vector.count_ones(), 2);
    }

    #[test]
    fn test_jaccard_distance() {
        let vocab = vocabulary();
        let a = vocab.encode(&["Pizza", "Bars"]);
        let b = vocab.encode(&["Bars", "Sushi Bars"]);

        // intersection 1, union 3
        assert!((a.jaccard_distance(&b) - (1.0 - 1.0 / 3.0)).abs() < 1e-12);
        assert_eq!(a.jaccard_distance(&a), 0.0);
    }

    #[test]
    fn test_jaccard_distance_empty_vectors() {
        let vocab = vocabulary();
        let empty = vocab.encode::<&str>(&[]);
        let pizza = vocab.encode(&["Pizza"]);

        assert_eq!(empty.jaccard_distance(&empty), 0.0);
        assert_eq!(empty.jaccard_distance(&pizza), 1.0);
    }

    #[test]
    fn test_wide_vocabulary_spans_words() {
        let tags: Vec<String> = (0..150).map(|i| format!("tag-{i}")).collect();
        let vocab = CategoryVocabulary::new(tags.as_slice());
        let vector = vocab.encode(&["tag-3", "tag-70", "tag-149"]);

        assert_eq!(vocab.len(), 150);
        assert!(vector.contains(70));
        assert!(vector.contains(149));
        assert_eq!(vector.count_ones(), 3);
    }
}
