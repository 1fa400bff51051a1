//! The FilterPipeline orchestrates multiple filters.
//!
//! This module provides the main FilterPipeline struct that chains
//! multiple filters together using the builder pattern.

use crate::fusion::FusedCandidate;
use crate::traits::Filter;
use sources::{Result, SeedContext};
use tracing::debug;

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(AlreadyRatedFilter)
///     .add_filter(OpenBusinessFilter::new(catalog.clone()))
///     .add_filter(MinimumStarsFilter::new(catalog.clone(), 3.5, 10));
///
/// let filtered = pipeline.apply(fused, &context).await?;
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// Create a new empty FilterPipeline.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply all filters in sequence to the candidates.
    ///
    /// Order is preserved; an empty pipeline returns its input unchanged.
    /// Once nothing is left the remaining filters are skipped.
    pub async fn apply(
        &self,
        candidates: Vec<FusedCandidate>,
        context: &SeedContext,
    ) -> Result<Vec<FusedCandidate>> {
        let mut current = candidates;
        for filter in &self.filters {
            if current.is_empty() {
                debug!(filter = filter.name(), "No candidates left; skipping");
                continue;
            }
            let before = current.len();
            current = filter.apply(current, context).await?;
            debug!(
                filter = filter.name(),
                kept = current.len(),
                removed = before.saturating_sub(current.len()),
                "Filter applied"
            );
        }
        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
