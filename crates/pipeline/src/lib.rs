//! Post-retrieval pipeline: fusion, filtering, and reranking.
//!
//! This crate provides:
//! - FusionEngine for merging generator outputs with tiered exclusion
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//! - FeatureAssembler and Reranker for the optional model pass
//!
//! ## Architecture
//! The pipeline processes candidates in stages:
//! 1. Fusion merges per-source lists into one ranking
//! 2. Filters remove unwanted candidates (already rated, closed, low quality)
//! 3. The Reranker builds feature rows and asks the model for final scores
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{FilterPipeline, FusionEngine, FusionInput, Reranker};
//! use pipeline::filters::*;
//!
//! let fused = FusionEngine::new().fuse(inputs, Some(200))?;
//!
//! let pipeline = FilterPipeline::new()
//!     .add_filter(AlreadyRatedFilter)
//!     .add_filter(OpenBusinessFilter::new(catalog.clone()));
//! let filtered = pipeline.apply(fused, &context).await?;
//!
//! let ids: Vec<_> = filtered.iter().map(|c| c.business_id.clone()).collect();
//! let ranked = Reranker::new(catalog, model).rerank(&user_id, &ids, 20).await?;
//! ```

pub mod features;
pub mod filter_pipeline;
pub mod filters;
pub mod fusion;
pub mod rerank;
pub mod traits;

// Re-export main types
pub use features::{FeatureAssembler, FeatureBatch, FeatureRow, FEATURE_WIDTH};
pub use filter_pipeline::FilterPipeline;
pub use fusion::{FusedCandidate, FusionEngine, FusionInput, OverlapPolicy};
pub use rerank::Reranker;
pub use traits::{Filter, RerankModel};
