//! Server crate for the business recommendation engine.
//!
//! This crate contains the orchestrator that coordinates all components
//! of the recommendation pipeline, plus the configuration and the shared
//! snapshot generation it serves from.

pub mod config;
pub mod orchestrator;
pub mod rerank_model;
pub mod snapshot;

pub use config::{EngineConfig, FilterConfig, MinimumStars, SourceSpec};
pub use orchestrator::{RecommendRequest, Recommendation, RecommendationOrchestrator};
pub use rerank_model::GrpcRerankModel;
pub use snapshot::SnapshotHandle;
