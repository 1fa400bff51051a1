//! Engine configuration.
//!
//! Read from a JSON file; every field is optional and falls back to
//! [`EngineConfig::default`]. CLI flags override individual values.
//!
//! ```json
//! {
//!   "data_dir": "data/snapshot",
//!   "per_source_k": 100,
//!   "final_k": 20,
//!   "overlap_policy": "tiered_exclusion",
//!   "sources": [
//!     { "source": "item_cf", "tier": 0 },
//!     { "source": "user_cf", "weight": 0.5, "tier": 1 },
//!     { "source": "embedding", "tier": 2 }
//!   ],
//!   "filters": { "exclude_rated": true, "open_only": true }
//! }
//! ```

use anyhow::{Context, Result, bail};
use pipeline::OverlapPolicy;
use serde::{Deserialize, Serialize};
use sources::{CandidateSource, UserCfWeighting};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One generator in a request, with its fusion weight and tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub source: CandidateSource,
    /// Fusion weight; `None` means 1.0
    #[serde(default)]
    pub weight: Option<f64>,
    /// Fusion tier; lower wins on overlap
    #[serde(default)]
    pub tier: u32,
}

impl SourceSpec {
    pub fn new(source: CandidateSource) -> Self {
        Self {
            source,
            weight: None,
            tier: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }
}

/// Quality thresholds for [`pipeline::filters::MinimumStarsFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinimumStars {
    pub min_stars: f32,
    #[serde(default)]
    pub min_reviews: u32,
}

/// Filters run between fusion and reranking. All off by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop businesses the seed user already rated
    pub exclude_rated: bool,
    /// Drop closed businesses
    pub open_only: bool,
    pub minimum_stars: Option<MinimumStars>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,

    /// Candidates kept per generator
    pub per_source_k: usize,

    /// Neighbors taken per seed entity; `None` uses `per_source_k`
    pub per_seed_k: Option<usize>,

    /// Recommendations returned
    pub final_k: usize,

    /// Fused candidates handed to the reranker
    pub rerank_pool: usize,

    /// Whole-request budget
    pub request_timeout_ms: u64,

    pub user_cf_weighting: UserCfWeighting,
    pub overlap_policy: OverlapPolicy,

    /// Generators used when a request does not name any
    pub sources: Vec<SourceSpec>,

    /// Rerank service address; reranking is off without one
    pub rerank_addr: Option<String>,
    pub rerank_timeout_ms: u64,

    pub filters: FilterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/snapshot"),
            per_source_k: 100,
            per_seed_k: None,
            final_k: 20,
            rerank_pool: 200,
            request_timeout_ms: 500,
            user_cf_weighting: UserCfWeighting::default(),
            overlap_policy: OverlapPolicy::default(),
            sources: vec![
                SourceSpec::new(CandidateSource::ItemCf).with_tier(0),
                SourceSpec::new(CandidateSource::UserCf).with_tier(1),
                SourceSpec::new(CandidateSource::ClusterCf).with_tier(2),
                SourceSpec::new(CandidateSource::Embedding).with_tier(3),
            ],
            rerank_addr: None,
            rerank_timeout_ms: 200,
            filters: FilterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {:?}", path))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Parsing config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no request could run with
    pub fn validate(&self) -> Result<()> {
        if self.per_source_k == 0 || self.final_k == 0 || self.rerank_pool == 0 {
            bail!("per_source_k, final_k and rerank_pool must be positive");
        }
        if self.per_seed_k == Some(0) {
            bail!("per_seed_k must be positive when set");
        }
        if self.sources.is_empty() {
            bail!("at least one default source is required");
        }
        for spec in &self.sources {
            if let Some(weight) = spec.weight {
                if !weight.is_finite() {
                    bail!("weight of {} must be finite", spec.source);
                }
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_millis(self.rerank_timeout_ms)
    }
}
