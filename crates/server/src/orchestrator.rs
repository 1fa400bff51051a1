//! # Recommendation Orchestrator
//!
//! This module coordinates the entire recommendation pipeline:
//! 1. Take the current snapshot generation
//! 2. Resolve the seed (known user or cold-start categories)
//! 3. Run the selected generators concurrently under the request deadline
//! 4. Fuse their outputs (weights, tiers)
//! 5. Apply the configured filters
//! 6. Rerank with the external model, or keep the fused order
//! 7. Return the top `final_k`, enriched with business details

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant as StdInstant;

use anyhow::Context;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use data_loader::{BusinessId, Snapshot};
use ml_client::RerankClient;
use pipeline::filters::{AlreadyRatedFilter, MinimumStarsFilter, OpenBusinessFilter};
use pipeline::{FilterPipeline, FusedCandidate, FusionEngine, FusionInput, RerankModel, Reranker};
use sources::error::require_positive;
use sources::{
    Candidate, CandidateGenerator, CandidateSource, ClusterCfSource, ClusterResolver, EmbeddingSource, ItemCfSource,
    RecommendError, Result, Seed, SeedContext, SimilarityIndex, UserCfSource, build_seed_context,
};

use crate::config::{EngineConfig, SourceSpec};
use crate::rerank_model::GrpcRerankModel;
use crate::snapshot::SnapshotHandle;

/// One call to [`RecommendationOrchestrator::recommend`]
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub seed: Seed,
    /// Generators to run, with fusion weights and tiers
    pub sources: Vec<SourceSpec>,
    /// Candidates kept per generator
    pub per_source_k: usize,
    /// Neighbors taken per seed entity; `None` uses `per_source_k`
    pub per_seed_k: Option<usize>,
    pub final_k: usize,
    pub use_reranker: bool,
    /// Generators still running at this instant contribute nothing
    pub deadline: Option<Instant>,
}

impl RecommendRequest {
    pub fn new(seed: Seed, sources: Vec<SourceSpec>) -> Self {
        Self {
            seed,
            sources,
            per_source_k: 100,
            per_seed_k: None,
            final_k: 20,
            use_reranker: false,
            deadline: None,
        }
    }
}

/// Final recommendation returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub business_id: BusinessId,
    /// Model score when reranked, fused score otherwise
    pub score: f64,
    /// Generators that contributed to the fused score
    pub sources: Vec<CandidateSource>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub stars: Option<f32>,
}

/// Main orchestrator that coordinates the recommendation pipeline
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    snapshot: SnapshotHandle,
    config: Arc<EngineConfig>,
    model: Option<Arc<dyn RerankModel>>,
    overrides: HashMap<CandidateSource, Arc<dyn CandidateGenerator>>,
}

impl RecommendationOrchestrator {
    /// Create an orchestrator without a rerank model
    pub fn new(snapshot: SnapshotHandle, config: EngineConfig) -> Self {
        Self {
            snapshot,
            config: Arc::new(config),
            model: None,
            overrides: HashMap::new(),
        }
    }

    /// Load the snapshot named by `config` and, when `rerank_addr` is set,
    /// attach a lazily connected rerank client.
    ///
    /// Loading is blocking and runs on the blocking pool.
    pub async fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let data_dir = config.data_dir.clone();
        let handle = tokio::task::spawn_blocking(move || SnapshotHandle::load(&data_dir))
            .await
            .context("Snapshot loader panicked")?
            .with_context(|| format!("Loading snapshot from {:?}", config.data_dir))?;

        let model = match &config.rerank_addr {
            Some(addr) => {
                let client = RerankClient::connect_lazy(addr.as_str())
                    .context("Creating rerank client")?
                    .with_timeout(config.rerank_timeout());
                Some(Arc::new(GrpcRerankModel::new(client)) as Arc<dyn RerankModel>)
            }
            None => None,
        };

        let mut orchestrator = Self::new(handle, config);
        orchestrator.model = model;
        Ok(orchestrator)
    }

    pub fn with_rerank_model(mut self, model: Arc<dyn RerankModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Serve `generator.source()` with `generator` instead of the
    /// snapshot-backed implementation
    pub fn with_generator(mut self, generator: Arc<dyn CandidateGenerator>) -> Self {
        self.overrides.insert(generator.source(), generator);
        self
    }

    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_reranker(&self) -> bool {
        self.model.is_some()
    }

    /// A request for `seed` with the configured defaults and a deadline of
    /// now plus the request timeout
    pub fn default_request(&self, seed: Seed) -> RecommendRequest {
        RecommendRequest {
            seed,
            sources: self.config.sources.clone(),
            per_source_k: self.config.per_source_k,
            per_seed_k: self.config.per_seed_k,
            final_k: self.config.final_k,
            use_reranker: self.model.is_some(),
            deadline: Some(Instant::now() + self.config.request_timeout()),
        }
    }

    /// Main entry point: ranked recommendations for one seed.
    ///
    /// Errors only on invalid input or collaborator failure; missing
    /// similarity data or history just yields fewer results.
    #[instrument(skip(self, request), fields(seed = ?request.seed, sources = request.sources.len()))]
    pub async fn recommend(&self, request: RecommendRequest) -> Result<Vec<Recommendation>> {
        let start_time = StdInstant::now();
        validate_request(&request)?;
        if request.use_reranker && self.model.is_none() {
            return Err(RecommendError::InvalidArgument(
                "reranking requested but no rerank model is configured".to_string(),
            ));
        }

        let snapshot = self.snapshot.current();
        let context = self.build_context(&snapshot, &request).await?;

        let outputs = self.generate_parallel(&snapshot, &context, &request).await?;
        let inputs: Vec<FusionInput> = request
            .sources
            .iter()
            .zip(outputs)
            .map(|(spec, candidates)| {
                let mut input = FusionInput::new(spec.source, candidates).with_tier(spec.tier);
                if let Some(weight) = spec.weight {
                    input = input.with_weight(weight);
                }
                input
            })
            .collect();

        let fused = FusionEngine::new()
            .with_policy(self.config.overlap_policy)
            .fuse(inputs, None)?;
        debug!("Fused {} candidates", fused.len());

        let filtered = self.filter_pipeline(&snapshot).apply(fused, &context).await?;
        debug!("{} candidates after filters", filtered.len());

        let ranked = self
            .rank(&snapshot, &context, &request, filtered)
            .await?;
        let recommendations = enrich(&snapshot, ranked);

        info!(
            "Returning {} recommendations in {:.2?}",
            recommendations.len(),
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    async fn build_context(&self, snapshot: &Arc<Snapshot>, request: &RecommendRequest) -> Result<Arc<SeedContext>> {
        let resolver = ClusterResolver::new(snapshot.clone(), snapshot.clone());
        let needs_cluster = request
            .sources
            .iter()
            .any(|spec| spec.source == CandidateSource::ClusterCf);
        let context = build_seed_context(&**snapshot, &resolver, &request.seed, needs_cluster).await?;
        Ok(Arc::new(context))
    }

    fn generator(&self, source: CandidateSource, snapshot: &Arc<Snapshot>) -> Arc<dyn CandidateGenerator> {
        if let Some(generator) = self.overrides.get(&source) {
            return generator.clone();
        }
        let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());
        match source {
            CandidateSource::ItemCf => Arc::new(ItemCfSource::new(index, snapshot.clone())),
            CandidateSource::UserCf => Arc::new(
                UserCfSource::new(index, snapshot.clone()).with_weighting(self.config.user_cf_weighting),
            ),
            CandidateSource::ClusterCf => Arc::new(ClusterCfSource::new(index, snapshot.clone())),
            CandidateSource::Embedding => Arc::new(EmbeddingSource::new(snapshot.clone())),
        }
    }

    /// Run every selected generator concurrently; one output per source, in
    /// request order.
    ///
    /// A generator that misses the deadline contributes an empty list.
    /// Returning early drops the JoinSet, which aborts what is still running.
    async fn generate_parallel(
        &self,
        snapshot: &Arc<Snapshot>,
        context: &Arc<SeedContext>,
        request: &RecommendRequest,
    ) -> Result<Vec<Vec<Candidate>>> {
        let per_seed_k = request.per_seed_k.unwrap_or(request.per_source_k);
        let result_k = request.per_source_k;

        let mut tasks = JoinSet::new();
        for (position, spec) in request.sources.iter().enumerate() {
            let generator = self.generator(spec.source, snapshot);
            let context = context.clone();
            let deadline = request.deadline;
            tasks.spawn(async move {
                let source = generator.source();
                let work = generator.generate(&context, per_seed_k, result_k);
                let outcome = match deadline {
                    Some(deadline) => match timeout_at(deadline, work).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!("{} missed the request deadline; contributing nothing", source);
                            Ok(Vec::new())
                        }
                    },
                    None => work.await,
                };
                (position, outcome)
            });
        }

        let mut outputs: Vec<Vec<Candidate>> = vec![Vec::new(); request.sources.len()];
        while let Some(joined) = tasks.join_next().await {
            let (position, outcome) = joined
                .map_err(|e| RecommendError::UpstreamUnavailable(format!("generator task failed: {e}")))?;
            let candidates = outcome?;
            debug!(
                "{} produced {} candidates",
                request.sources[position].source,
                candidates.len()
            );
            outputs[position] = candidates;
        }
        Ok(outputs)
    }

    fn filter_pipeline(&self, snapshot: &Arc<Snapshot>) -> FilterPipeline {
        let filters = &self.config.filters;
        let mut pipeline = FilterPipeline::new();
        if filters.exclude_rated {
            pipeline = pipeline.add_filter(AlreadyRatedFilter);
        }
        if filters.open_only {
            pipeline = pipeline.add_filter(OpenBusinessFilter::new(snapshot.clone()));
        }
        if let Some(minimum) = filters.minimum_stars {
            pipeline = pipeline.add_filter(MinimumStarsFilter::new(
                snapshot.clone(),
                minimum.min_stars,
                minimum.min_reviews,
            ));
        }
        pipeline
    }

    /// Final order: model scores for known users when reranking, the fused
    /// order otherwise. A rerank that misses the deadline keeps the fused
    /// order too.
    async fn rank(
        &self,
        snapshot: &Arc<Snapshot>,
        context: &SeedContext,
        request: &RecommendRequest,
        fused: Vec<FusedCandidate>,
    ) -> Result<Vec<FusedCandidate>> {
        if !request.use_reranker {
            return Ok(truncate(fused, request.final_k));
        }
        let (Some(model), Some(user_id)) = (self.model.clone(), context.user_id.as_ref()) else {
            info!("Cold-start seed has no profile; keeping the fused order");
            return Ok(truncate(fused, request.final_k));
        };

        let pool = truncate(fused, self.config.rerank_pool);
        let ids: Vec<BusinessId> = pool.iter().map(|c| c.business_id.clone()).collect();

        let reranker = Reranker::new(snapshot.clone(), model);
        let work = reranker.rerank(user_id, &ids, request.final_k);
        let outcome = match request.deadline {
            Some(deadline) => match timeout_at(deadline, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Rerank missed the request deadline; keeping the fused order");
                    return Ok(truncate(pool, request.final_k));
                }
            },
            None => work.await,
        };

        let reranked = match outcome {
            Ok(reranked) => reranked,
            Err(RecommendError::NotFound { entity: "user", .. }) => {
                warn!("User {} has no profile; keeping the fused order", user_id);
                return Ok(truncate(pool, request.final_k));
            }
            Err(e) => return Err(e),
        };

        let mut sources: HashMap<BusinessId, Vec<CandidateSource>> = pool
            .into_iter()
            .map(|c| (c.business_id, c.sources))
            .collect();
        Ok(reranked
            .into_iter()
            .map(|(business_id, score)| FusedCandidate {
                sources: sources.remove(&business_id).unwrap_or_default(),
                business_id,
                score,
            })
            .collect())
    }
}

fn validate_request(request: &RecommendRequest) -> Result<()> {
    require_positive("per_source_k", request.per_source_k)?;
    require_positive("final_k", request.final_k)?;
    if let Some(per_seed_k) = request.per_seed_k {
        require_positive("per_seed_k", per_seed_k)?;
    }
    if request.sources.is_empty() {
        return Err(RecommendError::InvalidArgument(
            "at least one candidate source must be selected".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for spec in &request.sources {
        if !seen.insert(spec.source) {
            return Err(RecommendError::InvalidArgument(format!(
                "source {} selected more than once",
                spec.source
            )));
        }
    }
    Ok(())
}

fn truncate(mut candidates: Vec<FusedCandidate>, k: usize) -> Vec<FusedCandidate> {
    candidates.truncate(k);
    candidates
}

/// Attach business details. A business without attributes is kept with
/// empty details.
fn enrich(snapshot: &Snapshot, ranked: Vec<FusedCandidate>) -> Vec<Recommendation> {
    ranked
        .into_iter()
        .map(|candidate| {
            let business = snapshot.get_business(&candidate.business_id);
            Recommendation {
                name: business.map(|b| b.name.clone()),
                city: business.and_then(|b| b.city.clone()),
                stars: business.map(|b| b.stars),
                business_id: candidate.business_id,
                score: candidate.score,
                sources: candidate.sources,
            }
        })
        .collect()
}
