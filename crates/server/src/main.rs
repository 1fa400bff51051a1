//! Simple test harness for the recommendation orchestrator.
//!
//! Usage: `server [CONFIG] [USER_ID]`. Without a config file the defaults
//! are used (snapshot in `data/snapshot`, no reranking).

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_loader::UserId;
use server::{EngineConfig, RecommendationOrchestrator};
use sources::Seed;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug,sources=debug,pipeline=debug")),
        )
        .init();

    info!("Starting recommendation server test harness");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::from_file(Path::new(&path))?,
        None => EngineConfig::default(),
    };
    let user_id = args.next().unwrap_or_else(|| "U1".to_string());

    info!("Loading snapshot from {:?}...", config.data_dir);
    let orchestrator = RecommendationOrchestrator::from_config(config).await?;
    let (users, businesses, interactions, clusters) = orchestrator.snapshot().current().counts();
    info!(
        "Snapshot loaded: {} users, {} businesses, {} interactions, {} clusters",
        users, businesses, interactions, clusters
    );

    let request = orchestrator.default_request(Seed::Known(UserId::from(user_id.as_str())));
    info!(
        "Getting recommendations for user {} (limit: {})",
        user_id, request.final_k
    );
    let recommendations = orchestrator
        .recommend(request)
        .await
        .with_context(|| format!("Recommendation failed for user {}", user_id))?;

    info!("Received {} recommendations:", recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        let sources: Vec<&str> = rec.sources.iter().map(|s| s.as_str()).collect();
        info!(
            "{}. {} ({}) - Score: {:.3} [{}]",
            i + 1,
            rec.name.as_deref().unwrap_or(rec.business_id.as_str()),
            rec.city.as_deref().unwrap_or("?"),
            rec.score,
            sources.join(", ")
        );
    }

    Ok(())
}
