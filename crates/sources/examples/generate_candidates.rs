//! Example: Generate candidates for a user
//!
//! Run with: cargo run --package sources --example generate_candidates -- [data_dir] [user_id]
//!
//! This example shows how to:
//! 1. Load a snapshot directory
//! 2. Resolve a seed context
//! 3. Run ItemCF, UserCF, ClusterCF and embedding retrieval
//! 4. Compare the sources

use anyhow::Context;
use data_loader::{Snapshot, UserId};
use sources::{
    build_seed_context, Candidate, CandidateGenerator, ClusterCfSource, ClusterResolver,
    EmbeddingSource, ItemCfSource, Seed, SimilarityIndex, UserCfSource,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data/snapshot".to_string()));
    let user_id = UserId::from(args.next().unwrap_or_else(|| "U1".to_string()));

    println!("=== Candidate Generation Example ===\n");

    let start = Instant::now();
    let snapshot = Arc::new(
        Snapshot::load_from_dir(&data_dir)
            .with_context(|| format!("Failed to load snapshot from {}", data_dir.display()))?,
    );
    println!("Loaded snapshot in {:?}\n", start.elapsed());

    let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());
    let resolver = ClusterResolver::new(snapshot.clone(), snapshot.clone());

    let context = build_seed_context(&*snapshot, &resolver, &Seed::Known(user_id.clone()), true)
        .await
        .context("Failed to resolve seed")?;
    println!("Target user: {}", user_id);
    println!("  Rated businesses: {}", context.rated.len());
    match context.cluster {
        Some(cluster) => println!("  Cluster: {}\n", cluster),
        None => println!("  Cluster: none\n"),
    }

    let generators: Vec<Box<dyn CandidateGenerator>> = vec![
        Box::new(ItemCfSource::new(index.clone(), snapshot.clone())),
        Box::new(UserCfSource::new(index.clone(), snapshot.clone())),
        Box::new(ClusterCfSource::new(index, snapshot.clone())),
        Box::new(EmbeddingSource::new(snapshot.clone())),
    ];

    let mut all: Vec<Vec<Candidate>> = Vec::new();
    for generator in &generators {
        let start = Instant::now();
        let candidates = generator.generate(&context, 20, 100).await?;
        println!(
            "{}: {} candidates in {:?}",
            generator.source(),
            candidates.len(),
            start.elapsed()
        );
        for (i, candidate) in candidates.iter().take(5).enumerate() {
            let name = snapshot
                .get_business(&candidate.business_id)
                .map(|b| b.name.as_str())
                .unwrap_or("<unknown>");
            println!(
                "  {}. {} [{}] (score: {:.3})",
                i + 1,
                name,
                candidate.business_id,
                candidate.score
            );
        }
        println!();
        all.push(candidates);
    }

    // Overlap between sources
    println!("=== Overlap ===");
    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            let left: HashSet<_> = all[i].iter().map(|c| &c.business_id).collect();
            let right: HashSet<_> = all[j].iter().map(|c| &c.business_id).collect();
            println!(
                "  {} / {}: {} businesses",
                generators[i].source(),
                generators[j].source(),
                left.intersection(&right).count()
            );
        }
    }

    Ok(())
}
