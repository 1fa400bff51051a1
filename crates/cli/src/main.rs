use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{BusinessId, Namespace, Snapshot, UserId};
use server::{EngineConfig, Recommendation, RecommendationOrchestrator, SourceSpec};
use sources::{CandidateSource, ClusterResolver, Seed, SimilarityIndex};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::warn;

/// bizrecs - Business Recommendation Engine
#[derive(Parser)]
#[command(name = "bizrecs")]
#[command(about = "Business recommendations from precomputed similarity snapshots", long_about = None)]
struct Cli {
    /// JSON engine config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Rerank service address (e.g. http://localhost:50051)
    #[arg(long)]
    rerank_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get business recommendations for a user or a category list
    Recommend {
        /// Known user to recommend for
        #[arg(long, required_unless_present = "categories", conflicts_with = "categories")]
        user_id: Option<String>,

        /// Cold-start categories, comma separated
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Generators to run, comma separated (item_cf, user_cf, cluster_cf, embedding)
        #[arg(long, value_delimiter = ',')]
        sources: Vec<CandidateSource>,

        /// Number of recommendations to return
        #[arg(long)]
        limit: Option<usize>,

        /// Keep the fused order even when a rerank service is configured
        #[arg(long)]
        no_rerank: bool,

        /// Show contributing sources for each recommendation
        #[arg(long)]
        explain: bool,
    },

    /// Show the nearest neighbors of an entity
    Neighbors {
        /// item, user or cluster
        #[arg(long, default_value = "item")]
        namespace: Namespace,

        #[arg(long)]
        id: String,

        #[arg(long, default_value = "10")]
        k: usize,
    },

    /// Map a category list to its nearest cluster
    ResolveCluster {
        #[arg(long, value_delimiter = ',', required = true)]
        categories: Vec<String>,
    },

    /// Show user profile and rating history
    User {
        #[arg(long)]
        user_id: String,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(addr) = cli.rerank_addr {
        config.rerank_addr = Some(addr);
    }

    // Load the snapshot (this may take a moment)
    println!("Loading snapshot from {}...", config.data_dir.display());
    let start = Instant::now();
    let orchestrator = RecommendationOrchestrator::from_config(config)
        .await
        .context("Failed to load snapshot")?;
    let (users, businesses, interactions, clusters) = orchestrator.snapshot().current().counts();
    println!(
        "{} Loaded {} users, {} businesses, {} interactions, {} clusters in {:?}",
        "✓".green(),
        users,
        businesses,
        interactions,
        clusters,
        start.elapsed()
    );

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            categories,
            sources,
            limit,
            no_rerank,
            explain,
        } => {
            let seed = match user_id {
                Some(user_id) => Seed::Known(UserId::from(user_id)),
                None => Seed::ColdStart(categories),
            };
            handle_recommend(&orchestrator, seed, sources, limit, no_rerank, explain).await?
        }
        Commands::Neighbors { namespace, id, k } => handle_neighbors(&orchestrator, namespace, id, k).await?,
        Commands::ResolveCluster { categories } => handle_resolve_cluster(&orchestrator, categories).await?,
        Commands::User { user_id } => handle_user(&orchestrator, UserId::from(user_id)).await?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&orchestrator, requests, concurrent).await?,
    }

    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    seed: Seed,
    sources: Vec<CandidateSource>,
    limit: Option<usize>,
    no_rerank: bool,
    explain: bool,
) -> Result<()> {
    let mut request = orchestrator.default_request(seed);
    if !sources.is_empty() {
        // Keep configured weights and tiers for the sources that stay
        request.sources = sources
            .into_iter()
            .map(|source| {
                request
                    .sources
                    .iter()
                    .find(|spec| spec.source == source)
                    .copied()
                    .unwrap_or_else(|| SourceSpec::new(source))
            })
            .collect();
    }
    if let Some(limit) = limit {
        request.final_k = limit;
    }
    if no_rerank {
        request.use_reranker = false;
    }
    let reranked = request.use_reranker;

    let start = Instant::now();
    let recommendations = orchestrator.recommend(request).await?;
    print_recommendations(&recommendations, reranked, explain);
    println!("{}", format!("Served in {:?}", start.elapsed()).dimmed());
    Ok(())
}

/// Handle the 'neighbors' command
async fn handle_neighbors(
    orchestrator: &RecommendationOrchestrator,
    namespace: Namespace,
    id: String,
    k: usize,
) -> Result<()> {
    let snapshot = orchestrator.snapshot().current();
    let index = SimilarityIndex::new(snapshot.clone(), snapshot.clone());

    let neighbors: Vec<(String, f64)> = match namespace {
        Namespace::User => index
            .top_k_neighbors(namespace, &UserId::from(id.as_str()), k)
            .await?
            .into_iter()
            .map(|(user, score)| (user.to_string(), score))
            .collect(),
        Namespace::Item | Namespace::Cluster => index
            .top_k_neighbors(namespace, &BusinessId::from(id.as_str()), k)
            .await?
            .into_iter()
            .map(|(business, score)| (describe_business(&snapshot, &business), score))
            .collect(),
    };

    println!("{}", format!("Top {} {} neighbors of {}:", k, namespace, id).bold().blue());
    if neighbors.is_empty() {
        println!("  (no similarity data)");
    }
    for (rank, (neighbor, score)) in neighbors.iter().enumerate() {
        println!("{}. {} - {:.4}", (rank + 1).to_string().green(), neighbor, score);
    }
    Ok(())
}

/// Handle the 'resolve-cluster' command
async fn handle_resolve_cluster(orchestrator: &RecommendationOrchestrator, categories: Vec<String>) -> Result<()> {
    let snapshot = orchestrator.snapshot().current();
    let resolver = ClusterResolver::new(snapshot.clone(), snapshot.clone());

    let (cluster, distance) = resolver.resolve_with_distance(categories.as_slice()).await?;
    let unknown: Vec<&str> = categories
        .iter()
        .map(String::as_str)
        .filter(|tag| !snapshot.vocabulary().contains(tag))
        .collect();

    println!("{} {} (Jaccard distance {:.4})", "Cluster:".bold().blue(), cluster, distance);
    if !unknown.is_empty() {
        println!("{}Ignored unknown categories: {}", "• ".yellow(), unknown.join(", "));
    }
    Ok(())
}

/// Handle the 'user' command
async fn handle_user(orchestrator: &RecommendationOrchestrator, user_id: UserId) -> Result<()> {
    let snapshot = orchestrator.snapshot().current();
    if !snapshot.contains_user(&user_id) {
        bail!("User {} not found", user_id);
    }

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    match snapshot.get_user(&user_id) {
        Some(user) => {
            if let Some(name) = &user.name {
                println!("{}Name: {}", "• ".green(), name);
            }
            println!("{}Reviews: {} (average {:.2} stars)", "• ".green(), user.review_count, user.average_stars);
            println!(
                "{}Votes: {} useful, {} funny, {} cool; {} fans",
                "• ".green(),
                user.useful,
                user.funny,
                user.cool,
                user.fans
            );
            if !user.compliments.is_empty() {
                let compliments: Vec<String> = user.compliments.iter().map(|c| format!("{:?}", c)).collect();
                println!("{}Compliments: {}", "• ".green(), compliments.join(", "));
            }
        }
        None => println!("{}No profile (history only)", "• ".yellow()),
    }

    let resolver = ClusterResolver::new(snapshot.clone(), snapshot.clone());
    match resolver.cluster_for_user(&user_id).await? {
        Some(cluster) => println!("{}Cluster: {}", "• ".cyan(), cluster),
        None => println!("{}Cluster: none", "• ".cyan()),
    }

    let interactions = snapshot.get_user_interactions(&user_id);
    let avg_rating = if interactions.is_empty() {
        0.0
    } else {
        interactions.iter().map(|i| i.rating).sum::<f32>() / interactions.len() as f32
    };
    println!("{}Ratings: {} (average {:.2})", "• ".cyan(), interactions.len(), avg_rating);

    let mut top_rated: Vec<_> = interactions.iter().collect();
    top_rated.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.business_id.cmp(&b.business_id)));
    println!("Top rated businesses:");
    for interaction in top_rated.iter().take(10) {
        println!(
            "  - {} (Rating: {})",
            describe_business(&snapshot, &interaction.business_id),
            interaction.rating
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(orchestrator: &RecommendationOrchestrator, requests: usize, concurrent: usize) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        bail!("--requests and --concurrent must be positive");
    }
    let user_ids = orchestrator.snapshot().current().user_ids();
    if user_ids.is_empty() {
        return Err(anyhow!("Snapshot has no users to benchmark with"));
    }

    // Random users, sampled with replacement
    let mut pending: Vec<UserId> = (0..requests)
        .map(|_| user_ids[rand::random_range(0..user_ids.len())].clone())
        .collect();

    let wall_clock = Instant::now();
    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    let mut failures = 0usize;
    let mut tasks = JoinSet::new();

    loop {
        while tasks.len() < concurrent {
            let Some(user_id) = pending.pop() else {
                break;
            };
            let orchestrator = orchestrator.clone();
            tasks.spawn(async move {
                let start = Instant::now();
                let request = orchestrator.default_request(Seed::Known(user_id));
                orchestrator.recommend(request).await.map(|_| start.elapsed())
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        match joined.context("Benchmark task panicked")? {
            Ok(elapsed) => timings.push(elapsed),
            Err(e) => {
                warn!("Request failed: {}", e);
                failures += 1;
            }
        }
    }
    let total_time = wall_clock.elapsed();

    if timings.is_empty() {
        bail!("All {} requests failed", failures);
    }
    timings.sort();
    let sum: Duration = timings.iter().sum();
    let avg_latency = sum / timings.len() as u32;
    let percentile = |p: f64| timings[((timings.len() - 1) as f64 * p).round() as usize];
    let throughput = timings.len() as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ok, {} failed ({} concurrent)", timings.len(), failures, concurrent);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn describe_business(snapshot: &Snapshot, business_id: &BusinessId) -> String {
    match snapshot.get_business(business_id) {
        Some(business) => match &business.city {
            Some(city) => format!("{} [{}] ({}, {:.1}★)", business.name, business_id, city, business.stars),
            None => format!("{} [{}] ({:.1}★)", business.name, business_id, business.stars),
        },
        None => business_id.to_string(),
    }
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation], reranked: bool, explain: bool) {
    let header = if reranked {
        "Business Recommendations (reranked):"
    } else {
        "Business Recommendations:"
    };
    println!("{}", header.bold().blue());
    if recommendations.is_empty() {
        println!("  (no candidates)");
    }

    for (rank, rec) in recommendations.iter().enumerate() {
        let name = rec.name.as_deref().unwrap_or("(unknown business)");
        let stars = rec.stars.map(|s| format!(" {:.1}★", s)).unwrap_or_default();
        let city = rec.city.as_deref().map(|c| format!(" - {}", c)).unwrap_or_default();
        println!(
            "{}. {} [{}]{}{} - Score: {:.3}",
            (rank + 1).to_string().green(),
            name,
            rec.business_id,
            city,
            stars,
            rec.score
        );
        if explain {
            let sources: Vec<&str> = rec.sources.iter().map(|s| s.as_str()).collect();
            println!("   Sources: {}", sources.join(", "));
        }
    }
}
