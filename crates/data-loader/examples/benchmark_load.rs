use data_loader::{Namespace, Snapshot};
use std::path::PathBuf;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    let data_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "data/snapshot".to_string()),
    );

    println!("Loading snapshot from {}...\n", data_dir.display());

    let start = Instant::now();
    let snapshot = Snapshot::load_from_dir(&data_dir)?;
    let elapsed = start.elapsed();

    let (users, businesses, interactions, clusters) = snapshot.counts();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Businesses: {}", businesses);
    println!("Interactions: {}", interactions);
    println!("Clusters: {}", clusters);
    for namespace in Namespace::ALL {
        println!("{} graph: {} entities", namespace, snapshot.graph(namespace).len());
    }
    println!(
        "\nPerformance: {:.0} interactions/second",
        interactions as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
