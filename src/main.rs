//! CLI interface for the IVF engine

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ivf_engine::dataset::load_jsonl;
use ivf_engine::{
    Collection, DistanceMetric, IndexConfig, Payload, SearchResult, SnapshotManager, Vector,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ivf")]
#[command(about = "An embedded IVF approximate nearest-neighbor search engine", long_about = None)]
struct Cli {
    /// Directory holding the collection snapshot
    #[arg(long, default_value = "./ivf-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty collection
    Init {
        /// Collection name
        #[arg(long, default_value = "default")]
        name: String,
        /// Vector dimension
        #[arg(short, long, required_unless_present = "config")]
        dimension: Option<usize>,
        /// Distance metric: euclidean_squared, euclidean or cosine
        #[arg(short, long, default_value = "euclidean_squared")]
        metric: DistanceMetric,
        /// Number of partitions
        #[arg(short, long, default_value = "16")]
        centroids: usize,
        /// Partitions scanned per query (defaults to sqrt(centroids))
        #[arg(short, long)]
        probes: Option<usize>,
        /// Read the index configuration from a JSON file instead
        #[arg(long, conflicts_with_all = ["dimension", "probes"])]
        config: Option<PathBuf>,
        /// Replace an existing collection
        #[arg(long)]
        force: bool,
    },
    /// Insert a vector
    Insert {
        /// Record ID
        id: String,
        /// Vector data as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(short, long)]
        vector: String,
        /// Payload name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Load records from a JSON-lines file
    Load {
        /// Path to the dataset
        path: PathBuf,
    },
    /// Delete a record
    Delete {
        /// Record ID to delete
        id: String,
    },
    /// Show one record
    Get {
        /// Record ID
        id: String,
    },
    /// List all record IDs
    List,
    /// Search for the nearest records
    Search {
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "8")]
        k: usize,
        /// Scan every record instead of probing partitions
        #[arg(long)]
        exact: bool,
    },
    /// Show index statistics
    Stats,
}

fn open(snapshots: &SnapshotManager) -> Result<Collection> {
    match snapshots.load_collection()? {
        Some(collection) => Ok(collection),
        None => bail!("no collection found, run `ivf init` first"),
    }
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    println!("Top {} results:", results.len());
    for (i, result) in results.iter().enumerate() {
        match result.payload.name() {
            Some(name) => println!(
                "{}. {} [{}] (distance: {:.4})",
                i + 1,
                result.id,
                name,
                result.distance
            ),
            None => println!("{}. {} (distance: {:.4})", i + 1, result.id, result.distance),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let snapshots = SnapshotManager::new(&cli.data_dir)
        .with_context(|| format!("cannot open data dir {}", cli.data_dir.display()))?;

    match cli.command {
        Commands::Init {
            name,
            dimension,
            metric,
            centroids,
            probes,
            config,
            force,
        } => {
            if snapshots.exists() && !force {
                bail!(
                    "a collection already exists in {} (use --force to replace it)",
                    cli.data_dir.display()
                );
            }
            let config = match (config, dimension) {
                (Some(path), _) => IndexConfig::from_json_file(&path)
                    .with_context(|| format!("cannot read config {}", path.display()))?,
                (None, Some(dimension)) => {
                    let config = IndexConfig::new(dimension, metric, centroids);
                    match probes {
                        Some(p) => config.with_probes(p),
                        None => config,
                    }
                }
                (None, None) => bail!("--dimension or --config is required"),
            };
            let collection = Collection::new(name, config)?;
            snapshots.save_collection(&collection)?;
            let config = collection.config();
            println!(
                "Created collection '{}' (dimension {}, metric {}, {} centroids, {} probes)",
                collection.name(),
                config.dimension,
                config.metric,
                config.centroids,
                config.probes()
            );
        }
        Commands::Insert { id, vector, name } => {
            let collection = open(&snapshots)?;
            let v = Vector::from_str(&vector)?;
            let payload = name.map(Payload::named).unwrap_or_default();
            collection.insert(id.clone(), v, payload)?;
            snapshots.save_collection(&collection)?;
            println!("Inserted record with ID: {}", id);
        }
        Commands::Load { path } => {
            let collection = open(&snapshots)?;
            let records = load_jsonl(&path)
                .with_context(|| format!("cannot load dataset {}", path.display()))?;
            let count = collection.bulk_load(records)?;
            snapshots.save_collection(&collection)?;
            println!("Loaded {} records ({} total)", count, collection.len());
        }
        Commands::Delete { id } => {
            let collection = open(&snapshots)?;
            collection.remove(&id)?;
            snapshots.save_collection(&collection)?;
            println!("Deleted record with ID: {}", id);
        }
        Commands::Get { id } => {
            let collection = open(&snapshots)?;
            let record = collection.get(&id)?;
            println!("{}", serde_json::to_string_pretty(record.as_ref())?);
        }
        Commands::List => {
            let collection = open(&snapshots)?;
            let ids = collection.ids()?;
            if ids.is_empty() {
                println!("No records in collection");
            } else {
                println!("Record IDs ({} total):", ids.len());
                for id in ids {
                    println!("  - {}", id);
                }
            }
        }
        Commands::Search { query, k, exact } => {
            let collection = open(&snapshots)?;
            let q = Vector::from_str(&query)?;
            let results = if exact {
                collection.search_exact(&q, k)
            } else {
                collection.search(&q, k)
            };
            match results {
                Ok(results) => print_results(&results),
                Err(e) => {
                    eprintln!("Search failed: {}", e);
                    print_results(&[]);
                }
            }
        }
        Commands::Stats => {
            let collection = open(&snapshots)?;
            let stats = collection.stats();
            println!("Collection:      {}", collection.name());
            println!("State:           {:?}", stats.state);
            match stats.generation {
                Some(generation) => println!("Generation:      {}", generation),
                None => println!("Generation:      none"),
            }
            println!("Dimension:       {}", stats.dimension);
            println!("Metric:          {}", stats.metric);
            println!("Probes:          {}", stats.probes);
            println!("Partitions:      {}", stats.partitions);
            println!("Records:         {}", stats.stored_records);
            println!(
                "Partition sizes: {}..{}",
                stats.smallest_partition, stats.largest_partition
            );
            println!("Iterations:      {}", stats.training_iterations);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
