//! # IVF Engine
//!
//! An embedded approximate nearest-neighbor (ANN) vector search engine.
//!
//! This library provides:
//! - A vector store owning `(id, vector, payload)` records
//! - Distance metrics (squared Euclidean, Euclidean, Cosine)
//! - k-means partitioning into an inverted-file (IVF) index
//! - Top-k queries that probe the nearest partitions
//! - Versioned index generations swapped in atomically on rebuild
//! - Snapshot persistence and JSON-lines datasets
//!
//! ## Example
//!
//! ```rust
//! use ivf_engine::{Collection, DistanceMetric, IndexConfig, Payload, Vector};
//!
//! let config = IndexConfig::new(3, DistanceMetric::EuclideanSquared, 2);
//! let colors = Collection::new("colors", config).unwrap();
//!
//! colors.insert("c1", Vector::new(vec![0.0, 0.0, 0.0]), Payload::named("black")).unwrap();
//! colors.insert("c2", Vector::new(vec![255.0, 255.0, 255.0]), Payload::named("white")).unwrap();
//! colors.insert("c3", Vector::new(vec![255.0, 0.0, 0.0]), Payload::named("red")).unwrap();
//! colors.build().unwrap();
//!
//! let results = colors.search(&Vector::new(vec![250.0, 10.0, 10.0]), 1).unwrap();
//! assert_eq!(results[0].payload.name(), Some("red"));
//! ```

pub mod collection;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod embedding;
pub mod error;
pub mod flat_index;
pub mod index;
pub mod ivf;
pub mod kmeans;
pub mod metrics;
pub mod neighbor_queue;
pub mod persistence;
pub mod record;
pub mod storage;
pub mod vector;

pub use collection::{Collection, IndexState, IndexStats};
pub use config::IndexConfig;
pub use distance::DistanceMetric;
pub use embedding::{Embedder, StaticEmbeddings};
pub use error::{AnnError, Result};
pub use flat_index::FlatIndex;
pub use index::{Index, SearchResult};
pub use ivf::IvfIndex;
pub use kmeans::CancelToken;
pub use metrics::MetricsSnapshot;
pub use persistence::SnapshotManager;
pub use record::{Payload, Record};
pub use storage::VectorStore;
pub use vector::Vector;
