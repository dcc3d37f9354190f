// Indexing and hybrid search core for a D-language package registry
// documentation search system. See module docs for the ingestion and
// query-side entry points: `IngestionPipeline` and `SearchEngine`.

pub mod config;
pub mod crawler;
pub mod embedder;
pub mod error;
pub mod fetch;
pub mod ingestion;
pub mod observability;
pub mod parsing;
pub mod pattern_miner;
pub mod search;
pub mod store;
pub mod types;

pub use config::CoreConfig;
pub use crawler::Crawler;
pub use embedder::{Embedder, EmbedderManager};
pub use error::{CoreError, CoreResult};
pub use ingestion::{BatchReport, IngestionPipeline};
pub use pattern_miner::PatternMiner;
pub use search::SearchEngine;
pub use store::Store;
pub use types::{EntityKind, EntityKindDto, IngestionStatus, SearchHit, SearchOptions, TypeKind};
