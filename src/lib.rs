pub mod api;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod tokenizer;

pub use api::{create_router, AppState};
pub use config::{IndexSettings, ReconstructPolicy, StorageConfig, TokenizerConfig};
pub use engine::SearchEngine;
pub use error::{ErrorKind, IndexError, Result};
pub use index::IndexStore;
pub use metrics::ServiceMetrics;
pub use models::*;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
