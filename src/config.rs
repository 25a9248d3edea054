use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Index settings configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    pub storage: StorageConfig,
    pub tokenizer_config: TokenizerConfig,
    pub reconstruct_policy: ReconstructPolicy,
    /// Longest accepted query text, in bytes
    pub max_query_len: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            tokenizer_config: TokenizerConfig::default(),
            reconstruct_policy: ReconstructPolicy::default(),
            max_query_len: 1024,
        }
    }
}

impl IndexSettings {
    /// Create settings for an index stored at `location`
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::new(location),
            ..Default::default()
        }
    }

    pub fn with_tokenizer(mut self, config: TokenizerConfig) -> Self {
        self.tokenizer_config = config;
        self
    }

    pub fn with_reconstruct_policy(mut self, policy: ReconstructPolicy) -> Self {
        self.reconstruct_policy = policy;
        self
    }

    pub fn with_max_query_len(mut self, len: usize) -> Self {
        self.max_query_len = len;
        self
    }

    pub fn with_open_retries(mut self, retries: u32, backoff_ms: u64) -> Self {
        self.storage.open_retries = retries;
        self.storage.open_retry_backoff_ms = backoff_ms;
        self
    }
}

/// Where the index lives and how hard to try for the writer lock
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub location: PathBuf,
    pub open_retries: u32,
    pub open_retry_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("./logs.index"),
            open_retries: 5,
            open_retry_backoff_ms: 20,
        }
    }
}

impl StorageConfig {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.location.join("catalog")
    }

    pub fn blob_path(&self) -> PathBuf {
        self.location.join("archive.blob")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.location.join("writer.lock")
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub language: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: true,
            stem: false,
            min_token_length: 1,
            max_token_length: 64,
            language: "english".to_string(),
        }
    }
}

/// What reconstruction does with a stored value that no longer decodes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructPolicy {
    /// Omit the offending occurrence and keep the rest of the document
    #[default]
    DropInvalid,
    /// Fail the whole reconstruction
    Strict,
}
