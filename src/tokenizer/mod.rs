//! Text analysis shared by indexing and querying.

#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::{exact_term, Tokenizer};
