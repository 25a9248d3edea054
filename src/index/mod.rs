//! Inverted index store: term postings, field statistics and the stored
//! field archive behind a single-writer handle.

pub mod analysis;
pub mod scoring;
mod store;

pub use analysis::{AnalyzedDocument, FieldTerms};
pub use store::{FieldStats, IndexReader, IndexStats, IndexStore};
#[cfg(test)]
pub(crate) use store::FailPoint;
