//! Match query evaluation

use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};
use crate::index::{IndexReader, IndexStore};
use crate::models::ScoredDocument;
use crate::tokenizer::{exact_term, Tokenizer};

/// Evaluates free-text match queries: OR across terms and across text fields.
pub struct QueryEngine<'a> {
    tokenizer: &'a Tokenizer,
    max_query_len: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self {
            tokenizer: store.tokenizer(),
            max_query_len: store.settings().max_query_len,
        }
    }

    /// Analyze query text into distinct terms, in first-seen order.
    ///
    /// Blank text yields no terms. Text that analysis reduces to nothing
    /// (stopwords only, punctuation) is kept as one exact term.
    pub fn terms(&self, query_text: &str) -> Result<Vec<String>> {
        if query_text.len() > self.max_query_len {
            return Err(IndexError::QueryError(format!(
                "query is {} bytes, limit is {}",
                query_text.len(),
                self.max_query_len
            )));
        }
        if query_text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
            return Err(IndexError::QueryError(
                "query contains control characters".to_string(),
            ));
        }
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut terms = self.tokenizer.tokenize(query_text);
        if terms.is_empty() {
            terms.push(exact_term(query_text));
        }
        let mut seen = std::collections::HashSet::new();
        terms.retain(|t| seen.insert(t.clone()));
        Ok(terms)
    }

    /// Ranked matches for `query_text`: descending score, ties by ascending id.
    pub fn evaluate(
        &self,
        reader: &IndexReader<'_>,
        query_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredDocument>> {
        let terms = self.terms(query_text)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        reader.match_terms(&terms, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexSettings;
    use crate::models::Field;
    use tempfile::TempDir;

    fn store_with(tmp: &TempDir, docs: &[(&str, &str)]) -> IndexStore {
        let store = IndexStore::open(IndexSettings::new(tmp.path().join("idx"))).unwrap();
        let cancel = CancellationToken::new();
        for (id, body) in docs {
            store.add(id, &[Field::text("body", *body)], &cancel).unwrap();
        }
        store
    }

    fn evaluate(store: &IndexStore, text: &str) -> Result<Vec<String>> {
        let engine = QueryEngine::new(store);
        let reader = store.reader();
        Ok(engine
            .evaluate(&reader, text, &CancellationToken::new())?
            .into_iter()
            .map(|r| r.doc_id)
            .collect())
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[("d1", "red fox")]);
        assert!(evaluate(&store, "").unwrap().is_empty());
        assert!(evaluate(&store, "   \t").unwrap().is_empty());
    }

    #[test]
    fn test_terms_are_ored() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[("d1", "red fox"), ("d2", "blue owl"), ("d3", "green frog")]);
        assert_eq!(evaluate(&store, "fox, owl!").unwrap(), vec!["d1", "d2"]);
    }

    #[test]
    fn test_more_matching_terms_rank_higher() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[("d1", "red fox"), ("d2", "red owl")]);
        assert_eq!(evaluate(&store, "red fox").unwrap(), vec!["d1", "d2"]);
    }

    #[test]
    fn test_stopword_only_query_uses_exact_term() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[("d1", "The"), ("d2", "the end")]);
        // "the end" analyzes to ["end"], so only the exact value matches
        assert_eq!(evaluate(&store, "THE").unwrap(), vec!["d1"]);
    }

    #[test]
    fn test_malformed_queries_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[]);
        assert!(matches!(
            evaluate(&store, "fox\u{0}"),
            Err(IndexError::QueryError(_))
        ));
        let long = "x".repeat(2048);
        assert!(matches!(evaluate(&store, &long), Err(IndexError::QueryError(_))));
    }

    #[test]
    fn test_duplicate_terms_collapse() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(&tmp, &[]);
        let engine = QueryEngine::new(&store);
        assert_eq!(engine.terms("fox Fox FOX den").unwrap(), vec!["fox", "den"]);
    }
}
