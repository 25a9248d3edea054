//! Scoring and ranking for match queries

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::models::{DocumentId, ScoredDocument};

/// BM25 parameters
pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

/// Compute BM25 score for a term in one field of a document
///
/// # Arguments
/// * `tf` - Term frequency in the field
/// * `df` - Document frequency (how many documents contain the term in this field)
/// * `total_docs` - Total number of documents in the index
/// * `field_len` - Length of the field (in tokens)
/// * `avg_field_len` - Average length of this field across documents
///
/// # Returns
/// BM25 relevance score
pub fn bm25_score(tf: f32, df: f32, total_docs: f32, field_len: f32, avg_field_len: f32) -> f32 {
    // Inverse document frequency, kept positive by the +1
    let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

    let avg = if avg_field_len > 0.0 { avg_field_len } else { 1.0 };
    let norm = 1.0 - BM25_B + BM25_B * (field_len / avg);

    idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm)
}

/// Order accumulated scores: descending score, then ascending id.
pub fn rank(scores: BTreeMap<DocumentId, f32>) -> Vec<ScoredDocument> {
    let mut ranked: Vec<ScoredDocument> = scores
        .into_iter()
        .map(|(doc_id, score)| ScoredDocument::new(doc_id, score))
        .collect();
    ranked.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_score() {
        let score = bm25_score(5.0, 10.0, 1000.0, 100.0, 100.0);
        assert!(score > 0.0);

        // Higher TF should give higher score (with same other params)
        let score1 = bm25_score(1.0, 10.0, 1000.0, 100.0, 100.0);
        let score2 = bm25_score(5.0, 10.0, 1000.0, 100.0, 100.0);
        assert!(score2 > score1);

        // Lower DF (rarer term) should give higher score
        let score1 = bm25_score(5.0, 100.0, 1000.0, 100.0, 100.0);
        let score2 = bm25_score(5.0, 10.0, 1000.0, 100.0, 100.0);
        assert!(score2 > score1);

        // Shorter field with the same TF should give higher score
        let short = bm25_score(1.0, 1.0, 10.0, 2.0, 5.0);
        let long = bm25_score(1.0, 1.0, 10.0, 8.0, 5.0);
        assert!(short > long);
    }

    #[test]
    fn test_bm25_single_document_index_is_positive() {
        assert!(bm25_score(1.0, 1.0, 1.0, 2.0, 2.0) > 0.0);
        assert!(bm25_score(1.0, 1.0, 1.0, 2.0, 0.0).is_finite());
    }

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let mut scores = BTreeMap::new();
        scores.insert("b".to_string(), 1.0);
        scores.insert("c".to_string(), 2.0);
        scores.insert("a".to_string(), 1.0);

        let ids: Vec<String> = rank(scores).into_iter().map(|r| r.doc_id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
