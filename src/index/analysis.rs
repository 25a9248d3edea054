use std::collections::BTreeMap;

use crate::models::{Field, FieldKind, FieldValue};
use crate::tokenizer::Tokenizer;

/// Terms of one (field name, kind) instance of a document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldTerms {
    /// Token count across every occurrence of the field
    pub length: u32,
    pub frequencies: BTreeMap<String, u32>,
}

/// Every posting a document contributes, keyed by field instance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalyzedDocument {
    pub fields: BTreeMap<(String, FieldKind), FieldTerms>,
}

impl AnalyzedDocument {
    /// Run the analysis chain over flattened fields.
    ///
    /// Text occurrences contribute their tokens (or their exact value when no
    /// token survives); numbers and date-times contribute one literal term.
    pub fn analyze(tokenizer: &Tokenizer, fields: &[Field]) -> Self {
        let mut out = Self::default();
        for field in fields {
            let entry = out
                .fields
                .entry((field.name.clone(), field.kind()))
                .or_default();
            match &field.value {
                FieldValue::Text(text) => {
                    for (term, tf) in tokenizer.compute_term_frequencies(text) {
                        entry.length += tf;
                        *entry.frequencies.entry(term).or_insert(0) += tf;
                    }
                }
                FieldValue::Number(_) | FieldValue::DateTime(_) => {
                    entry.length += 1;
                    *entry.frequencies.entry(field.literal_term()).or_insert(0) += 1;
                }
            }
        }
        out
    }

    /// Every distinct term of the document
    pub fn terms(&self) -> impl Iterator<Item = &String> {
        self.fields.values().flat_map(|f| f.frequencies.keys())
    }

    /// (field name, length) for each text field instance
    pub fn text_lengths(&self) -> impl Iterator<Item = (&str, u32)> {
        self.fields
            .iter()
            .filter(|((_, kind), _)| *kind == FieldKind::Text)
            .map(|((name, _), terms)| (name.as_str(), terms.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;

    #[test]
    fn test_multi_valued_text_accumulates() {
        let tokenizer = Tokenizer::new(&TokenizerConfig::default());
        let fields = vec![
            Field::text("tags", "rust"),
            Field::text("tags", "rust search"),
            Field::text("title", "the"),
        ];
        let analyzed = AnalyzedDocument::analyze(&tokenizer, &fields);

        let tags = &analyzed.fields[&("tags".to_string(), FieldKind::Text)];
        assert_eq!(tags.length, 3);
        assert_eq!(tags.frequencies.get("rust"), Some(&2));

        // Stopword-only value is kept as an exact term
        let title = &analyzed.fields[&("title".to_string(), FieldKind::Text)];
        assert_eq!(title.frequencies.get("the"), Some(&1));
    }

    #[test]
    fn test_numbers_post_their_literal() {
        let tokenizer = Tokenizer::new(&TokenizerConfig::default());
        let fields = vec![Field::new(
            "views",
            FieldValue::Number(serde_json::Number::from(3)),
        )];
        let analyzed = AnalyzedDocument::analyze(&tokenizer, &fields);
        let views = &analyzed.fields[&("views".to_string(), FieldKind::Number)];
        assert_eq!(views.frequencies.get("3"), Some(&1));
        assert_eq!(analyzed.text_lengths().count(), 0);
    }
}
