use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeMap, HashSet};
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Text tokenizer with optional stemming and stopword removal.
///
/// The same instance analyzes field text at index time and query text at
/// search time, so both sides agree on what a term is.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

fn language_of(name: &str) -> (Algorithm, LANGUAGE) {
    match name.to_lowercase().as_str() {
        "french" => (Algorithm::French, LANGUAGE::French),
        "german" => (Algorithm::German, LANGUAGE::German),
        "spanish" => (Algorithm::Spanish, LANGUAGE::Spanish),
        "italian" => (Algorithm::Italian, LANGUAGE::Italian),
        "portuguese" => (Algorithm::Portuguese, LANGUAGE::Portuguese),
        _ => (Algorithm::English, LANGUAGE::English),
    }
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let (algorithm, language) = language_of(&config.language);

        let stemmer = if config.stem {
            Some(Stemmer::create(algorithm))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            get(language)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens: Vec<String> = text
            .unicode_words()
            .map(|word| {
                if self.config.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .filter(|token| {
                let len = token.chars().count();
                len >= self.config.min_token_length
                    && len <= self.config.max_token_length
                    && !self.stopwords.contains(token)
            })
            .collect();

        if let Some(stemmer) = &self.stemmer {
            tokens = tokens
                .into_iter()
                .map(|token| stemmer.stem(&token).to_string())
                .collect();
        }

        tokens
    }

    /// Terms for a text value, falling back to the whole value as one exact
    /// term when analysis leaves nothing (only stopwords, punctuation, ...).
    pub fn terms_or_exact(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenize(text);
        if !tokens.is_empty() {
            return tokens;
        }
        vec![exact_term(text)]
    }

    /// Compute term frequencies for a tokenized text
    pub fn compute_term_frequencies(&self, text: &str) -> BTreeMap<String, u32> {
        let mut freq = BTreeMap::new();
        for token in self.terms_or_exact(text) {
            *freq.entry(token).or_insert(0) += 1;
        }
        freq
    }
}

/// Case-insensitive exact form of a whole value
pub fn exact_term(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_config() -> TokenizerConfig {
        TokenizerConfig {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 50,
            language: "english".to_string(),
        }
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new(&plain_config());
        let tokens = tokenizer.tokenize("Hello World! This is a test.");

        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
        assert!(tokens.contains(&"test".to_string()));
        assert!(tokens.contains(&"a".to_string()));
    }

    #[test]
    fn test_punctuation_splits_terms() {
        let tokenizer = Tokenizer::new(&plain_config());
        let tokens = tokenizer.tokenize("red,fox;jumps");
        assert_eq!(tokens, vec!["red", "fox", "jumps"]);
    }

    #[test]
    fn test_stopword_removal() {
        let config = TokenizerConfig {
            remove_stopwords: true,
            ..plain_config()
        };

        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("This is a document about the system");

        assert!(!tokens.contains(&"this".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(tokens.contains(&"document".to_string()));
    }

    #[test]
    fn test_stemming() {
        let config = TokenizerConfig {
            stem: true,
            ..plain_config()
        };

        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("running runs runner");

        assert!(tokens.iter().all(|t| t.starts_with("run")));
    }

    #[test]
    fn test_term_frequencies() {
        let tokenizer = Tokenizer::new(&plain_config());

        let freq = tokenizer.compute_term_frequencies("apple Apple banana");
        assert_eq!(freq.get("apple"), Some(&2));
        assert_eq!(freq.get("banana"), Some(&1));
    }

    #[test]
    fn test_min_max_token_length() {
        let config = TokenizerConfig {
            min_token_length: 3,
            max_token_length: 5,
            ..plain_config()
        };

        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("a ab abc abcd abcde abcdef");

        assert!(!tokens.contains(&"ab".to_string()));
        assert!(tokens.contains(&"abc".to_string()));
        assert!(tokens.contains(&"abcde".to_string()));
        assert!(!tokens.contains(&"abcdef".to_string()));
    }

    #[test]
    fn test_exact_fallback() {
        let tokenizer = Tokenizer::new(&TokenizerConfig::default());
        // Only stopwords: nothing survives analysis
        assert!(tokenizer.tokenize("The").is_empty());
        assert_eq!(tokenizer.terms_or_exact(" The "), vec!["the"]);
        assert_eq!(tokenizer.terms_or_exact("--"), vec!["--"]);
    }
}
