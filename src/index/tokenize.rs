//! Tokenization for index writes and queries.
//!
//! Writers and readers must tokenize identically or lookups silently miss;
//! this module is the only tokenizer in the crate.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Tokens shorter than this carry too little signal to index.
const MIN_TOKEN_LEN: usize = 3;

/// English stopwords excluded from postings and queries alike.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "has",
        "her", "him", "his", "how", "its", "may", "our", "out", "she", "while", "this", "that",
        "was", "were", "with", "will", "what", "when", "where", "which", "who", "why", "your",
        "from", "have", "they", "them", "then", "than", "there", "their", "been", "being",
        "into", "over", "under", "about", "after", "before", "because", "between", "during",
        "does", "did", "doing", "each", "few", "more", "most", "other", "some", "such", "only",
        "own", "same", "too", "very", "just", "also", "should", "would", "could",
    ])
});

/// Break text into index tokens.
///
/// Lowercases, strips everything but alphanumerics and underscores, drops
/// short tokens and stopwords, and deduplicates preserving first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_lowercase();
        if token.chars().count() < MIN_TOKEN_LEN || STOPWORDS.contains(token.as_str()) {
            continue;
        }
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Brazil's Trade-Policy, 2024!"),
            vec!["brazil", "trade", "policy", "2024"]
        );
    }

    #[test]
    fn drops_short_tokens_and_stopwords() {
        assert_eq!(tokenize("it is the policy of an era"), vec!["policy", "era"]);
    }

    #[test]
    fn deduplicates_preserving_first_seen_order() {
        assert_eq!(
            tokenize("trade policy trade wins policy"),
            vec!["trade", "policy", "wins"]
        );
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(tokenize("q3_report beats q2"), vec!["q3_report", "beats"]);
    }

    #[test]
    fn empty_and_whitespace_inputs() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \t\n ").is_empty());
        assert!(tokenize("a of to").is_empty());
    }
}
