//! Tokenizer pipeline.
//!
//! Split → drop short/long → stopword filter (optional) → stem. Lazy over
//! an `&str` input via an iterator adaptor chain: a finite, non-restartable
//! sequence of tokens.

use crate::stemmer::stem;
use crate::stopwords;

#[derive(Debug, Clone)]
pub struct TokenizerOptions {
    pub use_stopwords: bool,
    /// `0` disables the cap; tokens beyond the cap are silently dropped.
    pub max_tokens: usize,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            use_stopwords: true,
            max_tokens: 0,
        }
    }
}

const MIN_TOKEN_LEN: usize = 2;
const MAX_TOKEN_LEN: usize = 64;

/// Split `text` on any non-alphanumeric byte (underscore splits too),
/// lowercasing as it goes. Returns owned `String`s since case-folding a
/// `&str` in place isn't always possible for non-ASCII input.
fn split_lower(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// Run the full index/query-time tokenizer pipeline over `text`, returning a
/// lazy iterator of stemmed, lowercased tokens.
pub fn tokenize<'a>(text: &'a str, opts: &'a TokenizerOptions) -> impl Iterator<Item = String> + 'a {
    split_lower(text)
        .filter(|tok| tok.len() >= MIN_TOKEN_LEN && tok.len() <= MAX_TOKEN_LEN)
        .filter(move |tok| !opts.use_stopwords || !stopwords::is_stopword(tok))
        .map(|tok| stem(&tok))
        // Stemming can turn a content word into a stopword (e.g. "classes"
        // -> "class"), so the filter runs again post-stem: otherwise
        // re-tokenizing an already-tokenized stream could drop terms the
        // first pass kept, breaking idempotence.
        .filter(move |tok| !opts.use_stopwords || !stopwords::is_stopword(tok))
        .enumerate()
        .take_while(move |(i, _)| opts.max_tokens == 0 || *i < opts.max_tokens)
        .map(|(_, tok)| tok)
}

/// Tokenize a query string the same way as index-time tokenization, so
/// retrieval terms agree with what was indexed (stopword symmetry).
pub fn tokenize_query(query: &str, opts: &TokenizerOptions) -> Vec<String> {
    tokenize(query, opts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> TokenizerOptions {
        TokenizerOptions::default()
    }

    #[test]
    fn splits_on_non_alphanumeric_and_lowercases() {
        let toks: Vec<String> = tokenize("Hello, World! foo_bar", &TokenizerOptions { use_stopwords: false, max_tokens: 0 }).collect();
        assert!(toks.contains(&"hello".to_string()));
        assert!(toks.contains(&"world".to_string()));
        assert!(toks.contains(&"foo".to_string()));
        assert!(toks.contains(&"bar".to_string()));
    }

    #[test]
    fn drops_tokens_outside_length_bounds() {
        let long_token = "a".repeat(65);
        let text = format!("a ok {long_token} searchable");
        let toks: Vec<String> = tokenize(&text, &TokenizerOptions { use_stopwords: false, max_tokens: 0 }).collect();
        assert!(!toks.iter().any(|t| t == "a"));
        assert!(!toks.iter().any(|t| t.len() > MAX_TOKEN_LEN));
    }

    #[test]
    fn stopword_filter_removes_common_words_when_enabled() {
        let toks: Vec<String> = tokenize("the quick brown fox", &opts()).collect();
        assert!(!toks.contains(&"the".to_string()));
        assert!(toks.iter().any(|t| t == "quick" || t == "quick".to_string()));
    }

    #[test]
    fn stopword_filter_can_be_disabled() {
        let toks: Vec<String> = tokenize(
            "the quick brown fox",
            &TokenizerOptions { use_stopwords: false, max_tokens: 0 },
        )
        .collect();
        assert!(toks.contains(&"the".to_string()));
    }

    #[test]
    fn per_document_token_cap_truncates_stream() {
        let toks: Vec<String> = tokenize(
            "alpha beta gamma delta epsilon",
            &TokenizerOptions { use_stopwords: false, max_tokens: 3 },
        )
        .collect();
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn zero_cap_means_unlimited() {
        let toks: Vec<String> = tokenize(
            "alpha beta gamma delta epsilon",
            &TokenizerOptions { use_stopwords: false, max_tokens: 0 },
        )
        .collect();
        assert_eq!(toks.len(), 5);
    }

    #[test]
    fn index_and_query_pipelines_agree() {
        let index_opts = opts();
        let query_opts = opts();
        let index_terms: Vec<String> = tokenize("Searching quickly", &index_opts).collect();
        let query_terms = tokenize_query("searching quickly", &query_opts);
        assert_eq!(index_terms, query_terms);
    }

    #[test]
    fn stems_to_stopword_is_dropped_on_first_pass_too() {
        // "classes" is not itself a stopword, but it stems to "class",
        // which is. The post-stem filter must catch this on the very
        // first tokenization, not just the second, or idempotence breaks.
        let toks: Vec<String> = tokenize("classes", &opts()).collect();
        assert!(toks.is_empty());
    }

    #[test]
    fn tokenizing_twice_is_idempotent() {
        // tokenize(tokenize_normalize(s)) == tokenize(s): the normalized form
        // *is* the token stream joined by spaces, so re-tokenizing it must
        // reproduce the same sequence.
        let input = "The Quick-Brown_Fox jumps over 123 lazy dogs!";
        let once: Vec<String> = tokenize(input, &opts()).collect();
        let normalized = once.join(" ");
        let twice: Vec<String> = tokenize(&normalized, &opts()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn tokenizing_twice_is_idempotent_for_a_word_that_stems_into_a_stopword() {
        let input = "classes are searchable";
        let once: Vec<String> = tokenize(input, &opts()).collect();
        let normalized = once.join(" ");
        let twice: Vec<String> = tokenize(&normalized, &opts()).collect();
        assert_eq!(once, twice);
    }
}
