//! Property-based coverage for the tokenizer and posting order, using
//! randomized inputs instead of fixed examples.

use mneme::chunk::ChunkBuilder;
use mneme::tokenizer::{tokenize, TokenizerOptions};
use proptest::prelude::*;
use std::path::Path;
use std::time::SystemTime;

fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9_]{0,12}", 0..40).prop_map(|words| words.join(" "))
}

/// Regression for a word that isn't a stopword but stems into one (e.g.
/// "classes" -> "class"). The `[a-zA-Z0-9_]{0,12}` proptest generator above
/// essentially never lands on one of these by chance, so it's covered here
/// as a fixed case instead.
const STEMS_TO_STOPWORD_WORDS: &[&str] = &["classes", "finals", "publicly", "privates"];

proptest! {
    /// Tokenizing an already-tokenized (normalized) stream is a fixed
    /// point — re-running the pipeline never drops or reorders terms.
    #[test]
    fn tokenizing_twice_is_idempotent(text in arb_text()) {
        let opts = TokenizerOptions::default();
        let once: Vec<String> = tokenize(&text, &opts).collect();
        let normalized = once.join(" ");
        let twice: Vec<String> = tokenize(&normalized, &opts).collect();
        prop_assert_eq!(once, twice);
    }

    /// Within a chunk, postings for any term are strictly ascending by doc
    /// id, regardless of how many documents share terms or in what order
    /// terms happen to occur within a document.
    #[test]
    fn postings_are_ascending_by_doc_id(
        docs in proptest::collection::vec(arb_text(), 1..30)
    ) {
        let opts = TokenizerOptions { use_stopwords: false, max_tokens: 0 };
        let mut builder = ChunkBuilder::new(10_000, opts);
        for (i, text) in docs.iter().enumerate() {
            let path = format!("/tmp/doc{i}.txt");
            builder.add_document(Path::new(&path), SystemTime::now(), text).unwrap();
        }
        let chunk = builder.take();

        for entry in chunk.terms.values() {
            let ids: Vec<u32> = entry.postings.iter().map(|p| p.doc_id).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(ids, sorted);
        }
    }
}

#[test]
fn tokenizing_twice_is_idempotent_for_words_that_stem_into_a_stopword() {
    let opts = TokenizerOptions::default();
    for word in STEMS_TO_STOPWORD_WORDS {
        let once: Vec<String> = tokenize(word, &opts).collect();
        let normalized = once.join(" ");
        let twice: Vec<String> = tokenize(&normalized, &opts).collect();
        assert_eq!(once, twice, "word {word:?} broke idempotence");
    }
}
