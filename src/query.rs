//! Query engine: parse, retrieve candidates, rank by weighted BM25 + VSM
//! with recency decay and fuzzy fallback.

use crate::chunk::Chunk;
use crate::codec;
use crate::context::RunContext;
use crate::error::CoreError;
use crate::fuzzy;
use crate::manifest::Manifest;
use crate::paths;
use crate::tokenizer::{self, TokenizerOptions};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
/// Not exposed in TOML configuration.
const FUZZY_MIN_TERM_LENGTH: usize = 4;
const FUZZY_PENALTY: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub path: PathBuf,
    pub score: f64,
    pub mod_time_unix: i64,
    /// The vocabulary terms actually scored for this document — the query
    /// term itself for an exact hit, or the fuzzy-resolved term it matched
    /// against instead. Callers highlight snippets against the union of
    /// these and the raw query words, so a fuzzy hit can still produce a
    /// snippet and survive the zero-snippet post-filter.
    pub matched_terms: Vec<String>,
}

fn idf(n: f64, df: f64) -> f64 {
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln().max(0.0)
}

struct TermMatch {
    matched_term: String,
    penalty: f64,
    df: u32,
}

/// Split the raw query on whitespace and lowercase, without stemming — the
/// original, pre-stem words retained separately for the snippet formatter
/// to highlight against.
pub fn original_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

struct LoadedChunk {
    chunk: Chunk,
    doc_index: HashMap<u32, usize>,
}

fn load_complete_chunks(data_dir: &Path, manifest: &Manifest) -> Vec<LoadedChunk> {
    let mut loaded = Vec::new();
    for info in manifest.complete_chunks() {
        let path = paths::chunk_file(data_dir, info.id);
        match codec::load_chunk(info.id, &path) {
            Ok(chunk) => {
                let doc_index = chunk.docs.iter().enumerate().map(|(i, d)| (d.id, i)).collect();
                loaded.push(LoadedChunk { chunk, doc_index });
            }
            Err(e) => {
                tracing::warn!(chunk_id = info.id, error = %e, "skipping corrupt chunk");
            }
        }
    }
    loaded
}

fn resolve_term_matches(term: &str, loaded: &[LoadedChunk]) -> Vec<TermMatch> {
    let exact_df: u32 = loaded.iter().filter_map(|lc| lc.chunk.terms.get(term)).map(|e| e.df).sum();
    if exact_df > 0 {
        return vec![TermMatch { matched_term: term.to_string(), penalty: 1.0, df: exact_df }];
    }
    if term.len() < FUZZY_MIN_TERM_LENGTH {
        return Vec::new();
    }

    let mut vocab: HashSet<&str> = HashSet::new();
    for lc in loaded {
        vocab.extend(lc.chunk.terms.keys().map(|s| s.as_str()));
    }
    fuzzy::fuzzy_candidates(term, vocab.into_iter())
        .into_iter()
        .filter_map(|cand| {
            let df: u32 = loaded.iter().filter_map(|lc| lc.chunk.terms.get(cand)).map(|e| e.df).sum();
            if df > 0 {
                Some(TermMatch { matched_term: cand.to_string(), penalty: FUZZY_PENALTY, df })
            } else {
                None
            }
        })
        .collect()
}

#[derive(Default)]
struct DocAccumulator {
    bm25: f64,
    dot: f64,
    doc_norm_sq: f64,
}

/// Run a query against the given manifest/chunks. Returns
/// results ordered by score descending, tie-broken by `mod_time` descending
/// then path ascending, truncated to `limit`. Zero-score results are
/// dropped (score=0 post-filter); the zero-snippet post-filter happens one
/// layer up once the caller has a `Path` to re-read (`cli.rs`).
pub fn search(
    ctx: &RunContext,
    data_dir: &Path,
    manifest: &Manifest,
    query: &str,
    limit: usize,
) -> Result<Vec<ScoredDocument>, CoreError> {
    let opts = TokenizerOptions { use_stopwords: ctx.config.search.use_stopwords, max_tokens: 0 };
    let query_terms = tokenizer::tokenize_query(query, &opts);
    if query_terms.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_tf: BTreeMap<String, u32> = BTreeMap::new();
    for t in &query_terms {
        *query_tf.entry(t.clone()).or_insert(0) += 1;
    }

    let loaded = load_complete_chunks(data_dir, manifest);
    let n = manifest.total_docs.max(1) as f64;
    let avgdl = manifest.avg_doc_length.max(1.0);

    let mut term_matches: BTreeMap<String, Vec<TermMatch>> = BTreeMap::new();
    for term in query_tf.keys() {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let matches = resolve_term_matches(term, &loaded);
        if !matches.is_empty() {
            term_matches.insert(term.clone(), matches);
        }
    }

    // Query-vector norm depends only on (query tf, idf, penalty), never on
    // any individual document, so it is computed once up front.
    let mut query_norm_sq = 0.0;
    for (term, matches) in &term_matches {
        let qtf = *query_tf.get(term).unwrap() as f64;
        for m in matches {
            let q_weight = qtf * idf(n, m.df as f64);
            query_norm_sq += q_weight * q_weight;
        }
    }

    let mut docs: HashMap<PathBuf, DocAccumulator> = HashMap::new();
    let mut doc_meta: HashMap<PathBuf, (i64, u32)> = HashMap::new();
    let mut doc_matched_terms: HashMap<PathBuf, BTreeSet<String>> = HashMap::new();

    for (term, matches) in &term_matches {
        let qtf = *query_tf.get(term).unwrap() as f64;
        for m in matches {
            let idf_t = idf(n, m.df as f64);
            let q_weight = qtf * idf_t;

            for lc in &loaded {
                let Some(entry) = lc.chunk.terms.get(&m.matched_term) else { continue };
                for posting in &entry.postings {
                    let doc_pos = lc.doc_index[&posting.doc_id];
                    let doc = &lc.chunk.docs[doc_pos];
                    let tf = posting.tf as f64;
                    let doclen = doc.length.max(1) as f64;

                    let bm25_contrib = m.penalty * idf_t * (tf * (BM25_K1 + 1.0))
                        / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doclen / avgdl));

                    let doc_weight = m.penalty * tf * idf_t;

                    let acc = docs.entry(doc.path.clone()).or_default();
                    acc.bm25 += bm25_contrib;
                    acc.dot += q_weight * doc_weight;
                    acc.doc_norm_sq += doc_weight * doc_weight;

                    doc_meta.insert(doc.path.clone(), (doc.mod_time_unix, doc.length));
                    doc_matched_terms
                        .entry(doc.path.clone())
                        .or_default()
                        .insert(m.matched_term.clone());
                }
            }
        }
    }

    let max_bm25 = docs.values().map(|a| a.bm25).fold(0.0_f64, f64::max);
    let half_life = ctx.config.ranking.recency_half_life_days.max(1) as f64;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut results: Vec<ScoredDocument> = docs
        .into_iter()
        .map(|(path, acc)| {
            let (mod_time, _len) = doc_meta[&path];
            let normalized_bm25 = if max_bm25 > 0.0 { acc.bm25 / max_bm25 } else { 0.0 };
            let denom = (query_norm_sq * acc.doc_norm_sq).sqrt();
            let normalized_vsm = if denom > 0.0 { acc.dot / denom } else { 0.0 };

            let combined = ctx.config.ranking.bm25_weight * normalized_bm25
                + ctx.config.ranking.vsm_weight * normalized_vsm;

            let age_days = ((now - mod_time).max(0) as f64) / 86_400.0;
            let recency = 0.5_f64.powf(age_days / half_life);

            let matched_terms = doc_matched_terms.remove(&path).map(|s| s.into_iter().collect()).unwrap_or_default();

            ScoredDocument { path, score: combined * recency, mod_time_unix: mod_time, matched_terms }
        })
        .filter(|d| d.score > 0.0)
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.mod_time_unix.cmp(&a.mod_time_unix))
            .then_with(|| a.path.cmp(&b.path))
    });
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBuilder;
    use crate::config::Config;
    use crate::manifest::{ChunkInfo, ChunkStatus};
    use std::time::SystemTime;

    fn build_index(tmp: &Path, docs: &[(&str, &str)]) -> Manifest {
        let opts = TokenizerOptions { use_stopwords: true, max_tokens: 0 };
        let mut builder = ChunkBuilder::new(1000, opts);
        for (name, text) in docs {
            builder.add_document(Path::new(name), SystemTime::now(), text).unwrap();
        }
        let chunk = builder.take();
        let doc_count = chunk.doc_count();
        let total_tokens = chunk.total_tokens();

        paths::ensure_data_dirs(tmp).unwrap();
        codec::write_chunk(&paths::chunk_file(tmp, 1), &chunk).unwrap();

        let mut manifest = Manifest::new_empty();
        manifest.chunks.push(ChunkInfo {
            id: 1,
            filename: "001.idx".to_string(),
            status: ChunkStatus::Complete,
            doc_count,
            token_count: total_tokens,
            created_at: 0,
        });
        manifest.recompute_aggregates();
        manifest
    }

    fn ctx() -> RunContext {
        RunContext::new(Config::default())
    }

    #[test]
    fn s1_both_documents_returned_for_shared_term() {
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = build_index(
            tmp.path(),
            &[("/tmp/a.txt", "the quick brown fox"), ("/tmp/b.txt", "brown dogs are quick")],
        );
        let results = search(&ctx(), tmp.path(), &manifest, "quick", 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn fuzzy_term_only_contributes_when_no_exact_match() {
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = build_index(tmp.path(), &[("/tmp/a.txt", "the quick brown fox")]);
        let exact = search(&ctx(), tmp.path(), &manifest, "quick", 10).unwrap();
        let fuzzy_hits = search(&ctx(), tmp.path(), &manifest, "quik", 10).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(fuzzy_hits.len(), 1);
        // fuzzy match is penalized relative to an exact hit on the same corpus.
        assert!(fuzzy_hits[0].score <= exact[0].score);
    }

    #[test]
    fn documents_with_no_matching_terms_are_absent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = build_index(
            tmp.path(),
            &[("/tmp/a.txt", "apples and oranges"), ("/tmp/b.txt", "completely unrelated text")],
        );
        let results = search(&ctx(), tmp.path(), &manifest, "nonexistentword", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn results_respect_limit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let docs: Vec<(String, String)> = (0..5).map(|i| (format!("/tmp/{i}.txt"), "shared keyword here".to_string())).collect();
        let docs_ref: Vec<(&str, &str)> = docs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let manifest = build_index(tmp.path(), &docs_ref);
        let results = search(&ctx(), tmp.path(), &manifest, "shared", 3).unwrap();
        assert_eq!(results.len(), 3);
    }
}
