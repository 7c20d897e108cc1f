//! Snippet formatter: re-read the source file for a ranked document and
//! produce highlighted snippets around query-term hits.

use crate::error::CoreError;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const INITIAL_BUF_CAPACITY: usize = 64 * 1024;
const MAX_LINE_BYTES: usize = 5 * 1024 * 1024;
const MAX_SNIPPETS: usize = 3;
const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub line_number: usize,
    pub text: String,
    /// Byte ranges within `text` to highlight.
    pub highlights: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: PathBuf,
    pub score: f64,
    pub snippets: Vec<Snippet>,
}

/// True if `haystack[idx..idx+len]` is bounded by non-alphanumeric
/// characters (or string edges) on both sides — a manual word-boundary
/// check rather than pulling in `regex`'s `\b`, matching whole words by
/// default.
fn is_word_boundary_match(haystack: &[char], idx: usize, len: usize) -> bool {
    let before_ok = idx == 0 || !haystack[idx - 1].is_alphanumeric();
    let after_idx = idx + len;
    let after_ok = after_idx >= haystack.len() || !haystack[after_idx].is_alphanumeric();
    before_ok && after_ok
}

/// Find every whole-word, case-insensitive occurrence of any term in
/// `terms` within `line`, returning `(start_byte, end_byte)` pairs sorted
/// by start position.
fn find_hits(line: &str, terms: &[String]) -> Vec<(usize, usize)> {
    let lower: Vec<char> = line.to_lowercase().chars().collect();
    let mut hits = Vec::new();

    for term in terms {
        if term.is_empty() {
            continue;
        }
        let term_chars: Vec<char> = term.chars().collect();
        let tlen = term_chars.len();
        if tlen == 0 || tlen > lower.len() {
            continue;
        }
        for start in 0..=(lower.len() - tlen) {
            if lower[start..start + tlen] == term_chars[..] && is_word_boundary_match(&lower, start, tlen) {
                let byte_start = char_index_to_byte(line, start);
                let byte_end = char_index_to_byte(line, start + tlen);
                hits.push((byte_start, byte_end));
            }
        }
    }

    hits.sort_by_key(|h| h.0);
    hits
}

fn char_index_to_byte(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(b, _)| b).unwrap_or(s.len())
}

/// Build one coalesced, length-bounded snippet from a line and its hits,
/// centered on the first hit.
fn make_snippet(line_number: usize, line: &str, hits: &[(usize, usize)]) -> Snippet {
    if line.len() <= SNIPPET_MAX_CHARS {
        return Snippet { line_number, text: line.to_string(), highlights: hits.to_vec() };
    }

    let center = hits[0].0;
    let half = SNIPPET_MAX_CHARS / 2;
    let start = center.saturating_sub(half);
    let end = (start + SNIPPET_MAX_CHARS).min(line.len());
    let start = end.saturating_sub(SNIPPET_MAX_CHARS).max(0).min(start);

    // Snap to char boundaries.
    let start = (0..=start).rev().find(|&i| line.is_char_boundary(i)).unwrap_or(0);
    let end = (end..=line.len()).find(|&i| line.is_char_boundary(i)).unwrap_or(line.len());

    let text = line[start..end].to_string();
    let adjusted: Vec<(usize, usize)> = hits
        .iter()
        .filter(|(s, e)| *s >= start && *e <= end)
        .map(|(s, e)| (s - start, e - start))
        .collect();

    Snippet { line_number, text, highlights: adjusted }
}

/// Scan `path` line by line and produce up to `MAX_SNIPPETS` snippets
/// centered on whole-word, case-insensitive hits of any term in `query_terms`.
pub fn format_snippets(path: &Path, query_terms: &[String]) -> Result<Vec<Snippet>, CoreError> {
    let file = std::fs::File::open(path).map_err(|e| CoreError::UnreadableFile(path.to_path_buf(), e.to_string()))?;
    let mut reader = BufReader::with_capacity(INITIAL_BUF_CAPACITY, file);

    let mut snippets = Vec::new();
    let mut line_number = 0usize;
    let mut raw_line = Vec::new();

    loop {
        if snippets.len() >= MAX_SNIPPETS {
            break;
        }
        raw_line.clear();
        let read = reader
            .read_until(b'\n', &mut raw_line)
            .map_err(|e| CoreError::UnreadableFile(path.to_path_buf(), e.to_string()))?;
        if read == 0 {
            break;
        }
        line_number += 1;
        if raw_line.len() > MAX_LINE_BYTES {
            return Err(CoreError::UnreadableFile(
                path.to_path_buf(),
                format!("line {line_number} exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }

        let line = String::from_utf8_lossy(&raw_line);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }

        let hits = find_hits(line, query_terms);
        if !hits.is_empty() {
            snippets.push(make_snippet(line_number, line, &hits));
        }
    }

    Ok(snippets)
}

/// Build the final `SearchResult` for a ranked document, applying the
/// no-false-positives post-filter: a document that yields zero snippets is
/// dropped by returning `Ok(None)`.
pub fn build_result(path: &Path, score: f64, query_terms: &[String]) -> Result<Option<SearchResult>, CoreError> {
    let snippets = format_snippets(path, query_terms)?;
    if snippets.is_empty() {
        return Ok(None);
    }
    Ok(Some(SearchResult { path: path.to_path_buf(), score, snippets }))
}
