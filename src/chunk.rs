//! In-memory chunk representation and builder.
//!
//! A `Chunk` is the in-memory mirror of one on-disk segment: a document
//! table plus `{term -> postings}`. `ChunkBuilder` accumulates documents
//! until a batch-size threshold is crossed, at which point the caller
//! (the indexing driver in `cli.rs`) flushes it via `codec::write_chunk`
//! and starts a fresh builder.

use crate::context::RunContext;
use crate::error::CoreResult;
use crate::tokenizer::{self, TokenizerOptions};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub id: u32,
    pub path: PathBuf,
    pub mod_time_unix: i64,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: u32,
    pub tf: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermEntry {
    /// Ascending by `doc_id`, never reordered once appended.
    pub postings: Vec<Posting>,
    pub df: u32,
}

/// A complete, self-contained mini-index over a bounded set of documents.
/// `BTreeMap` keeps term iteration order stable and deterministic, which
/// the codec relies on when writing the term index: chunk files need not be
/// bit-exact across rebuilds, but each one must be self-describing and
/// internally consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub docs: Vec<DocEntry>,
    pub terms: BTreeMap<String, TermEntry>,
}

impl Chunk {
    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn total_tokens(&self) -> u64 {
        self.docs.iter().map(|d| d.length as u64).sum()
    }

    pub fn unique_tokens(&self) -> u32 {
        self.terms.len() as u32
    }
}

fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn tokenize_to_tf(text: &str, opts: &TokenizerOptions) -> (BTreeMap<String, u32>, u32) {
    let mut tf: BTreeMap<String, u32> = BTreeMap::new();
    let mut length: u32 = 0;
    for token in tokenizer::tokenize(text, opts) {
        *tf.entry(token).or_insert(0) += 1;
        length += 1;
    }
    (tf, length)
}

/// Accumulates documents into an in-memory `Chunk`, flushing when the
/// configured batch size is reached.
pub struct ChunkBuilder {
    chunk: Chunk,
    next_doc_id: u32,
    batch_size: usize,
    tokenizer_opts: TokenizerOptions,
}

impl ChunkBuilder {
    pub fn new(batch_size: usize, tokenizer_opts: TokenizerOptions) -> Self {
        Self {
            chunk: Chunk::default(),
            next_doc_id: 0,
            batch_size: batch_size.max(1),
            tokenizer_opts,
        }
    }

    /// Assigns a doc id, streams tokens accumulating per-document term
    /// frequencies, appends postings, appends the document-table entry.
    pub fn add_document(&mut self, path: &Path, mod_time: SystemTime, text: &str) -> CoreResult<()> {
        let (tf, length) = tokenize_to_tf(text, &self.tokenizer_opts);
        self.add_tokenized(path, mod_time, tf, length)
    }

    /// Same as `add_document`, but for text already reduced to a term-
    /// frequency map — lets the caller tokenize off the hot path (e.g. in
    /// parallel across a batch) while postings still append in whatever
    /// order documents are submitted here.
    pub fn add_tokenized(
        &mut self,
        path: &Path,
        mod_time: SystemTime,
        tf: BTreeMap<String, u32>,
        length: u32,
    ) -> CoreResult<()> {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;

        for (term, count) in tf {
            let entry = self.chunk.terms.entry(term).or_default();
            entry.postings.push(Posting { doc_id, tf: count });
            entry.df += 1;
        }

        self.chunk.docs.push(DocEntry {
            id: doc_id,
            path: path.to_path_buf(),
            mod_time_unix: unix_seconds(mod_time),
            length,
        });

        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.chunk.docs.len() >= self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.docs.is_empty()
    }

    pub fn doc_count(&self) -> usize {
        self.chunk.docs.len()
    }

    /// Consume the builder, returning the finished chunk and resetting
    /// internal state so the caller can start accumulating the next one.
    pub fn take(&mut self) -> Chunk {
        self.next_doc_id = 0;
        std::mem::take(&mut self.chunk)
    }
}

/// Drive a full crawl-to-chunks pass, invoking `on_flush` every time a
/// chunk reaches the batch size (or the crawl ends with a non-empty
/// partial chunk). Returns the total document count processed.
///
/// `on_flush` receives the completed in-memory `Chunk` and must persist it
/// (write the segment file, update the manifest) before returning.
pub fn build_chunks<F>(
    ctx: &RunContext,
    entries: &[crate::crawler::CrawlEntry],
    on_flush: F,
) -> CoreResult<u64>
where
    F: FnMut(Chunk) -> CoreResult<()>,
{
    let opts = TokenizerOptions {
        use_stopwords: ctx.config.search.use_stopwords,
        max_tokens: ctx.config.index.max_tokens_per_document,
    };
    if ctx.config.index.parallel_tokenize {
        build_chunks_parallel(ctx, entries, opts, on_flush)
    } else {
        build_chunks_sequential(ctx, entries, opts, on_flush)
    }
}

/// One file read + tokenized at a time. Cancellation is checked between
/// every file, the finest-grained checkpoint the pipeline offers.
fn build_chunks_sequential<F>(
    ctx: &RunContext,
    entries: &[crate::crawler::CrawlEntry],
    opts: TokenizerOptions,
    mut on_flush: F,
) -> CoreResult<u64>
where
    F: FnMut(Chunk) -> CoreResult<()>,
{
    let mut builder = ChunkBuilder::new(ctx.config.index.segment_size, opts);
    let total = entries.len() as u64;
    let mut processed: u64 = 0;

    for entry in entries {
        if ctx.cancel.is_cancelled() {
            break;
        }

        match entry.read() {
            Ok(text) => {
                builder.add_document(&entry.path, entry.mod_time, &text)?;
            }
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), error = %e, "skipping unreadable file");
            }
        }

        processed += 1;
        ctx.report(processed, total, format!("indexed {}", entry.path.display()));

        if builder.is_full() {
            let chunk = builder.take();
            on_flush(chunk)?;
        }
    }

    if !builder.is_empty() {
        let chunk = builder.take();
        on_flush(chunk)?;
    }

    Ok(processed)
}

/// Reads and tokenizes one batch (one chunk's worth of files) at a time
/// across a `rayon` thread pool, then feeds the results into the builder
/// sequentially in crawl order so doc ids and posting order stay
/// deterministic. Cancellation is checked once per batch rather than once
/// per file — a coarser checkpoint than the sequential path, traded for
/// parallel tokenization throughput.
fn build_chunks_parallel<F>(
    ctx: &RunContext,
    entries: &[crate::crawler::CrawlEntry],
    opts: TokenizerOptions,
    mut on_flush: F,
) -> CoreResult<u64>
where
    F: FnMut(Chunk) -> CoreResult<()>,
{
    let batch_size = ctx.config.index.segment_size.max(1);
    let mut builder = ChunkBuilder::new(batch_size, opts.clone());
    let total = entries.len() as u64;
    let mut processed: u64 = 0;

    for batch in entries.chunks(batch_size) {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let tokenized: Vec<Option<(PathBuf, SystemTime, BTreeMap<String, u32>, u32)>> = batch
            .par_iter()
            .map(|entry| match entry.read() {
                Ok(text) => {
                    let (tf, length) = tokenize_to_tf(&text, &opts);
                    Some((entry.path.clone(), entry.mod_time, tf, length))
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "skipping unreadable file");
                    None
                }
            })
            .collect();

        for result in tokenized {
            if let Some((path, mod_time, tf, length)) = result {
                builder.add_tokenized(&path, mod_time, tf, length)?;
            }
        }

        processed += batch.len() as u64;
        ctx.report(processed, total, format!("indexed {processed} of {total}"));

        if builder.is_full() {
            let chunk = builder.take();
            on_flush(chunk)?;
        }
    }

    if !builder.is_empty() {
        let chunk = builder.take();
        on_flush(chunk)?;
    }

    Ok(processed)
}
