//! Binary segment codec.
//!
//! ```text
//! Header:    magic("MNM1") | u32 version | u32 reserved
//! DocTable:  u32 doc_count | repeated { u32 id; u16 path_len; utf8 path; i64 mod_time_unix; u32 length }
//! TermIndex: u32 term_count | repeated { u16 term_len; utf8 term; u32 df; u32 postings_len; repeated { varint doc_id_delta; varint tf } }
//! Footer:    u64 doctable_offset | u64 termindex_offset | u32 checksum(CRC32C over body)
//! ```
//!
//! Write-temp-then-rename discipline throughout, via `tempfile`'s
//! `NamedTempFile` + `persist()` so the rename is preceded by an explicit
//! fsync — a plain `std::fs::write` best-effort save is not durable enough
//! to guarantee the crash-recovery invariants a reader depends on.

use crate::chunk::{Chunk, DocEntry, Posting, TermEntry};
use crate::error::CoreError;
use integer_encoding::{VarIntReader, VarIntWriter};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"MNM1";
const VERSION: u32 = 1;
const FOOTER_LEN: usize = 8 + 8 + 4;

/// Serialize `chunk` into the on-disk wire format, returning the full byte
/// buffer (header, doc table, term index, footer).
pub fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(MAGIC);
    body.extend_from_slice(&VERSION.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());

    let doctable_offset = body.len() as u64;
    body.extend_from_slice(&(chunk.docs.len() as u32).to_le_bytes());
    for doc in &chunk.docs {
        body.extend_from_slice(&doc.id.to_le_bytes());
        let path_bytes = doc.path.to_string_lossy().into_owned().into_bytes();
        body.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
        body.extend_from_slice(&path_bytes);
        body.extend_from_slice(&doc.mod_time_unix.to_le_bytes());
        body.extend_from_slice(&doc.length.to_le_bytes());
    }

    let termindex_offset = body.len() as u64;
    body.extend_from_slice(&(chunk.terms.len() as u32).to_le_bytes());
    for (term, entry) in &chunk.terms {
        let term_bytes = term.as_bytes();
        body.extend_from_slice(&(term_bytes.len() as u16).to_le_bytes());
        body.extend_from_slice(term_bytes);
        body.extend_from_slice(&entry.df.to_le_bytes());

        let mut postings_buf: Vec<u8> = Vec::new();
        let mut prev_doc_id: u32 = 0;
        for (i, posting) in entry.postings.iter().enumerate() {
            let delta = if i == 0 { posting.doc_id } else { posting.doc_id - prev_doc_id };
            postings_buf.write_varint(delta).expect("vec write cannot fail");
            postings_buf.write_varint(posting.tf).expect("vec write cannot fail");
            prev_doc_id = posting.doc_id;
        }
        body.extend_from_slice(&(postings_buf.len() as u32).to_le_bytes());
        body.extend_from_slice(&postings_buf);
    }

    let checksum = crc32c::crc32c(&body);
    body.extend_from_slice(&doctable_offset.to_le_bytes());
    body.extend_from_slice(&termindex_offset.to_le_bytes());
    body.extend_from_slice(&checksum.to_le_bytes());
    body
}

/// Parse the wire format back into a `Chunk`, verifying magic, version and
/// CRC32C checksum. Any structural failure is reported as
/// `CoreError::CorruptChunk` carrying `chunk_id` for the caller to log and
/// skip: the chunk is marked corrupt and excluded from query results while
/// the rest of the index remains usable.
pub fn decode_chunk(chunk_id: u32, bytes: &[u8]) -> Result<Chunk, CoreError> {
    let corrupt = |msg: &str| CoreError::CorruptChunk(chunk_id, msg.to_string());

    if bytes.len() < 12 + FOOTER_LEN {
        return Err(corrupt("file too short"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }

    let body_len = bytes.len() - FOOTER_LEN;
    let body = &bytes[..body_len];
    let footer = &bytes[body_len..];
    let doctable_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap()) as usize;
    let termindex_offset = u64::from_le_bytes(footer[8..16].try_into().unwrap()) as usize;
    let expected_checksum = u32::from_le_bytes(footer[16..20].try_into().unwrap());

    let actual_checksum = crc32c::crc32c(body);
    if actual_checksum != expected_checksum {
        return Err(corrupt("checksum mismatch"));
    }
    if doctable_offset != 12 || termindex_offset > body_len {
        return Err(corrupt("bad section offsets"));
    }

    let mut cursor = Cursor::new(body);
    cursor.set_position(doctable_offset as u64);

    let doc_count = read_u32(&mut cursor).map_err(|_| corrupt("truncated doc table"))?;
    let mut docs = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        let id = read_u32(&mut cursor).map_err(|_| corrupt("truncated doc entry"))?;
        let path_len = read_u16(&mut cursor).map_err(|_| corrupt("truncated doc entry"))?;
        let mut path_bytes = vec![0u8; path_len as usize];
        cursor.read_exact(&mut path_bytes).map_err(|_| corrupt("truncated doc path"))?;
        let path_str = String::from_utf8(path_bytes).map_err(|_| corrupt("non-utf8 doc path"))?;
        let mod_time_unix = read_i64(&mut cursor).map_err(|_| corrupt("truncated doc entry"))?;
        let length = read_u32(&mut cursor).map_err(|_| corrupt("truncated doc entry"))?;
        docs.push(DocEntry { id, path: PathBuf::from(path_str), mod_time_unix, length });
    }

    if cursor.position() as usize != termindex_offset {
        return Err(corrupt("doc table / term index boundary mismatch"));
    }

    let term_count = read_u32(&mut cursor).map_err(|_| corrupt("truncated term index"))?;
    let mut terms: BTreeMap<String, TermEntry> = BTreeMap::new();
    for _ in 0..term_count {
        let term_len = read_u16(&mut cursor).map_err(|_| corrupt("truncated term entry"))?;
        let mut term_bytes = vec![0u8; term_len as usize];
        cursor.read_exact(&mut term_bytes).map_err(|_| corrupt("truncated term"))?;
        let term = String::from_utf8(term_bytes).map_err(|_| corrupt("non-utf8 term"))?;
        let df = read_u32(&mut cursor).map_err(|_| corrupt("truncated term entry"))?;
        let postings_len = read_u32(&mut cursor).map_err(|_| corrupt("truncated term entry"))?;

        let start = cursor.position() as usize;
        let end = start + postings_len as usize;
        if end > body.len() {
            return Err(corrupt("postings run past end of file"));
        }
        let mut postings_cursor = Cursor::new(&body[start..end]);
        let mut postings = Vec::new();
        let mut prev_doc_id: u32 = 0;
        let mut first = true;
        while (postings_cursor.position() as usize) < postings_cursor.get_ref().len() {
            let delta: u32 = postings_cursor.read_varint().map_err(|_| corrupt("bad posting varint"))?;
            let tf: u32 = postings_cursor.read_varint().map_err(|_| corrupt("bad posting varint"))?;
            let doc_id = if first { delta } else { prev_doc_id + delta };
            first = false;
            prev_doc_id = doc_id;
            postings.push(Posting { doc_id, tf });
        }
        cursor.set_position(end as u64);

        terms.insert(term, TermEntry { postings, df });
    }

    Ok(Chunk { docs, terms })
}

fn read_u16(c: &mut Cursor<&[u8]>) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    c.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}
fn read_u32(c: &mut Cursor<&[u8]>) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    c.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
fn read_i64(c: &mut Cursor<&[u8]>) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    c.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Write `chunk` to `path` via write-temp-then-rename. The temp file lives
/// alongside `path` so the rename stays on the same filesystem.
pub fn write_chunk(path: &Path, chunk: &Chunk) -> Result<(), CoreError> {
    let bytes = encode_chunk(chunk);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.write_all(&bytes).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.persist(path).map_err(|e| CoreError::IoFatal(e.error.to_string()))?;
    Ok(())
}

/// Load and verify the chunk at `path`. `chunk_id` is used only to label
/// `CorruptChunk` errors.
pub fn load_chunk(chunk_id: u32, path: &Path) -> Result<Chunk, CoreError> {
    let bytes = std::fs::read(path).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    decode_chunk(chunk_id, &bytes)
}
