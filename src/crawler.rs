//! Crawler: walks configured root paths, yielding readable text files
//! honoring include/exclude filters and binary-file detection.
//!
//! Built on `ignore::WalkBuilder` with configurable include/exclude-extension
//! and skip-folder knobs, rather than a fixed override list.

use ignore::WalkBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default directory-name blacklist.
pub const DEFAULT_SKIP_FOLDERS: &[&str] = &[
    ".git",
    "node_modules",
    ".vscode",
    ".idea",
    "vendor",
    ".cache",
    "target",
    "build",
];

/// First-N-bytes sample size for binary detection.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;
/// Fraction of bytes that must decode as valid UTF-8 text for a file to be
/// considered text. The exact threshold is a deliberate constant; see
/// DESIGN.md.
const UTF8_DECODE_RATIO_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub roots: Vec<PathBuf>,
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub skip_folders: Vec<String>,
    pub include_hidden: bool,
    /// `0` disables the cap.
    pub max_files_per_folder: usize,
    pub skip_binary_files: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            skip_folders: DEFAULT_SKIP_FOLDERS.iter().map(|s| s.to_string()).collect(),
            include_hidden: false,
            max_files_per_folder: 0,
            skip_binary_files: true,
        }
    }
}

/// A crawled file, ready to be read on demand by the chunk builder.
pub struct CrawlEntry {
    pub path: PathBuf,
    pub mod_time: SystemTime,
}

impl CrawlEntry {
    /// Read the full file contents as a lossy UTF-8 string. Lazy: the
    /// crawler only stats files; actual reads happen when the chunk
    /// builder consumes an entry.
    pub fn read(&self) -> std::io::Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn extension_matches(ext: &Option<String>, list: &[String]) -> bool {
    match ext {
        Some(e) => list.iter().any(|l| l.trim_start_matches('.').eq_ignore_ascii_case(e)),
        None => false,
    }
}

fn is_hidden_component(path: &Path, root: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false)
    })
}

/// Sample the first `BINARY_SNIFF_BYTES` of a file and decide whether it
/// looks like binary content: a NUL byte or a low UTF-8 decode ratio.
fn looks_binary(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return true;
    };
    let mut buf = vec![0u8; BINARY_SNIFF_BYTES];
    let read = match file.read(&mut buf) {
        Ok(n) => n,
        Err(_) => return true,
    };
    let sample = &buf[..read];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0u8) {
        return true;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => false,
        Err(e) => {
            let valid_bytes = e.valid_up_to();
            let ratio = valid_bytes as f64 / sample.len() as f64;
            ratio < UTF8_DECODE_RATIO_THRESHOLD
        }
    }
}

/// Walk every configured root and return the finite sequence of crawl
/// entries honoring every filter in `opts`. Failures reading a single
/// directory entry are skipped, not propagated.
pub fn crawl(opts: &CrawlOptions) -> Vec<CrawlEntry> {
    let mut entries = Vec::new();
    let mut per_folder_count: HashMap<PathBuf, usize> = HashMap::new();

    for root in &opts.roots {
        let mut builder = WalkBuilder::new(root);
        builder.hidden(!opts.include_hidden).standard_filters(false);
        let walker = builder.build();

        for item in walker {
            let dent = match item {
                Ok(d) => d,
                Err(_) => continue,
            };

            let path = dent.path();
            let is_dir = dent.file_type().map(|ft| ft.is_dir()).unwrap_or(false);

            if is_dir {
                if path != root {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        if opts.skip_folders.iter().any(|s| s == name) {
                            continue;
                        }
                    }
                }
                continue;
            }

            if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if path.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| opts.skip_folders.iter().any(|skip| skip == s))
                    .unwrap_or(false)
            }) {
                continue;
            }

            if !opts.include_hidden && is_hidden_component(path, root) {
                continue;
            }

            let ext = extension_of(path);
            if !opts.include_extensions.is_empty() && !extension_matches(&ext, &opts.include_extensions) {
                continue;
            }
            if extension_matches(&ext, &opts.exclude_extensions) {
                continue;
            }

            if opts.max_files_per_folder > 0 {
                let parent = path.parent().unwrap_or(root).to_path_buf();
                let count = per_folder_count.entry(parent).or_insert(0);
                if *count >= opts.max_files_per_folder {
                    continue;
                }
                *count += 1;
            }

            let metadata = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let mod_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            if opts.skip_binary_files && looks_binary(path) {
                continue;
            }

            entries.push(CrawlEntry {
                path: path.to_path_buf(),
                mod_time,
            });
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
