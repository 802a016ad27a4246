//! Source collection and batch ingestion
//!
//! Intake accepts a directory, a zip archive, or a single file. Collection
//! is separated from parsing so the pipeline itself works on plain
//! `SourceFile` values and can be driven from tests (or the zip reader)
//! without touching the filesystem.
//!
//! The batch contract is strict on parse failures and lenient on
//! everything else:
//!
//! * Files that classify as no known table family, and per-episode files
//!   with no extractable episode id, become `Skip` updates. They never
//!   fail a batch; they show up in the summary and the reports.
//! * A classified file whose *content* fails to parse aborts the batch at
//!   that file. Updates from earlier files stay applied (no rollback),
//!   updates from that file onward are never applied. Re-running after a
//!   fix is safe because applies are idempotent.
//!
//! Parsing runs on the rayon pool; applying runs strictly in input order
//! on the caller's thread, which is what makes last-write-wins
//! deterministic when one batch contains the same slot twice.

pub mod classify;
pub mod parse;

use crate::store::{SkipRecord, SkipReason, Store, StoreUpdate};
use classify::{base_name, classify, extract_episode_id, TableKind};
use parse::{parse_basic_stats, parse_csv, ParseError};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use thiserror::Error;

/// One input: a name used for classification/diagnostics and its decoded
/// text content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceFile {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Fatal ingest failure. Everything recoverable is a `Skip`, not an error.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{file}: {source}")]
    Parse { file: String, source: ParseError },
}

/// Counts for one `ingest_batch` call, plus the skips it produced.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files: usize,
    pub applied: usize,
    pub skipped: usize,
    pub skips: Vec<SkipRecord>,
}

fn has_table_extension(name: &str) -> bool {
    let base = base_name(name);
    match base.rsplit('.').next() {
        Some(ext) => ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("json"),
        None => false,
    }
}

// macOS zips ship resource-fork ghosts that classify like real tables.
fn is_archive_junk(name: &str) -> bool {
    name.starts_with("__MACOSX/") || base_name(name).starts_with("._")
}

fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Recursively collect `.csv`/`.json` files under a directory, sorted by
/// path so batches are reproducible. Names are stored relative to `root`.
pub fn collect_dir(root: &Path) -> io::Result<Vec<SourceFile>> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            let path = entry.into_path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(has_table_extension)
                .unwrap_or(false)
            {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        files.push(SourceFile::new(name, read_lossy(&path)?));
    }
    Ok(files)
}

/// Collect `.csv`/`.json` entries from any seekable zip stream, in archive
/// order.
pub fn collect_zip_from<R: Read + Seek>(reader: R) -> io::Result<Vec<SourceFile>> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if is_archive_junk(&name) || !has_table_extension(&name) {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        files.push(SourceFile::new(name, String::from_utf8_lossy(&bytes).into_owned()));
    }
    Ok(files)
}

pub fn collect_zip(path: &Path) -> io::Result<Vec<SourceFile>> {
    collect_zip_from(File::open(path)?)
}

/// Dispatch on what the user pointed at: directory walk, zip expansion, or
/// a single file taken as-is.
pub fn collect_path(path: &Path) -> io::Result<Vec<SourceFile>> {
    let meta = std::fs::metadata(path)?;
    if meta.is_dir() {
        return collect_dir(path);
    }
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if is_zip {
        return collect_zip(path);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(vec![SourceFile::new(name, read_lossy(path)?)])
}

/// Decide what one file contributes to the store.
///
/// Classification or episode-id misses produce `Skip` updates; only a
/// parse failure of a classified file is an error.
pub fn plan_update(file: &SourceFile) -> Result<StoreUpdate, IngestError> {
    let Some(kind) = classify(&file.name) else {
        return Ok(StoreUpdate::Skip {
            filename: file.name.clone(),
            reason: SkipReason::Unrecognized,
        });
    };

    let parse_err = |source: ParseError| IngestError::Parse {
        file: file.name.clone(),
        source,
    };

    if kind == TableKind::EpisodeStats {
        let table = parse_csv(kind, &file.text).map_err(parse_err)?;
        return Ok(StoreUpdate::EpisodeStats { table });
    }

    let Some(episode) = extract_episode_id(&file.name) else {
        return Ok(StoreUpdate::Skip {
            filename: file.name.clone(),
            reason: SkipReason::MissingEpisodeId,
        });
    };

    if kind == TableKind::BasicStats {
        let row = parse_basic_stats(&file.text).map_err(parse_err)?;
        return Ok(StoreUpdate::BasicStats { episode, row });
    }

    let table = parse_csv(kind, &file.text).map_err(parse_err)?;
    Ok(StoreUpdate::EpisodeTable { episode, kind, table })
}

/// Ingest a batch of files into the store.
///
/// All files are parsed in parallel, then their updates are applied in
/// input order. The first parse failure aborts before its own update and
/// before any later file's update; `progress` is called once per file, in
/// input order, as its update lands (or as the batch aborts on it).
pub fn ingest_batch(
    store: &mut Store,
    files: &[SourceFile],
    mut progress: impl FnMut(usize, &str),
) -> Result<BatchSummary, IngestError> {
    let planned: Vec<Result<StoreUpdate, IngestError>> =
        files.par_iter().map(plan_update).collect();

    let mut summary = BatchSummary {
        files: files.len(),
        ..BatchSummary::default()
    };
    for (index, (file, planned)) in files.iter().zip(planned).enumerate() {
        progress(index, &file.name);
        let update = planned?;
        match &update {
            StoreUpdate::Skip { filename, reason } => {
                summary.skipped += 1;
                summary.skips.push(SkipRecord {
                    filename: filename.clone(),
                    reason: reason.clone(),
                });
            }
            _ => summary.applied += 1,
        }
        store.apply(update);
    }
    Ok(summary)
}
