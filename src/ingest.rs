//! Input provider: reads files or directories of VRA exports and turns
//! them into recovered records.
//!
//! CSV is assumed well-formed and goes straight to a tabular reader;
//! everything JSON-shaped goes through the recovery parser. A file that
//! cannot be read or recovered is skipped with a warning, never a crash.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::recover::{RawRecord, recover_records};

/// Declared or inferred content format of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Csv,
    Json,
    Ndjson,
}

const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "json", "ndjson", "gz"];

/// Infers the content format from the file name, peeling a `.gz` suffix.
/// Anything unrecognized is handed to the recovery parser as JSON.
pub fn infer_format(path: &Path) -> FormatHint {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    if name.ends_with(".csv") {
        FormatHint::Csv
    } else if name.ends_with(".ndjson") {
        FormatHint::Ndjson
    } else {
        FormatHint::Json
    }
}

/// Decodes raw bytes into text: strict UTF-8 first (BOM stripped), then a
/// total Latin-1 fallback so legacy exports still read as best-effort text.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut bytes = Vec::new();
    let gzipped = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    if gzipped {
        GzDecoder::new(file)
            .read_to_end(&mut bytes)
            .with_context(|| format!("decompressing {}", path.display()))?;
    } else {
        let mut file = file;
        file.read_to_end(&mut bytes)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    Ok(bytes)
}

fn read_csv(text: &str) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = RawRecord::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), Value::from(field.to_string()));
        }
        records.push(record);
    }
    Ok(records)
}

/// Reads one file into recovered records.
///
/// CSV bypasses the recovery parser; JSON/NDJSON content goes through
/// every recovery strategy. An unrecoverable JSON file yields an empty
/// vec (the warning is logged here), a broken CSV file is an `Err` for
/// the caller to absorb.
pub fn read_file(path: &Path) -> Result<Vec<RawRecord>> {
    let bytes = read_bytes(path)?;
    let text = decode_text(&bytes);
    match infer_format(path) {
        FormatHint::Csv => read_csv(&text),
        FormatHint::Json | FormatHint::Ndjson => {
            let recovery = recover_records(&text);
            for warning in &recovery.warnings {
                warn!(file = %path.display(), %warning, "recovery warning");
            }
            if let Some(strategy) = recovery.strategy {
                debug!(file = %path.display(), ?strategy, records = recovery.records.len(), "file recovered");
            }
            Ok(recovery.records)
        }
    }
}

/// Reads a file, or every supported file in a directory, concatenating
/// all recovered records in file-name order. Per-file failures are
/// logged and skipped; an unreadable top-level path is an error.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    if !path.exists() {
        bail!("input path not found: {}", path.display());
    }
    if !path.is_dir() {
        return read_file(path);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("listing {}", path.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    files.sort();

    let mut all = Vec::new();
    for file in &files {
        match read_file(file) {
            Ok(records) => {
                info!(file = %file.display(), records = records.len(), "file read");
                all.extend(records);
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
            }
        }
    }
    Ok(all)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// `VRA*` files for one year: `VRA_2022*`, `VRA2022*` or `VRA-2022*`,
/// kept only when the digits right after the year read as a month 1..=12,
/// sorted and deduplicated by file name.
pub fn vra_files_for_year(data_dir: &Path, year: i32) -> Result<Vec<PathBuf>> {
    let month_check = Regex::new(&format!(r"{year}(\d{{1,2}})")).unwrap();
    let prefixes = [
        format!("VRA_{year}"),
        format!("VRA{year}"),
        format!("VRA-{year}"),
    ];

    let mut found: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("listing {}", data_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = file_name(p);
            prefixes.iter().any(|prefix| name.starts_with(prefix))
        })
        .filter(|p| {
            month_check
                .captures(&file_name(p))
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .is_some_and(|month| (1..=12).contains(&month))
        })
        .collect();

    found.sort_by_key(|p| file_name(p));
    found.dedup_by_key(|p| file_name(p));
    Ok(found)
}

/// Every `VRA*` file in the directory, sorted by file name.
pub fn vra_files_all(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("listing {}", data_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && file_name(p).starts_with("VRA"))
        .collect();
    found.sort_by_key(|p| file_name(p));
    Ok(found)
}
