//! Merge invocation options.
//!
//! The JSON-friendly option surface callers hand to [`merge_files`]:
//! an ordered list of source files, an optional output path, and the
//! preferred return format.

use crate::error::{Error, Result};
use crate::merge::{MergeSource, merge_sources};
use crate::writer::write_document;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the merged document is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Write the file to disk and return its path
    #[default]
    Path,
    /// Return the file contents as a Base64 string
    Base64,
}

/// Options for one merge invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Source files in merge order; `file://` URIs are accepted
    pub files: Vec<String>,
    /// Destination path; a generated temporary path when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Result format, defaults to "path"
    #[serde(default)]
    pub return_type: ReturnType,
}

impl MergeOptions {
    /// Options merging the given files with all defaults.
    pub fn new(files: Vec<String>) -> Self {
        Self {
            files,
            output_path: None,
            return_type: ReturnType::default(),
        }
    }
}

/// Result of a merge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutput {
    /// The merged file was written here
    Path(PathBuf),
    /// Base64 of the merged file contents
    Base64(String),
}

/// Merge the files named in `options` and deliver the result.
///
/// Unreadable files are logged and skipped, matching the merge engine's
/// per-source policy. An empty file list is rejected up front; a merge
/// that yields no pages at all surfaces [`Error::NoValidPages`].
pub fn merge_files(options: &MergeOptions) -> Result<MergeOutput> {
    if options.files.is_empty() {
        return Err(Error::NoFiles);
    }

    let mut sources = Vec::with_capacity(options.files.len());
    for file in &options.files {
        let path = strip_file_scheme(file);
        match std::fs::read(path) {
            Ok(data) => sources.push(MergeSource::all(data)),
            Err(e) => {
                log::error!("Skipping unreadable file {}: {}", file, e);
            },
        }
    }

    let merged = merge_sources(sources)?;
    let bytes = write_document(&merged)?;
    log::info!("Merged {} pages into {} bytes", merged.page_count, bytes.len());

    match options.return_type {
        ReturnType::Path => {
            let path = options
                .output_path
                .clone()
                .unwrap_or_else(default_output_path);
            std::fs::write(&path, &bytes)?;
            Ok(MergeOutput::Path(path))
        },
        ReturnType::Base64 => Ok(MergeOutput::Base64(BASE64.encode(&bytes))),
    }
}

/// Strip a `file://` scheme prefix if present.
fn strip_file_scheme(file: &str) -> &Path {
    Path::new(file.strip_prefix("file://").unwrap_or(file))
}

/// A unique path in the system temporary directory.
fn default_output_path() -> PathBuf {
    std::env::temp_dir().join(format!("merged_{}.pdf", uuid::Uuid::new_v4()))
}
