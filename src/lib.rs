#![allow(clippy::match_like_matches_macro)]
#![cfg_attr(test, allow(dead_code))]

//! # mergepdf
//!
//! A standalone PDF merge engine: parses source PDFs into an object graph,
//! walks their page trees, copies the selected pages into a freshly
//! numbered output document, and serializes the result.
//!
//! ## Pipeline
//!
//! parse ([`document`]) → extract ([`pages`]) → copy ([`merge`]) →
//! serialize ([`writer`])
//!
//! Supports both classic xref tables and cross-reference streams
//! (including object streams), FlateDecode / ASCIIHexDecode /
//! RunLengthDecode filters with PNG and TIFF predictors, and the page
//! attribute inheritance rules of ISO 32000-1 section 7.7.3.3.
//!
//! Bad inputs degrade gracefully: an unreadable source file or an
//! uncopyable page is logged and skipped; only a merge producing zero
//! pages fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mergepdf::{MergeOptions, merge_files};
//!
//! # fn main() -> Result<(), mergepdf::Error> {
//! let options = MergeOptions::new(vec![
//!     "first.pdf".to_string(),
//!     "second.pdf".to_string(),
//! ]);
//! let output = merge_files(&options)?;
//! println!("{:?}", output);
//! # Ok(())
//! # }
//! ```
//!
//! For in-memory use, feed raw bytes straight into the engine:
//!
//! ```no_run
//! use mergepdf::merge::{MergeSource, PageRange, merge_sources};
//! use mergepdf::writer::write_document;
//!
//! # fn main() -> Result<(), mergepdf::Error> {
//! # let (first, second) = (vec![], vec![]);
//! let merged = merge_sources(vec![
//!     MergeSource::all(first),
//!     MergeSource::with_range(second, PageRange::new(2, 3)?),
//! ])?;
//! let bytes = write_document(&merged)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Page extraction and merging
pub mod merge;
pub mod pages;

// Output
pub mod writer;

// Caller-facing option surface
pub mod options;

pub use document::Document;
pub use error::{Error, Result};
pub use merge::{MergeSource, Merger, PageRange, merge_sources};
pub use object::{Object, ObjectRef};
pub use options::{MergeOptions, MergeOutput, ReturnType, merge_files};
pub use pages::Page;
