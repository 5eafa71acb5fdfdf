//! PDF output.
//!
//! Turns a merged object graph back into a well-formed PDF byte stream:
//!
//! ```text
//! MergedDocument
//!     ↓
//! [ObjectSerializer] (objects → PDF syntax)
//!     ↓
//! [file_writer] (header, body, xref table, trailer)
//!     ↓
//! PDF bytes
//! ```

mod file_writer;
mod serializer;

pub use file_writer::{save_document, write_document};
pub use serializer::ObjectSerializer;
