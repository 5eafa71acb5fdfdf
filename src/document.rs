//! PDF document model.
//!
//! A [`Document`] holds the full file in memory together with its parsed
//! cross-reference table and trailer, and loads indirect objects on demand
//! through an object cache.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Object, ObjectRef};
use crate::parser::parse_object;
use crate::xref::{CrossRefTable, XRefEntryType, find_xref_offset, parse_xref};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Maximum recursion depth for object resolution
const MAX_RECURSION_DEPTH: u32 = 100;

/// An open PDF document.
///
/// Provides access to the version, trailer, and indirect objects. Objects
/// are parsed lazily and cached; reference cycles and excessive resolution
/// depth are detected and reported as errors.
pub struct Document {
    reader: Cursor<Vec<u8>>,
    /// PDF version (major, minor)
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: Object,
    object_cache: HashMap<ObjectRef, Object>,
    /// Objects currently being resolved, for cycle detection
    resolving_stack: RefCell<HashSet<ObjectRef>>,
    recursion_depth: RefCell<u32>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Open a PDF document from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Open a PDF document from an in-memory byte buffer.
    ///
    /// Parses the header, locates and parses the cross-reference table
    /// (following /Prev chains), and reads the trailer dictionary.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut reader = Cursor::new(data);

        let version = parse_header(&mut reader)?;

        let xref_offset = find_xref_offset(&mut reader)?;
        let xref = parse_xref(&mut reader, xref_offset)?;

        let trailer = if let Some(trailer_dict) = xref.trailer() {
            // Xref stream: the stream dictionary doubles as the trailer
            Object::Dictionary(trailer_dict.clone())
        } else {
            reader.seek(SeekFrom::Start(xref_offset))?;
            parse_trailer(&mut reader)?
        };

        Ok(Self {
            reader,
            version,
            xref,
            trailer,
            object_cache: HashMap::new(),
            resolving_stack: RefCell::new(HashSet::new()),
            recursion_depth: RefCell::new(0),
        })
    }

    /// PDF version as (major, minor), e.g. (1, 7) for PDF 1.7.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The trailer dictionary (/Root, /Size, /Info, ...).
    pub fn trailer(&self) -> &Object {
        &self.trailer
    }

    /// Load an indirect object by reference.
    ///
    /// Checks the cache first, then looks the object up in the xref table.
    /// Objects missing from the xref are searched for by scanning the file,
    /// some generators emit incomplete tables.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        log::debug!("Loading object {}", obj_ref);

        if *self.recursion_depth.borrow() >= MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_RECURSION_DEPTH));
        }
        if self.resolving_stack.borrow().contains(&obj_ref) {
            log::error!("Circular reference detected for object {}", obj_ref);
            return Err(Error::CircularReference(obj_ref));
        }
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        let entry = match self.xref.get(obj_ref.id) {
            Some(entry) if entry.in_use => entry.clone(),
            other => {
                if other.is_some() {
                    log::warn!("Object {} is marked free in the xref table", obj_ref.id);
                } else {
                    log::warn!(
                        "Object {} not in xref table ({} entries), scanning file",
                        obj_ref.id,
                        self.xref.len()
                    );
                }
                let offset = self
                    .scan_for_object(obj_ref)
                    .map_err(|_| Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
                return self.with_resolution_guard(obj_ref, |doc| {
                    doc.load_uncompressed_object(obj_ref, offset)
                });
            },
        };

        self.with_resolution_guard(obj_ref, |doc| match entry.entry_type {
            XRefEntryType::Uncompressed => doc.load_uncompressed_object(obj_ref, entry.offset),
            XRefEntryType::Compressed => {
                doc.load_compressed_object(obj_ref, entry.offset as u32)
            },
            XRefEntryType::Free => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        })
    }

    /// Dereference an object if it is an indirect reference.
    ///
    /// Non-reference objects are returned as a clone.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(obj_ref) => self.load_object(*obj_ref),
            other => Ok(other.clone()),
        }
    }

    /// Get the document catalog (the object the trailer's /Root points at).
    pub fn catalog(&mut self) -> Result<Object> {
        let root_ref = self
            .trailer
            .as_dict()
            .and_then(|d| d.get("Root"))
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::MissingRoot("trailer has no /Root reference".to_string()))?;

        self.load_object(root_ref)
    }

    /// Get the reference to the page tree root (the catalog's /Pages entry).
    pub fn page_tree_root(&mut self) -> Result<ObjectRef> {
        let catalog = self.catalog()?;
        catalog
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(|o| o.as_reference())
            .ok_or_else(|| {
                Error::BrokenPageTree("catalog has no /Pages reference".to_string())
            })
    }

    /// Extract all pages in document order with inherited attributes applied.
    pub fn pages(&mut self) -> Result<Vec<crate::pages::Page>> {
        crate::pages::extract_pages(self)
    }

    fn with_resolution_guard<F>(&mut self, obj_ref: ObjectRef, f: F) -> Result<Object>
    where
        F: FnOnce(&mut Self) -> Result<Object>,
    {
        self.resolving_stack.borrow_mut().insert(obj_ref);
        *self.recursion_depth.borrow_mut() += 1;

        let result = f(self);

        *self.recursion_depth.borrow_mut() -= 1;
        self.resolving_stack.borrow_mut().remove(&obj_ref);

        result
    }

    /// Load a traditional uncompressed object at a byte offset.
    ///
    /// Objects whose body fails to parse become Null placeholders so one
    /// corrupt object does not take down the rest of the file.
    fn load_uncompressed_object(&mut self, obj_ref: ObjectRef, offset: u64) -> Result<Object> {
        let obj = {
            let data = self.reader.get_ref();
            let offset = offset as usize;
            if offset >= data.len() {
                return Err(Error::UnexpectedEof);
            }
            let input = &data[offset..];

            // Header: "N G obj"
            let (rest, num_tok) = token(input).map_err(|_| Error::ParseError {
                offset,
                reason: "expected object number".to_string(),
            })?;
            let (rest, gen_tok) = token(rest).map_err(|_| Error::ParseError {
                offset,
                reason: "expected generation number".to_string(),
            })?;
            let (rest, obj_tok) = token(rest).map_err(|_| Error::ParseError {
                offset,
                reason: "expected 'obj' keyword".to_string(),
            })?;

            match (num_tok, gen_tok, obj_tok) {
                (Token::Integer(num), Token::Integer(gen), Token::ObjStart) => {
                    if num != obj_ref.id as i64 || gen != obj_ref.gen as i64 {
                        log::warn!(
                            "Object header mismatch at offset {}: expected {}, found {} {} obj",
                            offset,
                            obj_ref,
                            num,
                            gen
                        );
                    }
                },
                _ => {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("malformed object header for {}", obj_ref),
                    });
                },
            }

            match parse_object(rest) {
                Ok((_rest, obj)) => obj,
                Err(e) => {
                    log::warn!(
                        "Object {} at offset {} failed to parse ({:?}), using Null placeholder",
                        obj_ref,
                        offset,
                        e
                    );
                    Object::Null
                },
            }
        };

        self.object_cache.insert(obj_ref, obj.clone());
        Ok(obj)
    }

    /// Load an object stored inside an object stream (type 2 xref entry).
    ///
    /// All objects in the stream are parsed and cached in one pass.
    fn load_compressed_object(&mut self, obj_ref: ObjectRef, stream_obj_num: u32) -> Result<Object> {
        let stream_entry = self
            .xref
            .get(stream_obj_num)
            .ok_or(Error::ObjectNotFound(stream_obj_num, 0))?;
        if stream_entry.entry_type != XRefEntryType::Uncompressed {
            return Err(Error::InvalidPdf(format!(
                "object stream {} is not an uncompressed object",
                stream_obj_num
            )));
        }
        let stream_offset = stream_entry.offset;

        let stream_ref = ObjectRef::new(stream_obj_num, 0);
        let stream_obj = self.load_uncompressed_object(stream_ref, stream_offset)?;

        let objects = crate::objstm::parse_object_stream(&stream_obj)?;

        let obj = objects
            .get(&obj_ref.id)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?
            .clone();

        for (obj_num, object) in objects {
            self.object_cache.insert(ObjectRef::new(obj_num, 0), object);
        }

        Ok(obj)
    }

    /// Scan the raw file for an "N G obj" header.
    ///
    /// Fallback for objects the xref table is missing or mislabels.
    fn scan_for_object(&self, obj_ref: ObjectRef) -> Result<u64> {
        let content = self.reader.get_ref();
        let pattern = format!("{} {} obj", obj_ref.id, obj_ref.gen);
        let pattern_bytes = pattern.as_bytes();

        let mut pos = 0;
        while pos + pattern_bytes.len() <= content.len() {
            let found = match content[pos..]
                .windows(pattern_bytes.len())
                .position(|w| w == pattern_bytes)
            {
                Some(rel) => pos + rel,
                None => break,
            };

            // Must sit at a line boundary and be followed by a delimiter,
            // "12 0 obj" must not match inside "112 0 obj"
            let valid_start =
                found == 0 || matches!(content[found - 1], b'\n' | b'\r');
            let end = found + pattern_bytes.len();
            let valid_end = end >= content.len()
                || matches!(content[end], b'\n' | b'\r' | b' ' | b'\t' | b'<');

            if valid_start && valid_end {
                log::info!("Found object {} at offset {} by file scan", obj_ref, found);
                return Ok(found as u64);
            }
            pos = found + 1;
        }

        Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }
}

/// Parse the PDF header (`%PDF-M.m`).
///
/// Accepts versions 1.0 through 2.0.
pub fn parse_header<R: Read + Seek>(reader: &mut R) -> Result<(u8, u8)> {
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .map_err(|_| Error::InvalidHeader("file too short to contain PDF header".to_string()))?;

    if &header[0..5] != b"%PDF-" {
        return Err(Error::InvalidHeader(format!(
            "expected '%PDF-', found '{}'",
            String::from_utf8_lossy(&header[0..5])
        )));
    }

    if header[6] != b'.' || !header[5].is_ascii_digit() || !header[7].is_ascii_digit() {
        return Err(Error::InvalidHeader(format!(
            "invalid version '{}'",
            String::from_utf8_lossy(&header[5..8])
        )));
    }

    let major = header[5] - b'0';
    let minor = header[7] - b'0';

    if major > 2 || major == 0 || (major == 2 && minor > 0) {
        return Err(Error::UnsupportedVersion(format!("{}.{}", major, minor)));
    }

    Ok((major, minor))
}

/// Parse the trailer dictionary following a traditional xref table.
///
/// The reader should be positioned at the start of the xref section; the
/// trailer is the dictionary after the "trailer" keyword.
pub fn parse_trailer<R: Read>(reader: &mut R) -> Result<Object> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    let content = String::from_utf8_lossy(&buffer);
    let trailer_pos = content
        .find("trailer")
        .ok_or_else(|| Error::InvalidPdf("trailer keyword not found after xref table".to_string()))?;

    let dict_start = trailer_pos + "trailer".len();
    if dict_start >= buffer.len() {
        return Err(Error::UnexpectedEof);
    }

    let (_, trailer_dict) = parse_object(&buffer[dict_start..]).map_err(|e| Error::ParseError {
        offset: dict_start,
        reason: format!("failed to parse trailer dictionary: {:?}", e),
    })?;

    if trailer_dict.as_dict().is_none() {
        return Err(Error::InvalidPdf("trailer is not a dictionary".to_string()));
    }

    Ok(trailer_dict)
}
