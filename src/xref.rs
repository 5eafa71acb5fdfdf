//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the PDF file,
//! enabling random access to objects. Supports both traditional xref
//! tables (PDF 1.0-1.4) and cross-reference streams (PDF 1.5+), and
//! follows /Prev pointers through incremental-update chains.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object (traditional)
    Uncompressed,
    /// Entry for an object in an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
///
/// For uncompressed entries `offset` is a byte offset and `generation` a
/// generation number; for compressed entries `offset` is the object stream
/// number and `generation` the index within that stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed) or object stream number (compressed)
    pub offset: u64,
    /// Generation number (uncompressed) or index within stream (compressed)
    pub generation: u16,
    /// Whether the object is in use
    pub in_use: bool,
}

impl XRefEntry {
    /// Create a traditional-format entry from an in-use flag.
    pub fn new(offset: u64, generation: u16, in_use: bool) -> Self {
        Self {
            entry_type: if in_use {
                XRefEntryType::Uncompressed
            } else {
                XRefEntryType::Free
            },
            offset,
            generation,
            in_use,
        }
    }

    /// Create an uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
            in_use: true,
        }
    }

    /// Create a compressed entry (object inside an object stream).
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
            in_use: true,
        }
    }

    /// Create a free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
            in_use: false,
        }
    }
}

/// Cross-reference table mapping object numbers to their locations.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    pub(crate) entries: HashMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams, the stream dictionary)
    trailer: Option<HashMap<String, Object>>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            trailer: None,
        }
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: HashMap<String, Object>) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&HashMap<String, Object>> {
        self.trailer.as_ref()
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Check if an object exists in the xref table.
    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Merge entries from another xref table.
    ///
    /// Entries in self override entries in other; this is the incremental
    /// update rule when following /Prev pointers.
    pub fn merge_from(&mut self, other: CrossRefTable) {
        for (obj_num, entry) in other.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }

        if self.trailer.is_none() && other.trailer.is_some() {
            self.trailer = other.trailer;
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CrossRefTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the byte offset of the xref table by scanning from the end of the file.
///
/// Searches for the last "startxref" keyword in the final 2KB, then
/// extracts the offset on the following line.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut buf = Vec::new();
    reader.take(read_size).read_to_end(&mut buf)?;

    let content = String::from_utf8_lossy(&buf);
    let startxref_pos = content.rfind("startxref").ok_or(Error::InvalidXref)?;
    let after_keyword = &content[startxref_pos + "startxref".len()..];

    // Split manually to handle CR, LF, and CRLF line endings
    for line in split_lines(after_keyword) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed.parse::<u64>().map_err(|_| Error::InvalidXref);
        }
    }

    Err(Error::InvalidXref)
}

/// Parse the cross-reference table at the given byte offset.
///
/// Detects whether this is a traditional xref table or a cross-reference
/// stream and parses accordingly, following /Prev chains.
pub fn parse_xref<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    parse_xref_recursive(reader, offset, 0)
}

fn parse_xref_recursive<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    depth: u32,
) -> Result<CrossRefTable> {
    // Circular /Prev chains must not recurse forever
    if depth > 100 {
        return Err(Error::InvalidPdf("xref /Prev chain depth exceeded 100".to_string()));
    }

    reader.seek(SeekFrom::Start(offset))?;

    let mut peek_buf = [0u8; 20];
    let bytes_read = reader.read(&mut peek_buf)?;
    reader.seek(SeekFrom::Start(offset))?;

    let peek_str = String::from_utf8_lossy(&peek_buf[..bytes_read]);
    let trimmed = peek_str.trim_start();

    log::debug!("Parsing xref at offset {}", offset);

    let mut xref = if trimmed.starts_with("xref") {
        parse_traditional_xref(reader, offset)?
    } else if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        // "N G obj" header means a cross-reference stream
        match parse_xref_stream(reader, offset) {
            Ok(xref) => xref,
            Err(e) => {
                log::debug!("Failed to parse as xref stream: {}", e);
                reader.seek(SeekFrom::Start(offset))?;
                match parse_traditional_xref(reader, offset) {
                    Ok(xref) => xref,
                    Err(trad_err) => {
                        return Err(Error::InvalidPdf(format!(
                            "failed to parse xref (stream attempt: {}, traditional attempt: {})",
                            e, trad_err
                        )));
                    },
                }
            },
        }
    } else {
        return Err(Error::InvalidXref);
    };

    // /Prev points at the previous xref section of an incremental update
    if let Some(prev_offset) = xref
        .trailer()
        .and_then(|t| t.get("Prev"))
        .and_then(|o| o.as_integer())
    {
        log::debug!("Following /Prev pointer to offset {}", prev_offset);
        let prev_xref = parse_xref_recursive(reader, prev_offset as u64, depth + 1)?;
        xref.merge_from(prev_xref);
    }

    Ok(xref)
}

/// Parse a traditional cross-reference table (PDF 1.0-1.4).
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000154 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
///
/// Malformed entry lines become placeholder free entries so object
/// numbering within the subsection stays consistent.
fn parse_traditional_xref<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    reader.seek(SeekFrom::Start(offset))?;

    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    let text = String::from_utf8_lossy(&content);
    let lines = split_lines(&text);

    let mut xref = CrossRefTable::new();
    let mut line_idx = 0;

    // Find "xref" keyword, skipping any leading blank lines
    while line_idx < lines.len() {
        let trimmed = lines[line_idx].trim();
        if trimmed.is_empty() {
            line_idx += 1;
            continue;
        }
        if trimmed.starts_with("xref") {
            line_idx += 1;
            break;
        }
        return Err(Error::InvalidXref);
    }

    // Parse subsections
    while line_idx < lines.len() {
        let trimmed = lines[line_idx].trim();
        line_idx += 1;

        if trimmed.starts_with("trailer") {
            break;
        }
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        // Subsection header: "start_obj count"
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() != 2 {
            continue;
        }

        let start_obj: u32 = parts[0].parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = parts[1].parse().map_err(|_| Error::InvalidXref)?;

        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        let mut i = 0;
        while i < count && line_idx < lines.len() {
            let trimmed = lines[line_idx].trim();
            line_idx += 1;

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with("trailer") {
                log::warn!("Expected {} entries but only found {} before trailer", count, i);
                line_idx -= 1; // let the outer loop see the trailer line
                break;
            }

            // Entry: "nnnnnnnnnn ggggg f/n", tolerating trailing junk
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 3 {
                log::warn!("Malformed xref entry at index {}: {:?}", i, trimmed);
                xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                i += 1;
                continue;
            }

            let offset: u64 = match parts[0].parse() {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("Failed to parse offset at index {}: {:?}", i, parts[0]);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let generation: u16 = match parts[1].parse() {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("Failed to parse generation at index {}: {:?}", i, parts[1]);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let in_use = match parts[2].chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('n') => true,
                Some('f') => false,
                _ => {
                    log::warn!(
                        "Invalid type flag at index {}: {:?}, treating as free",
                        i,
                        parts[2]
                    );
                    false
                },
            };

            xref.add_entry(start_obj + i, XRefEntry::new(offset, generation, in_use));
            i += 1;
        }
    }

    Ok(xref)
}

/// Parse a cross-reference stream (PDF 1.5+).
///
/// A stream object with `/Type /XRef` carrying binary entries. The stream
/// dictionary holds:
/// - `/W [w1 w2 w3]` - field widths in bytes
/// - `/Size` - total number of entries
/// - `/Index [start1 count1 ...]` - optional subsection ranges
///
/// Each entry has three big-endian fields: type (0=free, 1=uncompressed,
/// 2=compressed), offset or stream object number, generation or index
/// within the stream. The stream dictionary doubles as the trailer.
fn parse_xref_stream<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<CrossRefTable> {
    use crate::lexer::{Token, token};

    reader.seek(SeekFrom::Start(offset))?;

    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    let input = &content[..];

    // Indirect object wrapper: "obj_num gen obj"
    let (rest, _obj_num) = token(input)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref object number: {}", e)))?;
    let (rest, _gen) = token(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref generation: {}", e)))?;
    let (rest, obj_keyword) = token(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse 'obj' keyword: {}", e)))?;
    if !matches!(obj_keyword, Token::ObjStart) {
        return Err(Error::InvalidPdf("expected 'obj' keyword in xref stream".to_string()));
    }

    let (_rest, obj) = parse_object(rest)
        .map_err(|e| Error::InvalidPdf(format!("failed to parse xref stream object: {}", e)))?;

    let (stream_dict, stream_data) = match obj {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidPdf("xref stream is not a stream object".to_string())),
    };

    if let Some(type_name) = stream_dict.get("Type").and_then(|o| o.as_name()) {
        if type_name != "XRef" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /XRef, got /Type /{}",
                type_name
            )));
        }
    }

    let w_array = stream_dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?;
    if w_array.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array length".to_string()));
    }

    let field_width = |i: usize| -> Result<usize> {
        w_array[i]
            .as_integer()
            .map(|v| v as usize)
            .ok_or_else(|| Error::InvalidPdf(format!("invalid /W[{}]", i)))
    };
    let w1 = field_width(0)?;
    let w2 = field_width(1)?;
    let w3 = field_width(2)?;
    let entry_size = w1 + w2 + w3;

    let size = stream_dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?
        as u32;

    let index_ranges = if let Some(index_obj) = stream_dict.get("Index") {
        let index_array = index_obj
            .as_array()
            .ok_or_else(|| Error::InvalidPdf("invalid /Index".to_string()))?;

        let mut ranges = Vec::new();
        for pair in index_array.chunks(2) {
            if pair.len() != 2 {
                return Err(Error::InvalidPdf("odd /Index array length".to_string()));
            }
            let start = pair[0]
                .as_integer()
                .ok_or_else(|| Error::InvalidPdf("invalid index start".to_string()))?
                as u32;
            let count = pair[1]
                .as_integer()
                .ok_or_else(|| Error::InvalidPdf("invalid index count".to_string()))?
                as u32;
            ranges.push((start, count));
        }
        ranges
    } else {
        vec![(0, size)]
    };

    // Decode the stream payload. This must not go through the whitespace-
    // trimming convenience path, the binary entry data may begin with
    // bytes that look like PDF whitespace.
    let filters = match stream_dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        Some(_) => return Err(Error::InvalidPdf("invalid /Filter in xref stream".to_string())),
        None => vec![],
    };
    let decode_params = extract_decode_params(stream_dict.get("DecodeParms"));
    let decoded_data =
        crate::decoders::decode_stream_with_params(&stream_data, &filters, decode_params.as_ref())?;

    let mut xref = CrossRefTable::new();
    let mut data_pos = 0;

    for (start_obj, count) in index_ranges {
        for i in 0..count {
            if data_pos + entry_size > decoded_data.len() {
                return Err(Error::InvalidPdf("truncated xref stream data".to_string()));
            }

            let entry_data = &decoded_data[data_pos..data_pos + entry_size];
            data_pos += entry_size;

            // A zero-width type field defaults to type 1
            let entry_type = if w1 > 0 { read_int(&entry_data[0..w1]) } else { 1 };
            let field2 = read_int(&entry_data[w1..w1 + w2]);
            let field3 = read_int(&entry_data[w1 + w2..w1 + w2 + w3]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::uncompressed(field2, field3 as u16),
                2 => XRefEntry::compressed(field2, field3 as u16),
                _ => {
                    return Err(Error::InvalidPdf(format!(
                        "invalid xref entry type: {}",
                        entry_type
                    )));
                },
            };

            xref.add_entry(start_obj + i, entry);
        }
    }

    // For xref streams, the stream dictionary serves as the trailer
    xref.set_trailer(stream_dict);

    Ok(xref)
}

/// Extract predictor parameters from a /DecodeParms entry.
fn extract_decode_params(params_obj: Option<&Object>) -> Option<crate::decoders::DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().filter_map(|o| o.as_dict()).next()?,
        _ => return None,
    };

    Some(crate::decoders::DecodeParams {
        predictor: dict
            .get("Predictor")
            .and_then(|o| o.as_integer())
            .unwrap_or(1),
        columns: dict.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
        colors: dict.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1) as usize,
        bits_per_component: dict
            .get("BitsPerComponent")
            .and_then(|o| o.as_integer())
            .unwrap_or(8) as usize,
    })
}

/// Read a big-endian integer from a byte slice.
fn read_int(bytes: &[u8]) -> u64 {
    let mut result: u64 = 0;
    for &byte in bytes {
        result = (result << 8) | (byte as u64);
    }
    result
}

/// Split a string into lines, handling LF, CRLF, and standalone CR.
///
/// Standard .lines() does not handle Mac-style CR-only line endings,
/// which still occur in PDF files.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\r' => {
                lines.push(std::mem::take(&mut current_line));
                i += 1;
                if i < chars.len() && chars[i] == '\n' {
                    i += 1;
                }
            },
            '\n' => {
                lines.push(std::mem::take(&mut current_line));
                i += 1;
            },
            ch => {
                current_line.push(ch);
                i += 1;
            },
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}
