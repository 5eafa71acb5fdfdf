//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) pack multiple non-stream objects into a
//! single compressed stream. The decoded payload has two parts: `/N` pairs
//! of integers (object number, byte offset relative to `/First`), followed
//! by the serialized objects themselves.
//!
//! ```text
//! << /Type /ObjStm /N 3 /First 18 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15 12 28
//! <obj 10> <obj 11> <obj 12>
//! endstream
//! ```

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse an object stream and extract all objects it contains.
///
/// Returns a map from object number to parsed object. Individual objects
/// that fail to parse are skipped with a warning; structural problems
/// (missing /N or /First, truncated data) are errors.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let (dict, data) = match stream_obj {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(|o| o.as_name()) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=1_000_000).contains(&n) {
        return Err(Error::InvalidPdf(format!("invalid object stream /N value: {}", n)));
    }
    if !(0..=10_000_000).contains(&first) {
        return Err(Error::InvalidPdf(format!("invalid object stream /First value: {}", first)));
    }

    let n = n as usize;
    let first = first as usize;

    // Decode without the leading-whitespace trim, /First offsets are
    // relative to the raw decoded payload.
    let filters = match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        Some(_) => {
            return Err(Error::InvalidPdf("invalid /Filter in object stream".to_string()));
        },
        None => vec![],
    };
    let decoded = crate::decoders::decode_stream(data, &filters)?;

    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n)?;
    let objects_data = &decoded[first..];

    let mut result = HashMap::new();
    for (obj_num, offset) in pairs {
        if offset >= objects_data.len() {
            log::warn!(
                "Object {} offset {} is beyond stream data length {}",
                obj_num,
                offset,
                objects_data.len()
            );
            continue;
        }

        match parse_object(&objects_data[offset..]) {
            Ok((_rest, obj)) => {
                result.insert(obj_num, obj);
            },
            Err(e) => {
                log::warn!("Failed to parse object {} at stream offset {}: {:?}", obj_num, offset, e);
            },
        }
    }

    Ok(result)
}

/// Parse the `/N` (object number, offset) integer pairs that head the
/// decoded payload.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = data;

    for i in 0..count {
        let (rest, obj_num) = next_integer(remaining).ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("failed to parse object number for pair {}", i),
        })?;
        let (rest, offset) = next_integer(rest).ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("failed to parse offset for pair {}", i),
        })?;

        if obj_num < 0 || offset < 0 {
            return Err(Error::ParseError {
                offset: 0,
                reason: format!("negative value in object stream pair {}", i),
            });
        }

        pairs.push((obj_num as u32, offset as usize));
        remaining = rest;
    }

    Ok(pairs)
}

fn next_integer(input: &[u8]) -> Option<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(v))) => Some((rest, v)),
        _ => None,
    }
}
