//! PDF object parser.
//!
//! Combines tokens from the lexer into complete objects (arrays,
//! dictionaries, streams, indirect references) by recursive descent.
//!
//! Parsing is lenient where it pays off against files in the wild: an
//! unclosed array or dictionary at end of input yields the partial object,
//! and stream extraction falls back to scanning for `endstream` when the
//! /Length entry is missing or wrong.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Object, ObjectRef};
use nom::IResult;
use std::collections::HashMap;

/// Decode escape sequences in PDF literal strings.
///
/// Per ISO 32000-1:2008, Section 7.3.4.2: `\n \r \t \b \f \( \) \\`,
/// `\ddd` octal (1-3 digits), and `\<newline>` line continuation. Unknown
/// escapes keep the backslash literal.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(8);
                    i += 2;
                },
                b'f' => {
                    result.push(12);
                    i += 2;
                },
                b'(' => {
                    result.push(b'(');
                    i += 2;
                },
                b')' => {
                    result.push(b')');
                    i += 2;
                },
                b'\\' => {
                    result.push(b'\\');
                    i += 2;
                },
                // Line continuation: \<newline> is ignored
                b'\n' => {
                    i += 2;
                },
                b'\r' => {
                    // Handle \r or \r\n
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                // Octal escape: \ddd (1-3 octal digits)
                c if c.is_ascii_digit() && c < b'8' => {
                    let start = i + 1;
                    let mut octal_value = 0u32;
                    let mut octal_len = 0;

                    for j in 0..3 {
                        match raw.get(start + j) {
                            Some(&digit) if (b'0'..b'8').contains(&digit) => {
                                octal_value = octal_value * 8 + (digit - b'0') as u32;
                                octal_len += 1;
                            },
                            _ => break,
                        }
                    }

                    // Octal value must fit in a byte
                    result.push((octal_value & 0xFF) as u8);
                    i += 1 + octal_len;
                },
                // Unknown escape: keep backslash literal
                _ => {
                    result.push(b'\\');
                    i += 1;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Parse a PDF object from input bytes.
///
/// This is the main entry point for parsing PDF objects. Handles all
/// object types: null, booleans, numbers, strings, names, arrays,
/// dictionaries, streams, and indirect references (10 0 R).
///
/// # Errors
///
/// Returns `Err` if the input does not start with a valid object or a hex
/// string contains invalid digits.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // Could be a plain integer OR the start of an indirect
            // reference (obj_num gen R). Look ahead for "gen R".
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    return Ok((input3, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }

            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => {
            let decoded = decode_literal_string_escapes(bytes);
            Ok((input, Object::String(decoded)))
        },

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => {
                Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Fail)))
            },
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict_obj) = parse_dictionary(input)?;

            // A dictionary followed by the 'stream' keyword is a stream object
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let dict = match dict_obj {
                    Object::Dictionary(d) => d,
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            input,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                };

                let (final_input, stream_data) = parse_stream_data(stream_input, &dict)?;

                return Ok((
                    final_input,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(stream_data),
                    },
                ));
            }

            Ok((remaining, dict_obj))
        },

        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse stream data after the `stream` keyword.
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.8.1. The keyword must be
/// followed by CRLF or LF (CR alone is a spec violation we accept with a
/// warning). /Length gives the byte count; when it is missing or invalid
/// we fall back to scanning for `endstream`.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &HashMap<String, Object>,
) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") {
        &input[1..]
    } else if input.starts_with(b"\r") {
        log::warn!("stream keyword followed by CR alone, accepting in lenient mode");
        &input[1..]
    } else {
        log::warn!("no newline after stream keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(|obj| obj.as_integer()) {
        let length = length as usize;
        if input.len() >= length {
            let stream_data = input[..length].to_vec();
            let remaining = &input[length..];

            // Skip whitespace and consume 'endstream'
            let (remaining, _) =
                nom::bytes::complete::take_while(|c: u8| c.is_ascii_whitespace())(remaining)?;
            if let Ok((remaining, Token::StreamEnd)) = token(remaining) {
                return Ok((remaining, stream_data));
            }
            // /Length did not land on endstream, fall through to the scan
        }
    }

    // Fallback: scan for the 'endstream' keyword. Less reliable, but many
    // files in the wild carry a missing or wrong /Length.
    if let Some(pos) = find_endstream(input) {
        let stream_data = input[..pos].to_vec();
        let remaining = &input[pos..];
        let (remaining, _) = token(remaining)?;

        return Ok((remaining, stream_data));
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))
}

/// Find the position of the 'endstream' keyword in input.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input
        .windows(keyword.len())
        .position(|window| window == keyword)
}

/// Parse a PDF array: `[ obj1 obj2 ... objN ]`
///
/// An array hitting end of input before `]` is returned as-is (lenient).
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((inp, tok)) => {
                if tok == Token::ArrayEnd {
                    return Ok((inp, Object::Array(objects)));
                }

                // Re-parse from remaining so parse_object sees the token
                match parse_object(remaining) {
                    Ok((inp, obj)) => {
                        objects.push(obj);
                        remaining = inp;
                    },
                    Err(e) => {
                        if remaining.is_empty() {
                            // Unclosed array at EOF, return what we have
                            return Ok((remaining, Object::Array(objects)));
                        }
                        return Err(e);
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse a PDF dictionary: `<< /Key1 value1 /Key2 value2 ... >>`
///
/// Keys must be names. A dictionary hitting end of input before `>>` is
/// returned as-is (lenient).
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = HashMap::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((inp, tok)) => {
                if tok == Token::DictEnd {
                    return Ok((inp, Object::Dictionary(dict)));
                }

                match tok {
                    Token::Name(key) => match parse_object(inp) {
                        Ok((inp, value)) => {
                            dict.insert(key, value);
                            remaining = inp;
                        },
                        Err(e) => {
                            if inp.is_empty() {
                                return Ok((inp, Object::Dictionary(dict)));
                            }
                            return Err(e);
                        },
                    },
                    _ => {
                        if remaining.is_empty() {
                            return Ok((remaining, Object::Dictionary(dict)));
                        }
                        // Key must be a name
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Tag,
                        )));
                    },
                }
            },
            Err(nom::Err::Incomplete(_)) | Err(nom::Err::Error(_)) if remaining.is_empty() => {
                return Ok((remaining, Object::Dictionary(dict)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored. An odd number of hex digits is padded with a
/// trailing 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let hex_str: Vec<u8> = hex_bytes
        .iter()
        .filter(|&&c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    if hex_str.is_empty() {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(hex_str.len() / 2 + 1);

    for chunk in hex_str.chunks(2) {
        let hi = hex_digit(chunk[0])?;
        let lo = if chunk.len() == 2 { hex_digit(chunk[1])? } else { 0 };
        result.push((hi << 4) | lo);
    }

    Ok(result)
}

fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::ParseError {
            offset: 0,
            reason: format!("Invalid hex digit: {}", c as char),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"false").unwrap().1, Object::Boolean(false));
        assert_eq!(parse_object(b"42").unwrap().1, Object::Integer(42));
        assert_eq!(parse_object(b"-123").unwrap().1, Object::Integer(-123));
        assert_eq!(parse_object(b"/Type").unwrap().1, Object::Name("Type".to_string()));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_parse_real() {
        assert_eq!(parse_object(b"3.14").unwrap().1, Object::Real(3.14));
    }

    #[test]
    fn test_parse_literal_string() {
        let (remaining, obj) = parse_object(b"(Hello World)").unwrap();
        assert_eq!(remaining, &b""[..]);
        assert_eq!(obj, Object::String(b"Hello World".to_vec()));
    }

    #[test]
    fn test_escape_sequences() {
        let (_, obj) = parse_object(b"(Line1\\nLine2)").unwrap();
        assert_eq!(obj, Object::String(b"Line1\nLine2".to_vec()));

        let (_, obj) = parse_object(b"(Open \\( Close \\))").unwrap();
        assert_eq!(obj, Object::String(b"Open ( Close )".to_vec()));

        let (_, obj) = parse_object(b"(Path\\\\to\\\\file)").unwrap();
        assert_eq!(obj, Object::String(b"Path\\to\\file".to_vec()));
    }

    #[test]
    fn test_escape_sequence_octal() {
        // \247 = 0xA7 (section sign)
        let (_, obj) = parse_object(b"(Section \\247)").unwrap();
        assert_eq!(obj, Object::String(b"Section \xa7".to_vec()));

        // \53 = 0x2B = '+'
        let (_, obj) = parse_object(b"(Plus \\53)").unwrap();
        assert_eq!(obj, Object::String(b"Plus +".to_vec()));

        // \128 = \12 (octal, newline) followed by literal '8'
        let (_, obj) = parse_object(b"(Value \\128)").unwrap();
        assert_eq!(obj, Object::String(b"Value \n8".to_vec()));
    }

    #[test]
    fn test_escape_sequence_line_continuation() {
        let (_, obj) = parse_object(b"(This is a long \\\nstring)").unwrap();
        assert_eq!(obj, Object::String(b"This is a long string".to_vec()));
    }

    #[test]
    fn test_decode_literal_string_escapes_directly() {
        assert_eq!(decode_literal_string_escapes(b"Hello"), b"Hello");
        assert_eq!(decode_literal_string_escapes(b"\\n"), b"\n");
        assert_eq!(decode_literal_string_escapes(b"\\247"), b"\xa7");
        assert_eq!(decode_literal_string_escapes(b"\\(\\)"), b"()");
        assert_eq!(decode_literal_string_escapes(b"\\\\"), b"\\");
    }

    #[test]
    fn test_parse_hex_string() {
        let (_, obj) = parse_object(b"<48656C6C6F>").unwrap();
        assert_eq!(obj, Object::String(b"Hello".to_vec()));

        let (_, obj) = parse_object(b"<48 65 6C 6C 6F>").unwrap();
        assert_eq!(obj, Object::String(b"Hello".to_vec()));
    }

    #[test]
    fn test_parse_hex_string_odd_length() {
        // Last digit padded with 0
        let (_, obj) = parse_object(b"<ABC>").unwrap();
        assert_eq!(obj, Object::String(vec![0xAB, 0xC0]));
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
        assert_eq!(decode_hex(b"").unwrap(), b"");
        assert_eq!(decode_hex(b"ABC").unwrap(), vec![0xAB, 0xC0]);
        assert!(decode_hex(b"XY").is_err());
    }

    #[test]
    fn test_parse_indirect_reference() {
        let (_, obj) = parse_object(b"10 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(10, 0)));

        let (_, obj) = parse_object(b"42 5 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(42, 5)));
    }

    #[test]
    fn test_parse_integer_not_reference() {
        // Just "10" without "0 R" parses as integer
        let (_, obj) = parse_object(b"10").unwrap();
        assert_eq!(obj, Object::Integer(10));
    }

    #[test]
    fn test_parse_arrays() {
        let (_, obj) = parse_object(b"[]").unwrap();
        assert_eq!(obj, Object::Array(vec![]));

        let (_, obj) = parse_object(b"[ 1 [ 2 3 ] 4 ]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(2), Object::Integer(3)]),
                Object::Integer(4),
            ])
        );
    }

    #[test]
    fn test_parse_array_with_references() {
        let (_, obj) = parse_object(b"[ 10 0 R 20 0 R ]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Reference(ObjectRef::new(10, 0)),
                Object::Reference(ObjectRef::new(20, 0)),
            ])
        );
    }

    #[test]
    fn test_parse_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Page /Count 3 /Title (My Page) >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Page"));
        assert_eq!(dict.get("Count").unwrap().as_integer(), Some(3));
        assert_eq!(dict.get("Title").unwrap().as_string(), Some(&b"My Page"[..]));
    }

    #[test]
    fn test_parse_dictionary_with_array_and_reference() {
        let (_, obj) = parse_object(b"<< /MediaBox [ 0 0 612 792 ] /Parent 2 0 R >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("MediaBox").unwrap().as_array().unwrap().len(), 4);
        assert_eq!(dict.get("Parent").unwrap().as_reference(), Some(ObjectRef::new(2, 0)));
    }

    #[test]
    fn test_parse_nested_dictionaries() {
        let (_, obj) = parse_object(b"<< /Outer << /Inner /Value >> >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let inner = dict.get("Outer").unwrap().as_dict().unwrap();
        assert_eq!(inner.get("Inner").unwrap().as_name(), Some("Value"));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { dict, data } => {
                assert_eq!(dict.get("Length").unwrap().as_integer(), Some(5));
                assert_eq!(&data[..], b"Hello");
            },
            _ => panic!("Expected stream object"),
        }
    }

    #[test]
    fn test_parse_stream_without_length_scans_for_endstream() {
        let input = b"<< /Type /XObject >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => {
                // Scan fallback includes the trailing EOL before endstream
                assert_eq!(&data[..], b"Hello\n");
            },
            _ => panic!("Expected stream object"),
        }
    }

    #[test]
    fn test_parse_unclosed_array() {
        // Lenient parsing: unclosed arrays return what they have
        let (_, obj) = parse_object(b"[ 1 2 3").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_parse_unclosed_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Page").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").and_then(|o| o.as_name()), Some("Page"));
    }

    #[test]
    fn test_parse_dictionary_non_name_key() {
        assert!(parse_object(b"<< 123 /Value >>").is_err());
    }

    #[test]
    fn test_parse_with_extra_whitespace() {
        let (_, obj) = parse_object(b"  \n\t  42").unwrap();
        assert_eq!(obj, Object::Integer(42));

        let (_, obj) = parse_object(b"[  1   2    3  ]").unwrap();
        assert_eq!(obj.as_array().unwrap().len(), 3);
    }
}
