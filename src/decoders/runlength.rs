//! RunLengthDecode implementation.
//!
//! Per the PDF spec:
//! - Length byte 0-127: copy next N+1 bytes literally
//! - Length byte 128: EOD marker
//! - Length byte 129-255: repeat next byte 257-N times

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut i = 0;

        while i < input.len() {
            let length = input[i];
            i += 1;

            match length {
                0..=127 => {
                    let count = length as usize + 1;
                    if i + count > input.len() {
                        return Err(Error::Decode(format!(
                            "RunLengthDecode: not enough data for literal run (need {}, have {})",
                            count,
                            input.len() - i
                        )));
                    }
                    output.extend_from_slice(&input[i..i + count]);
                    i += count;
                },
                128 => break, // EOD
                129..=255 => {
                    let count = 257 - length as usize;
                    if i >= input.len() {
                        return Err(Error::Decode(
                            "RunLengthDecode: missing byte for run".to_string(),
                        ));
                    }
                    let byte = input[i];
                    i += 1;
                    output.resize(output.len() + count, byte);
                },
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runlength_decode_literal() {
        // Length 4: copy 5 bytes
        let output = RunLengthDecoder.decode(&[4, b'H', b'e', b'l', b'l', b'o']).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_runlength_decode_run() {
        // Repeat 'A' 5 times (257-252)
        let output = RunLengthDecoder.decode(&[252, b'A']).unwrap();
        assert_eq!(output, b"AAAAA");
    }

    #[test]
    fn test_runlength_decode_mixed() {
        let output = RunLengthDecoder.decode(&[1, b'H', b'i', 254, b'X']).unwrap();
        assert_eq!(output, b"HiXXX");
    }

    #[test]
    fn test_runlength_decode_eod_marker() {
        // Bytes after the EOD marker are ignored
        let output = RunLengthDecoder.decode(&[1, b'H', b'i', 128, 99, 99]).unwrap();
        assert_eq!(output, b"Hi");
    }

    #[test]
    fn test_runlength_decode_insufficient_data() {
        assert!(RunLengthDecoder.decode(&[4, b'A', b'B', b'C']).is_err());
        assert!(RunLengthDecoder.decode(&[252]).is_err());
    }

    #[test]
    fn test_runlength_decode_empty() {
        assert_eq!(RunLengthDecoder.decode(&[]).unwrap(), b"");
    }
}
