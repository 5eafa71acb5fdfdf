//! FlateDecode (zlib/deflate) implementation.
//!
//! The most common PDF compression filter. Uses the flate2 crate.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Decompresses zlib-wrapped deflate data. Some generators emit raw
/// deflate without the zlib wrapper, so that is tried as a fallback, and
/// data decoded before a mid-stream error is kept rather than discarded.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut decoder = ZlibDecoder::new(input);

        let zlib_err = match decoder.read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        // Partial recovery: keep whatever decoded before the corruption
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: extracted {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        // Fallback: raw deflate without the zlib wrapper
        output.clear();
        let mut deflate_decoder = DeflateDecoder::new(input);
        match deflate_decoder.read_to_end(&mut output) {
            Ok(_) => {
                log::info!("Raw deflate fallback succeeded: {} bytes", output.len());
                Ok(output)
            },
            Err(deflate_err) => {
                if !output.is_empty() {
                    log::warn!(
                        "Raw deflate partial recovery: extracted {} bytes before error",
                        output.len()
                    );
                    return Ok(output);
                }

                Err(Error::Decode(format!(
                    "FlateDecode decompression failed (zlib: {}, raw deflate: {}, {} input bytes)",
                    zlib_err,
                    deflate_err,
                    input.len()
                )))
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
