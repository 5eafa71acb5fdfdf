//! Stream decoder implementations for PDF filters.
//!
//! Decoders for the filters a merge needs to read cross-reference streams
//! and object streams:
//! - FlateDecode (zlib/deflate) - most common
//! - ASCIIHexDecode - hexadecimal encoding
//! - RunLengthDecode - run-length encoding
//!
//! Decoders can be chained together in a filter pipeline. Page content
//! streams are never decoded here; they are copied through byte for byte,
//! so image filters (DCTDecode etc.) are out of scope.

use crate::error::{Error, Result};

mod ascii_hex;
mod flate;
mod predictor;
mod runlength;

pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use predictor::{DecodeParams, decode_predictor};
pub use runlength::RunLengthDecoder;

/// Security limits for decompression (decompression bomb protection).
///
/// ISO 32000-1:2008 does not specify decompression limits, but without
/// them a small crafted stream can exhaust memory.
const MAX_DECOMPRESSION_RATIO: u64 = 100;
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Trait for PDF stream decoders.
///
/// Each decoder implements a specific PDF filter algorithm.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data using a filter pipeline.
///
/// PDF streams can have multiple filters applied in sequence. Each filter
/// in `filters` is applied in order.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_params(data, filters, None)
}

/// Decode stream data with optional decode parameters.
///
/// Extends `decode_stream` with predictor parameters (applied after the
/// main filters) and decompression bomb checks after each filter stage.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let compressed_size = data.len();
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" => Box::new(FlateDecoder),
            "ASCIIHexDecode" => Box::new(AsciiHexDecoder),
            "RunLengthDecode" => Box::new(RunLengthDecoder),
            _ => return Err(Error::UnsupportedFilter(filter_name.clone())),
        };

        current = decoder.decode(&current)?;

        if compressed_size > 0 {
            let ratio = current.len() as u64 / compressed_size as u64;
            if ratio > MAX_DECOMPRESSION_RATIO {
                return Err(Error::Decode(format!(
                    "Decompression bomb detected: ratio {}:1 exceeds limit {}:1 (compressed: {} bytes, decompressed: {} bytes)",
                    ratio,
                    MAX_DECOMPRESSION_RATIO,
                    compressed_size,
                    current.len()
                )));
            }
        }

        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "Decompression bomb detected: decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    // Predictor runs after the filter chain
    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
