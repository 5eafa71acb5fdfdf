//! Predictor decoding for PDF stream filters.
//!
//! FlateDecode data can be predictor-encoded (TIFF predictor
//! 2 or PNG predictors 10-15) to improve compression. Cross-reference
//! streams almost always use PNG Up. This module reverses the prediction.

use crate::error::{Error, Result};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample (default 1)
    pub colors: usize,
    /// Bits per component (default 8)
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1, // No prediction
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of pixel data per row, without any predictor tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per sample, used as the "left neighbor" distance.
    fn bytes_per_sample(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse predictor encoding on decoded filter output.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        _ => Err(Error::Decode(format!("Unsupported predictor: {}", params.predictor))),
    }
}

/// TIFF Predictor 2: each sample is the difference from its left neighbor.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_sample();

    if row_len == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "TIFF predictor: data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let row_start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[row_start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }

    Ok(output)
}

/// PNG predictors 10-15: each row carries a tag byte naming the per-row
/// filter, followed by the filtered bytes.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let row_len = pixel_bytes + 1; // tag byte + pixel data
    let bpp = params.bytes_per_sample();

    if pixel_bytes == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "PNG predictor: data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let mut output = Vec::with_capacity(data.len() / row_len * pixel_bytes);
    let mut prev_row = vec![0u8; pixel_bytes];

    for row in data.chunks(row_len) {
        let tag = row[0];
        let encoded = &row[1..];
        let mut decoded = vec![0u8; pixel_bytes];

        for i in 0..pixel_bytes {
            let raw = encoded[i];
            let left = if i >= bpp { decoded[i - bpp] } else { 0 };
            let up = prev_row[i];
            let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };

            decoded[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => raw.wrapping_add(paeth_predictor(left, up, up_left)),
                _ => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag)));
                },
            };
        }

        output.extend_from_slice(&decoded);
        prev_row = decoded;
    }

    Ok(output)
}

/// Paeth predictor function from the PNG specification.
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i16, b as i16, c as i16);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_predictor() {
        let data = b"Hello, World!";
        let params = DecodeParams::default();
        assert_eq!(decode_predictor(data, &params).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor() {
        let params = DecodeParams {
            predictor: 12, // PNG Up
            columns: 5,
            colors: 1,
            bits_per_component: 8,
        };

        // Two rows, each prefixed by tag 2 (Up)
        let encoded = vec![
            2, 10, 20, 30, 40, 50, // row 0 decodes as-is (prev row is zero)
            2, 5, 5, 5, 5, 5, // row 1: each byte adds the byte above
        ];

        let result = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(result, vec![10, 20, 30, 40, 50, 15, 25, 35, 45, 55]);
    }

    #[test]
    fn test_png_sub_predictor() {
        let params = DecodeParams {
            predictor: 11, // PNG Sub
            columns: 4,
            colors: 1,
            bits_per_component: 8,
        };

        // One row with tag 1 (Sub): [10, +5, +5, +5] -> [10, 15, 20, 25]
        let encoded = vec![1, 10, 5, 5, 5];
        let result = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(result, vec![10, 15, 20, 25]);
    }

    #[test]
    fn test_png_predictor_bad_row_size() {
        let params = DecodeParams {
            predictor: 12,
            columns: 5,
            colors: 1,
            bits_per_component: 8,
        };

        // 7 bytes is not a multiple of the 6-byte row
        assert!(decode_predictor(&[2, 1, 2, 3, 4, 5, 6], &params).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 4,
            colors: 1,
            bits_per_component: 8,
        };

        // [10, +5, +5, +5] -> [10, 15, 20, 25]
        let result = decode_predictor(&[10, 5, 5, 5], &params).unwrap();
        assert_eq!(result, vec![10, 15, 20, 25]);
    }
}
