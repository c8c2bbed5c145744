//! This implements the compression algorithm used in POD5 format.
//!
//! POD5 uses a variant of the streamvbyte algorithm. Since signal values are
//! only 16-bit (i16) values, it only needs to consider if values fit into 1
//! data byte or 2 data bytes. This means that it only needs to use 1-bit to
//! encode the size, so every control byte encodes up to 8 values, instead of
//! 4..

use std::io;

use bitvec::{prelude::Lsb0, slice::Iter, view::BitView};
use delta_encoding::{DeltaDecoderExt, DeltaEncoderExt};
use itertools::Itertools;
use zigzag::ZigZag;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("zstd decompression failed: {0}")]
    Zstd(#[from] io::Error),

    /// The control or data bytes ran out before `expected` values were read
    #[error("compressed signal truncated, decoded {decoded} of {expected} samples")]
    Truncated { decoded: usize, expected: usize },
}

struct DecodeIter<'a> {
    count: usize,
    samples: usize,
    bits: Iter<'a, u8, Lsb0>,
    data: &'a [u8],
}

impl<'a> DecodeIter<'a> {
    fn new(ctrl_bytes: &'a [u8], data: &'a [u8], samples: usize) -> Self {
        Self {
            bits: ctrl_bytes.view_bits().iter(),
            data,
            count: 0,
            samples,
        }
    }

    fn from_compressed(data: &'a [u8], samples: usize) -> Result<Self, DecodeError> {
        let (ctrl, data) = split_data(data, samples).ok_or(DecodeError::Truncated {
            decoded: 0,
            expected: samples,
        })?;
        Ok(DecodeIter::new(ctrl, data, samples))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count == self.samples {
            return None;
        }
        let code = self.bits.next()?;
        let value = if *code {
            // Bit is set to 1, so two-bytes need to be parsed
            let (bytes, rest) = self.data.split_first_chunk::<2>()?;
            self.data = rest;
            u16::from_le_bytes(*bytes)
        } else {
            // Bit is set to 0, so only one byte is needed
            let (byte, rest) = self.data.split_first()?;
            self.data = rest;
            *byte as u16
        };
        self.count += 1;
        Some(value)
    }
}

/// zstd -> streamvbyte -> zig-zag -> delta
///
/// When running on compressed signal data from a signal column in a POD5 file,
/// use `decode` on the individual rows. Compressed signal from several rows of
/// the same read has to be decoded row by row and concatenated afterwards.
pub fn decode(compressed: &[u8], count: usize) -> Result<Vec<i16>, DecodeError> {
    let mut out = vec![0i16; count];
    decode_into(compressed, &mut out)?;
    Ok(out)
}

/// Decode exactly `out.len()` samples into `out`.
pub fn decode_into(compressed: &[u8], out: &mut [i16]) -> Result<(), DecodeError> {
    let expected = out.len();
    let svb = zstd::decode_all(compressed)?;
    let values = DecodeIter::from_compressed(&svb, expected)?
        .map(ZigZag::decode)
        .original();
    let mut decoded = 0;
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value;
        decoded += 1;
    }
    if decoded != expected {
        return Err(DecodeError::Truncated { decoded, expected });
    }
    Ok(())
}

struct Encoder<I> {
    ctrl_bytes: Vec<u8>,
    data_bytes: Vec<u8>,
    iter: I,
}

impl<I: Iterator<Item = u16>> Encoder<I> {
    fn with_capacity(iter: I, count: usize) -> Self {
        Self {
            ctrl_bytes: Vec::with_capacity(num_ctrl_bytes(count)),
            data_bytes: Vec::with_capacity(max_encoded_length(count)),
            iter,
        }
    }

    // Iterate over 16-bit values, splitting the bigger values into two bytes
    // and smaller ones in one byte.
    fn encode(mut self) -> Vec<u8> {
        for chunk in &self.iter.chunks(8) {
            let mut ctrl_byte = 0u8;
            let bits = ctrl_byte.view_bits_mut::<Lsb0>();
            for (x, mut code) in chunk.zip(bits.iter_mut()) {
                if x > (u8::MAX as u16) {
                    *code = true;
                    self.data_bytes.extend_from_slice(&x.to_le_bytes());
                } else {
                    self.data_bytes.push(x as u8);
                }
            }
            self.ctrl_bytes.push(ctrl_byte)
        }
        let mut compressed = self.ctrl_bytes;
        compressed.append(&mut self.data_bytes);
        compressed
    }
}

/// Performs VBZ compression
/// delta -> zig-zag -> streamvbyte -> zstd
///
/// The output is decodable by pod5-file-format but is not byte-identical to
/// it: the control and data buffers here hold only the bytes actually used,
/// while pod5-file-format sizes them for the worst case up front.
pub fn encode(uncompressed: &[i16]) -> io::Result<Vec<u8>> {
    let iter = uncompressed.iter().copied().deltas().map(ZigZag::encode);
    let svb = Encoder::with_capacity(iter, uncompressed.len()).encode();
    zstd::bulk::compress(&svb, 1)
}

fn split_data(compressed: &[u8], count: usize) -> Option<(&[u8], &[u8])> {
    let mid = num_ctrl_bytes(count);
    (mid <= compressed.len()).then(|| compressed.split_at(mid))
}

/// Get number of control bytes used in this variant of streamvbyte
///
/// Essential ceil(count / 8) but we copy the bit operator version from
/// nanopore/pod5-file-format
fn num_ctrl_bytes(count: usize) -> usize {
    (count >> 3) + (((count & 7) + 7) >> 3)
}

fn max_encoded_length(count: usize) -> usize {
    num_ctrl_bytes(count) + (2 * count)
}
