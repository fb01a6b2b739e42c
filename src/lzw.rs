//! Per-string LZW compression for the size binary profile
//!
//! Classic LZW over a string's UTF-8 bytes. The dictionary is seeded with
//! the 256 single-byte entries and capped at [`MAX_DICT_SIZE`] entries.
//! Compressed layout: ULEB128 code count, then ULEB128 codes.
//!
//! The dictionary is reset at the start of every string operation. It is
//! never shared across strings in one document; this bounds dictionary
//! overhead but forfeits cross-string redundancy, and the boundary must be
//! preserved exactly for bit compatibility.

use std::collections::HashMap;

use crate::error::{ArborError, Result};
use crate::leb128::{read_count, read_uleb128, write_uleb128};

/// Dictionary capacity, seed entries included
pub const MAX_DICT_SIZE: usize = 4096;

/// Reusable scratch storage for LZW operations
///
/// Owned by one binary writer or reader, i.e. scoped to a single logical
/// call; the state is cleared at the start of each string operation and is
/// not re-entrant within that call.
#[derive(Debug, Default)]
pub struct LzwScratch {
    encode_dict: HashMap<(u16, u8), u16>,
    decode_table: Vec<Vec<u8>>,
    codes: Vec<u16>,
}

impl LzwScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress `input` and append the encoded block to `out`
    pub fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.encode_dict.clear();
        self.codes.clear();

        if !input.is_empty() {
            let mut next_code: u16 = 256;
            let mut current = input[0] as u16;
            for &byte in &input[1..] {
                match self.encode_dict.get(&(current, byte)) {
                    Some(&code) => current = code,
                    None => {
                        self.codes.push(current);
                        if (next_code as usize) < MAX_DICT_SIZE {
                            self.encode_dict.insert((current, byte), next_code);
                            next_code += 1;
                        }
                        current = byte as u16;
                    }
                }
            }
            self.codes.push(current);
        }

        write_uleb128(out, self.codes.len() as u128);
        for &code in &self.codes {
            write_uleb128(out, code as u128);
        }
    }

    /// Decompress one encoded block starting at `pos`, advancing `pos`
    pub fn decompress(&mut self, input: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
        let count = read_count(input, pos)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        self.decode_table.clear();
        for b in 0u8..=255 {
            self.decode_table.push(vec![b]);
        }

        let first = read_code(input, pos)?;
        if first as usize >= 256 {
            return Err(ArborError::InvalidCompression(format!(
                "first LZW code {first} is not a literal"
            )));
        }
        let mut output = vec![first as u8];
        let mut prev = first as usize;

        for _ in 1..count {
            let code = read_code(input, pos)? as usize;
            let entry = if code < self.decode_table.len() {
                self.decode_table[code].clone()
            } else if code == self.decode_table.len() {
                // The cScSc case: the entry being defined is used immediately
                let mut entry = self.decode_table[prev].clone();
                entry.push(self.decode_table[prev][0]);
                entry
            } else {
                return Err(ArborError::InvalidCompression(format!(
                    "LZW code {code} references an undefined dictionary entry"
                )));
            };

            if self.decode_table.len() < MAX_DICT_SIZE {
                let mut grown = self.decode_table[prev].clone();
                grown.push(entry[0]);
                self.decode_table.push(grown);
            }
            output.extend_from_slice(&entry);
            prev = code;
        }

        Ok(output)
    }

    /// Current decode dictionary size, exposed for growth-bound tests
    #[cfg(test)]
    fn decode_dict_len(&self) -> usize {
        self.decode_table.len()
    }
}

fn read_code(input: &[u8], pos: &mut usize) -> Result<u16> {
    let value = read_uleb128(input, pos)?;
    u16::try_from(value)
        .ok()
        .filter(|&c| (c as usize) < MAX_DICT_SIZE)
        .ok_or_else(|| ArborError::InvalidCompression(format!("LZW code {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &[u8]) -> LzwScratch {
        let mut scratch = LzwScratch::new();
        let mut out = Vec::new();
        scratch.compress(input, &mut out);
        let mut pos = 0;
        let restored = scratch.decompress(&out, &mut pos).unwrap();
        assert_eq!(restored, input);
        assert_eq!(pos, out.len());
        scratch
    }

    #[test]
    fn empty_string() {
        roundtrip(b"");
    }

    #[test]
    fn ascii_idempotence() {
        roundtrip(b"a");
        roundtrip(b"TOBEORNOTTOBEORTOBEORNOT");
        roundtrip(b"the quick brown fox jumps over the lazy dog");
        roundtrip("snowman \u{2603} and friends".as_bytes());
    }

    #[test]
    fn repetition_compresses() {
        let input = b"abababababababababababababababab".repeat(8);
        let mut scratch = LzwScratch::new();
        let mut out = Vec::new();
        scratch.compress(&input, &mut out);
        assert!(out.len() < input.len());
        let mut pos = 0;
        assert_eq!(scratch.decompress(&out, &mut pos).unwrap(), input);
    }

    #[test]
    fn dictionary_growth_never_exceeds_cap() {
        // Enough distinct pairs to hit the cap many times over
        let mut input = Vec::new();
        for i in 0u32..20_000 {
            input.push((i % 251) as u8);
            input.push((i % 13) as u8);
        }
        let scratch = roundtrip(&input);
        assert!(scratch.decode_dict_len() <= MAX_DICT_SIZE);
        assert!(scratch.encode_dict.len() <= MAX_DICT_SIZE - 256);
    }

    #[test]
    fn dictionary_resets_between_strings() {
        let mut scratch = LzwScratch::new();
        let mut first = Vec::new();
        scratch.compress(b"abcabcabc", &mut first);
        let mut second = Vec::new();
        scratch.compress(b"abcabcabc", &mut second);
        // Identical inputs encode identically only if no state leaks across calls
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_undefined_code() {
        let mut out = Vec::new();
        write_uleb128(&mut out, 2);
        write_uleb128(&mut out, b'a' as u128);
        write_uleb128(&mut out, 3000);
        let mut scratch = LzwScratch::new();
        let mut pos = 0;
        let err = scratch.decompress(&out, &mut pos).unwrap_err();
        assert!(matches!(err, ArborError::InvalidCompression(_)));
    }
}
