//! Binary codec: tagged value tree to and from bytes
//!
//! Two profiles share one recursive tree walk, selected out-of-band by the
//! caller (no header byte is written):
//!
//! - **Performance**: every tag is a 1-byte marker followed by fixed-width
//!   little-endian payloads; strings, byte arrays, lists, and compounds
//!   carry 4-byte lengths/counts.
//! - **Size**: the same tree shape, but integers and counts use LEB128 and
//!   every string (compound keys included) is LZW-compressed per string.
//!
//! Compound write order is plain map iteration order; the reserved-key
//! ordering rule applies only to the text codec.

use crate::error::{ArborError, Result};
use crate::leb128::{read_count, read_sleb128, read_uleb128, write_sleb128, write_uleb128};
use crate::lzw::LzwScratch;
use crate::value::{Compound, Dec128, TaggedValue};

/// Encoding profile, supplied out-of-band by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryProfile {
    /// Fixed-width payloads, fastest to read and write
    Performance,
    /// LEB128 integers and per-string LZW compression, smallest output
    Size,
}

mod marker {
    pub const NULL: u8 = 0x00;
    pub const BOOL: u8 = 0x01;
    pub const I8: u8 = 0x02;
    pub const I16: u8 = 0x03;
    pub const I32: u8 = 0x04;
    pub const I64: u8 = 0x05;
    pub const U8: u8 = 0x06;
    pub const U16: u8 = 0x07;
    pub const U32: u8 = 0x08;
    pub const U64: u8 = 0x09;
    pub const F32: u8 = 0x0a;
    pub const F64: u8 = 0x0b;
    pub const DECIMAL: u8 = 0x0c;
    pub const STR: u8 = 0x0d;
    pub const BYTES: u8 = 0x0e;
    pub const LIST: u8 = 0x0f;
    pub const COMPOUND: u8 = 0x10;
}

/// Encode a tree to bytes under the given profile
pub fn to_bytes(value: &TaggedValue, profile: BinaryProfile) -> Vec<u8> {
    let mut writer = BinaryWriter::new(profile);
    writer.write_value(value);
    writer.finish()
}

/// Decode a tree from bytes under the given profile
pub fn from_bytes(input: &[u8], profile: BinaryProfile) -> Result<TaggedValue> {
    let mut reader = BinaryReader::new(input, profile);
    reader.read_value()
}

/// Write-side state: output buffer plus per-call LZW scratch
struct BinaryWriter {
    buf: Vec<u8>,
    profile: BinaryProfile,
    scratch: LzwScratch,
}

impl BinaryWriter {
    fn new(profile: BinaryProfile) -> Self {
        Self {
            buf: Vec::new(),
            profile,
            scratch: LzwScratch::new(),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn write_value(&mut self, value: &TaggedValue) {
        match value {
            TaggedValue::Null => self.buf.push(marker::NULL),
            TaggedValue::Bool(v) => {
                self.buf.push(marker::BOOL);
                self.buf.push(u8::from(*v));
            }
            TaggedValue::I8(v) => {
                self.buf.push(marker::I8);
                self.write_signed(*v as i128, 1);
            }
            TaggedValue::I16(v) => {
                self.buf.push(marker::I16);
                self.write_signed(*v as i128, 2);
            }
            TaggedValue::I32(v) => {
                self.buf.push(marker::I32);
                self.write_signed(*v as i128, 4);
            }
            TaggedValue::I64(v) => {
                self.buf.push(marker::I64);
                self.write_signed(*v as i128, 8);
            }
            TaggedValue::U8(v) => {
                self.buf.push(marker::U8);
                self.write_unsigned(*v as u128, 1);
            }
            TaggedValue::U16(v) => {
                self.buf.push(marker::U16);
                self.write_unsigned(*v as u128, 2);
            }
            TaggedValue::U32(v) => {
                self.buf.push(marker::U32);
                self.write_unsigned(*v as u128, 4);
            }
            TaggedValue::U64(v) => {
                self.buf.push(marker::U64);
                self.write_unsigned(*v as u128, 8);
            }
            TaggedValue::F32(v) => {
                self.buf.push(marker::F32);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            TaggedValue::F64(v) => {
                self.buf.push(marker::F64);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            TaggedValue::Decimal(d) => {
                self.buf.push(marker::DECIMAL);
                match self.profile {
                    BinaryProfile::Performance => {
                        self.buf.extend_from_slice(&d.mantissa.to_le_bytes());
                    }
                    BinaryProfile::Size => write_sleb128(&mut self.buf, d.mantissa),
                }
                self.buf.push(d.scale);
            }
            TaggedValue::Str(s) => {
                self.buf.push(marker::STR);
                self.write_str(s);
            }
            TaggedValue::Bytes(b) => {
                self.buf.push(marker::BYTES);
                self.write_len(b.len());
                self.buf.extend_from_slice(b);
            }
            TaggedValue::List(items) => {
                self.buf.push(marker::LIST);
                self.write_len(items.len());
                for item in items {
                    self.write_value(item);
                }
            }
            TaggedValue::Compound(compound) => {
                self.buf.push(marker::COMPOUND);
                self.write_len(compound.len());
                for (key, item) in compound.iter() {
                    self.write_str(key);
                    self.write_value(item);
                }
            }
        }
    }

    fn write_signed(&mut self, v: i128, width: usize) {
        match self.profile {
            BinaryProfile::Performance => {
                self.buf.extend_from_slice(&v.to_le_bytes()[..width]);
            }
            BinaryProfile::Size => write_sleb128(&mut self.buf, v),
        }
    }

    fn write_unsigned(&mut self, v: u128, width: usize) {
        match self.profile {
            BinaryProfile::Performance => {
                self.buf.extend_from_slice(&v.to_le_bytes()[..width]);
            }
            BinaryProfile::Size => write_uleb128(&mut self.buf, v),
        }
    }

    fn write_len(&mut self, len: usize) {
        match self.profile {
            BinaryProfile::Performance => {
                self.buf.extend_from_slice(&(len as u32).to_le_bytes());
            }
            BinaryProfile::Size => write_uleb128(&mut self.buf, len as u128),
        }
    }

    fn write_str(&mut self, s: &str) {
        match self.profile {
            BinaryProfile::Performance => {
                self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                self.buf.extend_from_slice(s.as_bytes());
            }
            BinaryProfile::Size => {
                // Dictionary state never crosses a string boundary
                let mut out = Vec::new();
                self.scratch.compress(s.as_bytes(), &mut out);
                self.buf.extend_from_slice(&out);
            }
        }
    }
}

/// Read-side state: input slice, cursor, per-call LZW scratch
struct BinaryReader<'a> {
    input: &'a [u8],
    pos: usize,
    profile: BinaryProfile,
    scratch: LzwScratch,
}

impl<'a> BinaryReader<'a> {
    fn new(input: &'a [u8], profile: BinaryProfile) -> Self {
        Self {
            input,
            pos: 0,
            profile,
            scratch: LzwScratch::new(),
        }
    }

    fn read_value(&mut self) -> Result<TaggedValue> {
        let offset = self.pos;
        let m = self.take(1)?[0];
        match m {
            marker::NULL => Ok(TaggedValue::Null),
            marker::BOOL => Ok(TaggedValue::Bool(self.take(1)?[0] != 0)),
            marker::I8 => Ok(TaggedValue::I8(self.read_signed(1)? as i8)),
            marker::I16 => Ok(TaggedValue::I16(self.read_signed(2)? as i16)),
            marker::I32 => Ok(TaggedValue::I32(self.read_signed(4)? as i32)),
            marker::I64 => Ok(TaggedValue::I64(self.read_signed(8)? as i64)),
            marker::U8 => Ok(TaggedValue::U8(self.read_unsigned(1)? as u8)),
            marker::U16 => Ok(TaggedValue::U16(self.read_unsigned(2)? as u16)),
            marker::U32 => Ok(TaggedValue::U32(self.read_unsigned(4)? as u32)),
            marker::U64 => Ok(TaggedValue::U64(self.read_unsigned(8)? as u64)),
            marker::F32 => {
                let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
                Ok(TaggedValue::F32(f32::from_le_bytes(bytes)))
            }
            marker::F64 => {
                let bytes: [u8; 8] = self.take(8)?.try_into().expect("length checked");
                Ok(TaggedValue::F64(f64::from_le_bytes(bytes)))
            }
            marker::DECIMAL => {
                let mantissa = match self.profile {
                    BinaryProfile::Performance => {
                        let bytes: [u8; 16] = self.take(16)?.try_into().expect("length checked");
                        i128::from_le_bytes(bytes)
                    }
                    BinaryProfile::Size => read_sleb128(self.input, &mut self.pos)?,
                };
                let scale = self.take(1)?[0];
                Ok(TaggedValue::Decimal(Dec128 { mantissa, scale }))
            }
            marker::STR => Ok(TaggedValue::Str(self.read_str()?)),
            marker::BYTES => {
                let len = self.read_len()?;
                Ok(TaggedValue::Bytes(self.take(len)?.to_vec()))
            }
            marker::LIST => {
                let count = self.read_len()?;
                // Clamp the pre-allocation against the remaining input so a
                // corrupt count cannot demand absurd memory up front
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                Ok(TaggedValue::List(items))
            }
            marker::COMPOUND => {
                let count = self.read_len()?;
                let mut compound = Compound::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let key = self.read_str()?;
                    let value = self.read_value()?;
                    compound.insert(key, value);
                }
                Ok(TaggedValue::Compound(compound))
            }
            other => Err(ArborError::UnknownMarker {
                marker: other,
                offset,
            }),
        }
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ArborError::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_signed(&mut self, width: usize) -> Result<i128> {
        match self.profile {
            BinaryProfile::Performance => {
                let bytes = self.take(width)?;
                let mut full = if bytes[width - 1] & 0x80 != 0 {
                    [0xff; 16]
                } else {
                    [0; 16]
                };
                full[..width].copy_from_slice(bytes);
                Ok(i128::from_le_bytes(full))
            }
            BinaryProfile::Size => read_sleb128(self.input, &mut self.pos),
        }
    }

    fn read_unsigned(&mut self, width: usize) -> Result<u128> {
        match self.profile {
            BinaryProfile::Performance => {
                let bytes = self.take(width)?;
                let mut full = [0u8; 16];
                full[..width].copy_from_slice(bytes);
                Ok(u128::from_le_bytes(full))
            }
            BinaryProfile::Size => read_uleb128(self.input, &mut self.pos),
        }
    }

    fn read_len(&mut self) -> Result<usize> {
        match self.profile {
            BinaryProfile::Performance => {
                let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
                Ok(u32::from_le_bytes(bytes) as usize)
            }
            BinaryProfile::Size => read_count(self.input, &mut self.pos),
        }
    }

    fn read_str(&mut self) -> Result<String> {
        match self.profile {
            BinaryProfile::Performance => {
                let len = self.read_len()?;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec()).map_err(|_| ArborError::InvalidUtf8)
            }
            BinaryProfile::Size => {
                let bytes = self.scratch.decompress(self.input, &mut self.pos)?;
                String::from_utf8(bytes).map_err(|_| ArborError::InvalidUtf8)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::entry;

    fn sample_tree() -> TaggedValue {
        TaggedValue::compound(vec![
            entry("name", TaggedValue::str("serialization engine")),
            entry("count", TaggedValue::I32(-7)),
            entry("big", TaggedValue::U64(u64::MAX)),
            entry("ratio", TaggedValue::F64(0.25)),
            entry("price", TaggedValue::Decimal(Dec128::new(199_99, 2))),
            entry("payload", TaggedValue::Bytes(vec![0, 1, 2, 255])),
            entry(
                "children",
                TaggedValue::List(vec![
                    TaggedValue::Null,
                    TaggedValue::Bool(true),
                    TaggedValue::str("repeat repeat repeat repeat"),
                ]),
            ),
        ])
    }

    #[test]
    fn roundtrip_performance_profile() {
        let tree = sample_tree();
        let bytes = to_bytes(&tree, BinaryProfile::Performance);
        assert_eq!(from_bytes(&bytes, BinaryProfile::Performance).unwrap(), tree);
    }

    #[test]
    fn roundtrip_size_profile() {
        let tree = sample_tree();
        let bytes = to_bytes(&tree, BinaryProfile::Size);
        assert_eq!(from_bytes(&bytes, BinaryProfile::Size).unwrap(), tree);
    }

    #[test]
    fn size_profile_beats_performance_on_repetitive_strings() {
        let text = "abcabcabc ".repeat(60);
        let tree = TaggedValue::str(text);
        let fast = to_bytes(&tree, BinaryProfile::Performance);
        let small = to_bytes(&tree, BinaryProfile::Size);
        assert!(small.len() < fast.len());
    }

    #[test]
    fn unknown_marker_is_fatal_with_offset() {
        let err = from_bytes(&[0x7f], BinaryProfile::Performance).unwrap_err();
        match err {
            ArborError::UnknownMarker { marker, offset } => {
                assert_eq!(marker, 0x7f);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_eof() {
        let tree = TaggedValue::str("hello world");
        let bytes = to_bytes(&tree, BinaryProfile::Performance);
        let err = from_bytes(&bytes[..bytes.len() - 3], BinaryProfile::Performance).unwrap_err();
        assert!(matches!(err, ArborError::UnexpectedEof { .. }));
    }

    #[test]
    fn integer_boundaries_roundtrip_both_profiles() {
        for profile in [BinaryProfile::Performance, BinaryProfile::Size] {
            for tree in [
                TaggedValue::I64(i64::MIN),
                TaggedValue::I64(i64::MAX),
                TaggedValue::I64(-1),
                TaggedValue::U64(u64::MAX),
                TaggedValue::I8(i8::MIN),
                TaggedValue::U8(u8::MAX),
                TaggedValue::I16(i16::MIN),
                TaggedValue::U16(u16::MAX),
                TaggedValue::I32(i32::MIN),
                TaggedValue::U32(u32::MAX),
            ] {
                let bytes = to_bytes(&tree, profile);
                assert_eq!(from_bytes(&bytes, profile).unwrap(), tree);
            }
        }
    }

    #[test]
    fn nan_and_infinity_roundtrip() {
        for profile in [BinaryProfile::Performance, BinaryProfile::Size] {
            let bytes = to_bytes(&TaggedValue::F64(f64::INFINITY), profile);
            assert_eq!(
                from_bytes(&bytes, profile).unwrap(),
                TaggedValue::F64(f64::INFINITY)
            );
            let bytes = to_bytes(&TaggedValue::F64(f64::NAN), profile);
            match from_bytes(&bytes, profile).unwrap() {
                TaggedValue::F64(v) => assert!(v.is_nan()),
                other => panic!("unexpected value: {other:?}"),
            }
        }
    }

    #[test]
    fn compound_binary_order_is_map_order() {
        // $type is not reordered in binary form; map iteration order rules
        let tree = TaggedValue::compound(vec![
            entry("zeta", TaggedValue::I32(1)),
            entry("$type", TaggedValue::str("Demo.T")),
        ]);
        let bytes = to_bytes(&tree, BinaryProfile::Performance);
        let restored = from_bytes(&bytes, BinaryProfile::Performance).unwrap();
        let keys: Vec<_> = restored.as_compound().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "$type"]);
    }
}
