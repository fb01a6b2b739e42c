//! LEB128 variable-length integer codec
//!
//! 7 payload bits plus one continuation bit per byte, little-endian group
//! order. Signed values use SLEB128 sign extension. The routines are 128
//! bits wide so the same paths carry decimal mantissas.

use crate::error::{ArborError, Result};

/// Encode an unsigned integer as ULEB128
pub fn write_uleb128(buf: &mut Vec<u8>, mut value: u128) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Encode a signed integer as SLEB128
pub fn write_sleb128(buf: &mut Vec<u8>, mut value: i128) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let sign_clear = byte & 0x40 == 0;
        let done = (value == 0 && sign_clear) || (value == -1 && !sign_clear);
        if done {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Decode a ULEB128 value, advancing `pos`
pub fn read_uleb128(input: &[u8], pos: &mut usize) -> Result<u128> {
    let mut value: u128 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *input
            .get(*pos)
            .ok_or(ArborError::UnexpectedEof { offset: *pos })?;
        *pos += 1;
        if shift >= 128 {
            return Err(ArborError::InvalidCompression(
                "ULEB128 value exceeds 128 bits".to_string(),
            ));
        }
        value |= ((byte & 0x7f) as u128) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Decode a SLEB128 value, advancing `pos`
pub fn read_sleb128(input: &[u8], pos: &mut usize) -> Result<i128> {
    let mut value: i128 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *input
            .get(*pos)
            .ok_or(ArborError::UnexpectedEof { offset: *pos })?;
        *pos += 1;
        if shift >= 128 {
            return Err(ArborError::InvalidCompression(
                "SLEB128 value exceeds 128 bits".to_string(),
            ));
        }
        value |= ((byte & 0x7f) as i128) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 128 && byte & 0x40 != 0 {
                value |= -1i128 << shift;
            }
            return Ok(value);
        }
    }
}

/// Convenience: decode a ULEB128 value expected to fit a usize count
pub fn read_count(input: &[u8], pos: &mut usize) -> Result<usize> {
    let value = read_uleb128(input, pos)?;
    usize::try_from(value).map_err(|_| ArborError::InvalidCompression(
        format!("count {value} does not fit in usize"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uleb_roundtrip(v: u128) -> Vec<u8> {
        let mut buf = Vec::new();
        write_uleb128(&mut buf, v);
        let mut pos = 0;
        assert_eq!(read_uleb128(&buf, &mut pos).unwrap(), v);
        assert_eq!(pos, buf.len());
        buf
    }

    fn sleb_roundtrip(v: i128) -> Vec<u8> {
        let mut buf = Vec::new();
        write_sleb128(&mut buf, v);
        let mut pos = 0;
        assert_eq!(read_sleb128(&buf, &mut pos).unwrap(), v);
        assert_eq!(pos, buf.len());
        buf
    }

    #[test]
    fn uleb_boundaries() {
        assert_eq!(uleb_roundtrip(0), vec![0]);
        assert_eq!(uleb_roundtrip(127), vec![0x7f]);
        assert_eq!(uleb_roundtrip(128), vec![0x80, 0x01]);
        uleb_roundtrip(300);
        uleb_roundtrip(u64::MAX as u128);
        uleb_roundtrip(u128::MAX);
    }

    #[test]
    fn sleb_boundaries() {
        assert_eq!(sleb_roundtrip(0), vec![0]);
        assert_eq!(sleb_roundtrip(-1), vec![0x7f]);
        sleb_roundtrip(63);
        sleb_roundtrip(64);
        sleb_roundtrip(-64);
        sleb_roundtrip(-65);
        sleb_roundtrip(i64::MIN as i128);
        sleb_roundtrip(i64::MAX as i128);
        sleb_roundtrip(i128::MIN);
    }

    #[test]
    fn multi_group_values() {
        // Values spanning several 7-bit groups keep group order little-endian
        let buf = uleb_roundtrip(624485);
        assert_eq!(buf, vec![0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn truncated_input_is_eof() {
        let mut pos = 0;
        let err = read_uleb128(&[0x80, 0x80], &mut pos).unwrap_err();
        assert!(matches!(err, ArborError::UnexpectedEof { .. }));
    }
}
