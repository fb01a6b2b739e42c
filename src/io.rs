//! File-based read/write helpers
//!
//! Blocking `std::fs` I/O; the encoding mode is supplied by the caller and
//! is not recorded in the file itself.

use std::fs;
use std::path::Path;

use crate::binary::{self, BinaryProfile};
use crate::error::Result;
use crate::text;
use crate::value::TaggedValue;

/// Physical encoding selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    BinaryPerformance,
    BinarySize,
    Text,
}

/// Write a tree to a file under the given mode
pub fn write_file(path: impl AsRef<Path>, value: &TaggedValue, mode: EncodingMode) -> Result<()> {
    match mode {
        EncodingMode::BinaryPerformance => {
            fs::write(path, binary::to_bytes(value, BinaryProfile::Performance))?
        }
        EncodingMode::BinarySize => {
            fs::write(path, binary::to_bytes(value, BinaryProfile::Size))?
        }
        EncodingMode::Text => fs::write(path, text::to_text(value))?,
    }
    Ok(())
}

/// Read a tree back from a file written under the given mode
pub fn read_file(path: impl AsRef<Path>, mode: EncodingMode) -> Result<TaggedValue> {
    match mode {
        EncodingMode::BinaryPerformance => {
            binary::from_bytes(&fs::read(path)?, BinaryProfile::Performance)
        }
        EncodingMode::BinarySize => binary::from_bytes(&fs::read(path)?, BinaryProfile::Size),
        EncodingMode::Text => text::from_text(&fs::read_to_string(path)?),
    }
}
