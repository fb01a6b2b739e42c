//! Error types for the ARBOR codec

use thiserror::Error;

/// Errors that can occur during ARBOR operations
///
/// Structural errors (unknown markers, arity mismatches, malformed text)
/// abort the current call. Recoverable errors (type resolution, per-field
/// failures, lossy conversions) are caught at the field or dispatch
/// boundary, logged, and never escape their enclosing loop.
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Parse error at {pos}: {message}")]
    Parse { message: String, pos: usize },

    #[error("Unknown type marker 0x{marker:02x} at byte {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    #[error("Unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: usize },

    #[error("Field count mismatch for {type_name}: expected {expected}, found {found}")]
    FieldCountMismatch {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("Tuple arity mismatch: expected {expected}, found {found}")]
    TupleArityMismatch { expected: usize, found: usize },

    #[error("Type {0} has no parameterless constructor")]
    MissingConstructor(String),

    #[error("Cannot resolve type name: {0}")]
    TypeResolution(String),

    #[error("Lossy or unsupported numeric conversion from {from} to {to}")]
    PrimitiveConversion { from: String, to: String },

    #[error("Value mismatch: expected {expected}, got {got}")]
    ValueMismatch { expected: String, got: String },

    #[error("Invalid compressed data: {0}")]
    InvalidCompression(String),

    #[error("Invalid UTF-8 in string payload")]
    InvalidUtf8,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON conversion error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArborError>;
