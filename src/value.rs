//! Core tagged value tree
//!
//! `TaggedValue` is the universal in-memory representation of serialized
//! data: a closed tagged union of scalars, lists, and string-keyed
//! compounds. Every codec in the crate converts to or from this tree.

use std::fmt;
use std::str::FromStr;

/// Compound keys reserved for the dispatcher
pub const ID_KEY: &str = "$id";
pub const TYPE_KEY: &str = "$type";
pub const DEPENDENCIES_KEY: &str = "$dependencies";

/// ARBOR value type enumeration
///
/// A node's variant never changes after construction. Trees are built
/// fresh by each serialize call and consumed by a single round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integers, 8 to 64 bits
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Unsigned integers, 8 to 64 bits
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// 32-bit floating point
    F32(f32),
    /// 64-bit floating point
    F64(f64),
    /// 128-bit decimal
    Decimal(Dec128),
    /// String value
    Str(String),
    /// Binary data (bytes)
    Bytes(Vec<u8>),
    /// Ordered list of values (order-significant)
    List(Vec<TaggedValue>),
    /// String-keyed map, insertion order preserved, keys unique
    Compound(Compound),
}

/// 128-bit decimal: mantissa scaled by a power of ten
///
/// `mantissa * 10^(-scale)`. Round-trips exactly through both codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dec128 {
    pub mantissa: i128,
    pub scale: u8,
}

impl Dec128 {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    pub fn from_i64(v: i64) -> Self {
        Self {
            mantissa: v as i128,
            scale: 0,
        }
    }

    pub fn zero() -> Self {
        Self {
            mantissa: 0,
            scale: 0,
        }
    }
}

impl fmt::Display for Dec128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let negative = self.mantissa < 0;
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let (int_part, frac_part) = if digits.len() > scale {
            let split = digits.len() - scale;
            (digits[..split].to_string(), digits[split..].to_string())
        } else {
            ("0".to_string(), format!("{:0>width$}", digits, width = scale))
        };
        let sign = if negative { "-" } else { "" };
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl FromStr for Dec128 {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.find('.') {
            None => Ok(Self {
                mantissa: s.parse()?,
                scale: 0,
            }),
            Some(dot) => {
                let scale = (s.len() - dot - 1) as u8;
                let joined: String = s[..dot].chars().chain(s[dot + 1..].chars()).collect();
                Ok(Self {
                    mantissa: joined.parse()?,
                    scale,
                })
            }
        }
    }
}

/// String-keyed map with unique keys and stable insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: Vec<(String, TaggedValue)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a key-value pair, replacing the value if the key exists
    pub fn insert(&mut self, key: impl Into<String>, value: TaggedValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&TaggedValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Case-insensitive key lookup (deserialize name fallback)
    pub fn get_ignore_case(&self, key: &str) -> Option<&TaggedValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaggedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, TaggedValue)> for Compound {
    fn from_iter<T: IntoIterator<Item = (String, TaggedValue)>>(iter: T) -> Self {
        let mut compound = Compound::new();
        for (k, v) in iter {
            compound.insert(k, v);
        }
        compound
    }
}

// ============================================================
// Builder functions
// ============================================================

impl TaggedValue {
    pub fn null() -> Self {
        TaggedValue::Null
    }

    pub fn bool(v: bool) -> Self {
        TaggedValue::Bool(v)
    }

    pub fn i32(v: i32) -> Self {
        TaggedValue::I32(v)
    }

    pub fn i64(v: i64) -> Self {
        TaggedValue::I64(v)
    }

    pub fn f64(v: f64) -> Self {
        TaggedValue::F64(v)
    }

    pub fn str(v: impl Into<String>) -> Self {
        TaggedValue::Str(v.into())
    }

    pub fn bytes(v: Vec<u8>) -> Self {
        TaggedValue::Bytes(v)
    }

    pub fn list(items: Vec<TaggedValue>) -> Self {
        TaggedValue::List(items)
    }

    pub fn compound(entries: Vec<(String, TaggedValue)>) -> Self {
        TaggedValue::Compound(entries.into_iter().collect())
    }

    // ============================================================
    // Type checking
    // ============================================================

    pub fn is_null(&self) -> bool {
        matches!(self, TaggedValue::Null)
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, TaggedValue::Compound(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, TaggedValue::List(_))
    }

    // ============================================================
    // Value extraction
    // ============================================================

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TaggedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any signed or unsigned integer variant that fits into i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TaggedValue::I8(v) => Some(*v as i64),
            TaggedValue::I16(v) => Some(*v as i64),
            TaggedValue::I32(v) => Some(*v as i64),
            TaggedValue::I64(v) => Some(*v),
            TaggedValue::U8(v) => Some(*v as i64),
            TaggedValue::U16(v) => Some(*v as i64),
            TaggedValue::U32(v) => Some(*v as i64),
            TaggedValue::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TaggedValue::U8(v) => Some(*v as u64),
            TaggedValue::U16(v) => Some(*v as u64),
            TaggedValue::U32(v) => Some(*v as u64),
            TaggedValue::U64(v) => Some(*v),
            TaggedValue::I8(v) => u64::try_from(*v).ok(),
            TaggedValue::I16(v) => u64::try_from(*v).ok(),
            TaggedValue::I32(v) => u64::try_from(*v).ok(),
            TaggedValue::I64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TaggedValue::F32(v) => Some(*v as f64),
            TaggedValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TaggedValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TaggedValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TaggedValue]> {
        match self {
            TaggedValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            TaggedValue::Compound(v) => Some(v),
            _ => None,
        }
    }

    /// Get a value from a compound by key
    pub fn get(&self, key: &str) -> Option<&TaggedValue> {
        match self {
            TaggedValue::Compound(c) => c.get(key),
            _ => None,
        }
    }

    /// Get a value from a list by index
    pub fn index(&self, idx: usize) -> Option<&TaggedValue> {
        match self {
            TaggedValue::List(items) => items.get(idx),
            _ => None,
        }
    }

    /// Human-readable variant name, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            TaggedValue::Null => "null",
            TaggedValue::Bool(_) => "bool",
            TaggedValue::I8(_) => "i8",
            TaggedValue::I16(_) => "i16",
            TaggedValue::I32(_) => "i32",
            TaggedValue::I64(_) => "i64",
            TaggedValue::U8(_) => "u8",
            TaggedValue::U16(_) => "u16",
            TaggedValue::U32(_) => "u32",
            TaggedValue::U64(_) => "u64",
            TaggedValue::F32(_) => "f32",
            TaggedValue::F64(_) => "f64",
            TaggedValue::Decimal(_) => "decimal",
            TaggedValue::Str(_) => "string",
            TaggedValue::Bytes(_) => "bytes",
            TaggedValue::List(_) => "list",
            TaggedValue::Compound(_) => "compound",
        }
    }
}

/// Helper to create a compound entry
pub fn entry(key: impl Into<String>, value: TaggedValue) -> (String, TaggedValue) {
    (key.into(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_preserves_insertion_order() {
        let mut c = Compound::new();
        c.insert("z", TaggedValue::i32(1));
        c.insert("a", TaggedValue::i32(2));
        c.insert("m", TaggedValue::i32(3));
        let keys: Vec<_> = c.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn compound_insert_replaces_duplicate_key() {
        let mut c = Compound::new();
        c.insert("x", TaggedValue::i32(1));
        c.insert("x", TaggedValue::i32(2));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("x").and_then(|v| v.as_i64()), Some(2));
    }

    #[test]
    fn dec128_display_roundtrip() {
        let d = Dec128::new(314159, 5);
        assert_eq!(d.to_string(), "3.14159");
        assert_eq!("3.14159".parse::<Dec128>().unwrap(), d);

        let neg = Dec128::new(-25, 1);
        assert_eq!(neg.to_string(), "-2.5");
        assert_eq!("-2.5".parse::<Dec128>().unwrap(), neg);

        let small = Dec128::new(7, 3);
        assert_eq!(small.to_string(), "0.007");
        assert_eq!("0.007".parse::<Dec128>().unwrap(), small);
    }

    #[test]
    fn as_i64_widens_small_variants() {
        assert_eq!(TaggedValue::I8(-1).as_i64(), Some(-1));
        assert_eq!(TaggedValue::U32(7).as_i64(), Some(7));
        assert_eq!(TaggedValue::U64(u64::MAX).as_i64(), None);
    }
}
