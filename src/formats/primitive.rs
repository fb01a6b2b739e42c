//! Scalar, temporal, and enum formats

use chrono::{DateTime, Utc};

use crate::error::{ArborError, Result};
use crate::formats::Format;
use crate::graph::Datum;
use crate::registry::{TypeKind, TypeRegistry, TypeSpec};
use crate::serializer::{Deserializer, Serializer};
use crate::value::TaggedValue;

/// Direct 1:1 mapping between scalar kinds and tag variants
pub struct PrimitiveFormat;

impl Format for PrimitiveFormat {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(
            ty,
            TypeSpec::Bool
                | TypeSpec::I8
                | TypeSpec::I16
                | TypeSpec::I32
                | TypeSpec::I64
                | TypeSpec::U8
                | TypeSpec::U16
                | TypeSpec::U32
                | TypeSpec::U64
                | TypeSpec::F32
                | TypeSpec::F64
                | TypeSpec::Decimal
                | TypeSpec::Str
                | TypeSpec::Bytes
        )
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        _ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        match value {
            Datum::Bool(v) => Ok(TaggedValue::Bool(*v)),
            Datum::I8(v) => Ok(TaggedValue::I8(*v)),
            Datum::I16(v) => Ok(TaggedValue::I16(*v)),
            Datum::I32(v) => Ok(TaggedValue::I32(*v)),
            Datum::I64(v) => Ok(TaggedValue::I64(*v)),
            Datum::U8(v) => Ok(TaggedValue::U8(*v)),
            Datum::U16(v) => Ok(TaggedValue::U16(*v)),
            Datum::U32(v) => Ok(TaggedValue::U32(*v)),
            Datum::U64(v) => Ok(TaggedValue::U64(*v)),
            Datum::F32(v) => Ok(TaggedValue::F32(*v)),
            Datum::F64(v) => Ok(TaggedValue::F64(*v)),
            Datum::Decimal(v) => Ok(TaggedValue::Decimal(*v)),
            Datum::Str(v) => Ok(TaggedValue::Str(v.clone())),
            Datum::Bytes(v) => Ok(TaggedValue::Bytes(v.clone())),
            other => Err(ArborError::ValueMismatch {
                expected: format!("{declared:?}"),
                got: format!("{other:?}"),
            }),
        }
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        _de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        match declared {
            TypeSpec::Bool => match value {
                TaggedValue::Bool(v) => Ok(Datum::Bool(*v)),
                other => Err(mismatch("bool", other)),
            },
            TypeSpec::Str => match value {
                TaggedValue::Str(v) => Ok(Datum::Str(v.clone())),
                other => Err(mismatch("string", other)),
            },
            TypeSpec::Bytes => match value {
                TaggedValue::Bytes(v) => Ok(Datum::Bytes(v.clone())),
                other => Err(mismatch("bytes", other)),
            },
            TypeSpec::Decimal => match value {
                TaggedValue::Decimal(v) => Ok(Datum::Decimal(*v)),
                TaggedValue::I8(_)
                | TaggedValue::I16(_)
                | TaggedValue::I32(_)
                | TaggedValue::I64(_)
                | TaggedValue::U8(_)
                | TaggedValue::U16(_)
                | TaggedValue::U32(_)
                | TaggedValue::U64(_) => {
                    let v = value.as_i64().ok_or_else(|| conversion(value, "decimal"))?;
                    Ok(Datum::Decimal(crate::value::Dec128::from_i64(v)))
                }
                other => Err(mismatch("decimal", other)),
            },
            _ => convert_numeric(value, declared),
        }
    }
}

fn mismatch(expected: &str, got: &TaggedValue) -> ArborError {
    ArborError::ValueMismatch {
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}

fn conversion(from: &TaggedValue, to: &str) -> ArborError {
    ArborError::PrimitiveConversion {
        from: from.kind_name().to_string(),
        to: to.to_string(),
    }
}

/// Generic numeric narrowing/widening across tag variants.
///
/// Integer targets require an exact fit; float targets accept any numeric
/// source but reject a narrowing that changes the value.
pub(crate) fn convert_numeric(value: &TaggedValue, target: &TypeSpec) -> Result<Datum> {
    // i128 covers the full range of every integer variant
    let as_int: Option<i128> = match value {
        TaggedValue::I8(v) => Some(*v as i128),
        TaggedValue::I16(v) => Some(*v as i128),
        TaggedValue::I32(v) => Some(*v as i128),
        TaggedValue::I64(v) => Some(*v as i128),
        TaggedValue::U8(v) => Some(*v as i128),
        TaggedValue::U16(v) => Some(*v as i128),
        TaggedValue::U32(v) => Some(*v as i128),
        TaggedValue::U64(v) => Some(*v as i128),
        _ => None,
    };

    match target {
        TypeSpec::I8 | TypeSpec::I16 | TypeSpec::I32 | TypeSpec::I64
        | TypeSpec::U8 | TypeSpec::U16 | TypeSpec::U32 | TypeSpec::U64 => {
            let int = as_int.ok_or_else(|| conversion(value, spec_name(target)))?;
            narrow_int(int, target).ok_or_else(|| conversion(value, spec_name(target)))
        }
        TypeSpec::F32 => match value {
            TaggedValue::F32(v) => Ok(Datum::F32(*v)),
            TaggedValue::F64(v) => {
                let narrowed = *v as f32;
                if narrowed as f64 == *v || v.is_nan() {
                    Ok(Datum::F32(narrowed))
                } else {
                    Err(conversion(value, "f32"))
                }
            }
            _ => {
                let int = as_int.ok_or_else(|| conversion(value, "f32"))?;
                Ok(Datum::F32(int as f32))
            }
        },
        TypeSpec::F64 => match value {
            TaggedValue::F64(v) => Ok(Datum::F64(*v)),
            TaggedValue::F32(v) => Ok(Datum::F64(*v as f64)),
            _ => {
                let int = as_int.ok_or_else(|| conversion(value, "f64"))?;
                Ok(Datum::F64(int as f64))
            }
        },
        _ => Err(conversion(value, spec_name(target))),
    }
}

fn narrow_int(int: i128, target: &TypeSpec) -> Option<Datum> {
    match target {
        TypeSpec::I8 => i8::try_from(int).ok().map(Datum::I8),
        TypeSpec::I16 => i16::try_from(int).ok().map(Datum::I16),
        TypeSpec::I32 => i32::try_from(int).ok().map(Datum::I32),
        TypeSpec::I64 => i64::try_from(int).ok().map(Datum::I64),
        TypeSpec::U8 => u8::try_from(int).ok().map(Datum::U8),
        TypeSpec::U16 => u16::try_from(int).ok().map(Datum::U16),
        TypeSpec::U32 => u32::try_from(int).ok().map(Datum::U32),
        TypeSpec::U64 => u64::try_from(int).ok().map(Datum::U64),
        _ => None,
    }
}

fn spec_name(ty: &TypeSpec) -> &'static str {
    match ty {
        TypeSpec::Bool => "bool",
        TypeSpec::I8 => "i8",
        TypeSpec::I16 => "i16",
        TypeSpec::I32 => "i32",
        TypeSpec::I64 => "i64",
        TypeSpec::U8 => "u8",
        TypeSpec::U16 => "u16",
        TypeSpec::U32 => "u32",
        TypeSpec::U64 => "u64",
        TypeSpec::F32 => "f32",
        TypeSpec::F64 => "f64",
        TypeSpec::Decimal => "decimal",
        TypeSpec::Str => "string",
        TypeSpec::Bytes => "bytes",
        TypeSpec::Time => "time",
        _ => "composite",
    }
}

/// UTC timestamps as microseconds since the Unix epoch
pub struct TemporalFormat;

impl Format for TemporalFormat {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Time)
    }

    fn serialize(
        &self,
        _declared: &TypeSpec,
        value: &Datum,
        _ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        match value {
            Datum::Time(t) => Ok(TaggedValue::I64(t.timestamp_micros())),
            other => Err(ArborError::ValueMismatch {
                expected: "time".to_string(),
                got: format!("{other:?}"),
            }),
        }
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        _declared: &TypeSpec,
        _de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let micros = value.as_i64().ok_or_else(|| mismatch("time", value))?;
        DateTime::<Utc>::from_timestamp_micros(micros)
            .map(Datum::Time)
            .ok_or_else(|| conversion(value, "time"))
    }
}

/// Enums serialize as their underlying integer value, not their symbolic
/// name. Renaming a member stays compatible; reordering or removing one is
/// a silent break.
pub struct EnumFormat;

impl Format for EnumFormat {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Enum(_))
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let (ty, raw) = match value {
            Datum::Enum { ty, value } => (*ty, *value),
            other => {
                return Err(ArborError::ValueMismatch {
                    expected: format!("{declared:?}"),
                    got: format!("{other:?}"),
                })
            }
        };
        let underlying = match &ser.registry.get(ty).kind {
            TypeKind::Enum { underlying } => underlying.clone(),
            TypeKind::Record { .. } => {
                return Err(ArborError::ValueMismatch {
                    expected: "enum descriptor".to_string(),
                    got: ser.registry.name_of(ty).to_string(),
                })
            }
        };
        match narrow_int(raw as i128, &underlying) {
            Some(Datum::I8(v)) => Ok(TaggedValue::I8(v)),
            Some(Datum::I16(v)) => Ok(TaggedValue::I16(v)),
            Some(Datum::I32(v)) => Ok(TaggedValue::I32(v)),
            Some(Datum::I64(v)) => Ok(TaggedValue::I64(v)),
            Some(Datum::U8(v)) => Ok(TaggedValue::U8(v)),
            Some(Datum::U16(v)) => Ok(TaggedValue::U16(v)),
            Some(Datum::U32(v)) => Ok(TaggedValue::U32(v)),
            Some(Datum::U64(v)) => Ok(TaggedValue::U64(v)),
            _ => Err(ArborError::PrimitiveConversion {
                from: format!("enum value {raw}"),
                to: spec_name(&underlying).to_string(),
            }),
        }
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        _de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let ty = match declared {
            TypeSpec::Enum(ty) => *ty,
            other => {
                return Err(ArborError::ValueMismatch {
                    expected: "enum".to_string(),
                    got: format!("{other:?}"),
                })
            }
        };
        let raw = value.as_i64().ok_or_else(|| mismatch("enum value", value))?;
        Ok(Datum::Enum { ty, value: raw })
    }
}
