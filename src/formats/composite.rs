//! Collection, dictionary, tuple, and optional formats

use crate::error::{ArborError, Result};
use crate::formats::Format;
use crate::graph::Datum;
use crate::registry::{TypeRegistry, TypeSpec};
use crate::serializer::{Deserializer, Serializer};
use crate::value::{Compound, TaggedValue};

fn shape_mismatch(expected: &str, got: &TaggedValue) -> ArborError {
    ArborError::ValueMismatch {
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}

fn datum_mismatch(expected: &str, got: &Datum) -> ArborError {
    ArborError::ValueMismatch {
        expected: expected.to_string(),
        got: format!("{got:?}"),
    }
}

/// Optional value types: null for absent, a single-field compound for
/// present. The wrapper keeps presence and absence distinguishable in
/// codecs that treat raw values and nulls the same way.
pub struct OptionalFormat;

impl Format for OptionalFormat {
    fn name(&self) -> &'static str {
        "optional"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Option(_))
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let inner_ty = match declared {
            TypeSpec::Option(inner) => inner,
            other => return Err(datum_mismatch(&format!("{other:?}"), value)),
        };
        let mut compound = Compound::with_capacity(1);
        compound.insert("value", ser.serialize(inner_ty, value)?);
        Ok(TaggedValue::Compound(compound))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let inner_ty = match declared {
            TypeSpec::Option(inner) => inner,
            _ => return Err(shape_mismatch("optional", value)),
        };
        let compound = value
            .as_compound()
            .ok_or_else(|| shape_mismatch("optional compound", value))?;
        let inner = compound
            .get("value")
            .ok_or_else(|| shape_mismatch("compound with a value field", value))?;
        de.deserialize(inner, inner_ty)
    }
}

/// Homogeneous sequences serialize element-wise into a list
pub struct SequenceFormat;

impl Format for SequenceFormat {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Seq(_))
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let elem_ty = match declared {
            TypeSpec::Seq(elem) => elem,
            _ => return Err(datum_mismatch("sequence", value)),
        };
        let items = match value {
            Datum::Seq(items) => items,
            other => return Err(datum_mismatch("sequence", other)),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(ser.serialize(elem_ty, item)?);
        }
        Ok(TaggedValue::List(out))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let elem_ty = match declared {
            TypeSpec::Seq(elem) => elem,
            _ => return Err(shape_mismatch("sequence", value)),
        };
        let items = value
            .as_list()
            .ok_or_else(|| shape_mismatch("list", value))?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(de.deserialize(item, elem_ty)?);
        }
        Ok(Datum::Seq(out))
    }
}

/// Multi-dimensional arrays: dimension sizes plus a row-major flattened
/// element list inside a compound
pub struct ArrayFormat;

impl Format for ArrayFormat {
    fn name(&self) -> &'static str {
        "array"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Array { .. })
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let elem_ty = match declared {
            TypeSpec::Array { elem, .. } => elem,
            _ => return Err(datum_mismatch("array", value)),
        };
        let (dims, elems) = match value {
            Datum::Array { dims, elems } => (dims, elems),
            other => return Err(datum_mismatch("array", other)),
        };
        let expected: usize = dims.iter().map(|&d| d as usize).product();
        if expected != elems.len() {
            return Err(ArborError::ValueMismatch {
                expected: format!("{expected} elements for dimensions {dims:?}"),
                got: format!("{} elements", elems.len()),
            });
        }

        let dimensions = dims.iter().map(|&d| TaggedValue::I32(d as i32)).collect();
        let mut elements = Vec::with_capacity(elems.len());
        for elem in elems {
            elements.push(ser.serialize(elem_ty, elem)?);
        }

        let mut compound = Compound::with_capacity(2);
        compound.insert("dimensions", TaggedValue::List(dimensions));
        compound.insert("elements", TaggedValue::List(elements));
        Ok(TaggedValue::Compound(compound))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let elem_ty = match declared {
            TypeSpec::Array { elem, .. } => elem,
            _ => return Err(shape_mismatch("array", value)),
        };
        let compound = value
            .as_compound()
            .ok_or_else(|| shape_mismatch("array compound", value))?;
        let dims_list = compound
            .get("dimensions")
            .and_then(|v| v.as_list())
            .ok_or_else(|| shape_mismatch("dimensions list", value))?;
        let elems_list = compound
            .get("elements")
            .and_then(|v| v.as_list())
            .ok_or_else(|| shape_mismatch("elements list", value))?;

        let mut dims = Vec::with_capacity(dims_list.len());
        for d in dims_list {
            let size = d
                .as_i64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| shape_mismatch("dimension size", d))?;
            dims.push(size);
        }
        let expected: usize = dims.iter().map(|&d| d as usize).product();
        if expected != elems_list.len() {
            return Err(ArborError::ValueMismatch {
                expected: format!("{expected} elements for dimensions {dims:?}"),
                got: format!("{} elements", elems_list.len()),
            });
        }

        // Elements were flattened row-major, so the flat order is already
        // the reconstruction order.
        let mut elems = Vec::with_capacity(elems_list.len());
        for item in elems_list {
            elems.push(de.deserialize(item, elem_ty)?);
        }
        Ok(Datum::Array { dims, elems })
    }
}

/// Dictionaries: compact key-to-value compound when keys are strings,
/// otherwise a compound holding an `entries` list of key/value pairs
pub struct DictionaryFormat;

impl Format for DictionaryFormat {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Dict { .. })
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let (key_ty, value_ty) = match declared {
            TypeSpec::Dict { key, value } => (key.as_ref(), value.as_ref()),
            _ => return Err(datum_mismatch("dictionary", value)),
        };
        let pairs = match value {
            Datum::Dict(pairs) => pairs,
            other => return Err(datum_mismatch("dictionary", other)),
        };

        if *key_ty == TypeSpec::Str {
            let mut compound = Compound::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = match k {
                    Datum::Str(s) => s.clone(),
                    other => return Err(datum_mismatch("string key", other)),
                };
                compound.insert(key, ser.serialize(value_ty, v)?);
            }
            return Ok(TaggedValue::Compound(compound));
        }

        // Non-string keys cannot be compound map keys
        let mut entries = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let mut pair = Compound::with_capacity(2);
            pair.insert("key", ser.serialize(key_ty, k)?);
            pair.insert("value", ser.serialize(value_ty, v)?);
            entries.push(TaggedValue::Compound(pair));
        }
        let mut compound = Compound::with_capacity(1);
        compound.insert("entries", TaggedValue::List(entries));
        Ok(TaggedValue::Compound(compound))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let (key_ty, value_ty) = match declared {
            TypeSpec::Dict { key, value } => (key.as_ref(), value.as_ref()),
            _ => return Err(shape_mismatch("dictionary", value)),
        };
        let compound = value
            .as_compound()
            .ok_or_else(|| shape_mismatch("dictionary compound", value))?;

        if *key_ty == TypeSpec::Str {
            let mut pairs = Vec::with_capacity(compound.len());
            for (k, v) in compound.iter() {
                pairs.push((Datum::Str(k.to_string()), de.deserialize(v, value_ty)?));
            }
            return Ok(Datum::Dict(pairs));
        }

        let entries = compound
            .get("entries")
            .and_then(|v| v.as_list())
            .ok_or_else(|| shape_mismatch("entries list", value))?;
        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = entry
                .as_compound()
                .ok_or_else(|| shape_mismatch("entry compound", entry))?;
            let k = pair
                .get("key")
                .ok_or_else(|| shape_mismatch("entry key", entry))?;
            let v = pair
                .get("value")
                .ok_or_else(|| shape_mismatch("entry value", entry))?;
            pairs.push((de.deserialize(k, key_ty)?, de.deserialize(v, value_ty)?));
        }
        Ok(Datum::Dict(pairs))
    }
}

/// Fixed-arity positional product types, mutable and immutable variants
pub struct TupleFormat;

impl Format for TupleFormat {
    fn name(&self) -> &'static str {
        "tuple"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Tuple { .. })
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let item_tys = match declared {
            TypeSpec::Tuple { items, .. } => items,
            _ => return Err(datum_mismatch("tuple", value)),
        };
        let (mutable, items) = match value {
            Datum::Tuple { mutable, items } => (*mutable, items),
            other => return Err(datum_mismatch("tuple", other)),
        };
        if items.len() != item_tys.len() {
            return Err(ArborError::TupleArityMismatch {
                expected: item_tys.len(),
                found: items.len(),
            });
        }

        // Default-valued slots are still written; positional slots have no
        // notion of absence.
        let mut slots = Compound::with_capacity(items.len());
        for (index, (item, ty)) in items.iter().zip(item_tys).enumerate() {
            slots.insert(format!("Item{}", index + 1), ser.serialize(ty, item)?);
        }

        let mut compound = Compound::with_capacity(3);
        compound.insert("isMutableVariant", TaggedValue::Bool(mutable));
        compound.insert("count", TaggedValue::I32(items.len() as i32));
        compound.insert("items", TaggedValue::Compound(slots));
        Ok(TaggedValue::Compound(compound))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let (mutable_decl, item_tys) = match declared {
            TypeSpec::Tuple { mutable, items } => (*mutable, items),
            _ => return Err(shape_mismatch("tuple", value)),
        };
        let compound = value
            .as_compound()
            .ok_or_else(|| shape_mismatch("tuple compound", value))?;

        let count = compound
            .get("count")
            .and_then(|v| v.as_i64())
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| shape_mismatch("tuple count", value))?;
        if count != item_tys.len() {
            return Err(ArborError::TupleArityMismatch {
                expected: item_tys.len(),
                found: count,
            });
        }

        let mutable = compound
            .get("isMutableVariant")
            .and_then(|v| v.as_bool())
            .unwrap_or(mutable_decl);
        let slots = compound
            .get("items")
            .and_then(|v| v.as_compound())
            .ok_or_else(|| shape_mismatch("tuple items", value))?;

        let mut items = Vec::with_capacity(count);
        for (index, ty) in item_tys.iter().enumerate() {
            let key = format!("Item{}", index + 1);
            let slot = slots
                .get(&key)
                .ok_or_else(|| shape_mismatch(&key, value))?;
            items.push(de.deserialize(slot, ty)?);
        }
        Ok(Datum::Tuple { mutable, items })
    }
}
