//! Object formats: the positional (ordinal) record format and the
//! universal reflective fallback

use tracing::warn;

use crate::error::{ArborError, Result};
use crate::formats::Format;
use crate::graph::Datum;
use crate::registry::{FieldDescriptor, Layout, TypeKind, TypeRef, TypeRegistry, TypeSpec};
use crate::serializer::{Deserializer, Serializer};
use crate::value::{Compound, TaggedValue, ID_KEY};

/// Positional encoding for records marked ordinal: fields in declaration
/// order as a bare list, no field names, never `$id`/`$type`.
///
/// Smaller payload, but reordering or inserting fields in a later version
/// of the type is a breaking, silent format change. Only a count mismatch
/// is detectable, and that one is fatal.
pub struct OrdinalFormat;

impl OrdinalFormat {
    fn ordinal_ref(ty: &TypeSpec, registry: &TypeRegistry) -> Option<TypeRef> {
        match ty {
            TypeSpec::Object(handle) if registry.get(*handle).layout() == Layout::Ordinal => {
                Some(*handle)
            }
            _ => None,
        }
    }
}

impl Format for OrdinalFormat {
    fn name(&self) -> &'static str {
        "ordinal"
    }

    fn can_handle(&self, ty: &TypeSpec, registry: &TypeRegistry) -> bool {
        Self::ordinal_ref(ty, registry).is_some()
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let registry = ser.registry;
        let handle = Self::ordinal_ref(declared, registry).ok_or_else(|| {
            ArborError::ValueMismatch {
                expected: "ordinal record".to_string(),
                got: format!("{declared:?}"),
            }
        })?;
        let id = value.as_ref_id().ok_or_else(|| ArborError::ValueMismatch {
            expected: registry.name_of(handle).to_string(),
            got: format!("{value:?}"),
        })?;
        let graph = ser.graph;
        let node = graph.node(id);
        let descriptor = registry.get(node.ty);

        let mut out = Vec::with_capacity(node.fields.len());
        for (field, fd) in node.fields.iter().zip(descriptor.fields()) {
            out.push(ser.serialize(&fd.ty, field)?);
        }
        Ok(TaggedValue::List(out))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let registry = de.registry;
        let handle = Self::ordinal_ref(declared, registry).ok_or_else(|| {
            ArborError::ValueMismatch {
                expected: "ordinal record".to_string(),
                got: format!("{declared:?}"),
            }
        })?;
        let descriptor = registry.get(handle);
        let items = value
            .as_list()
            .ok_or_else(|| ArborError::ValueMismatch {
                expected: "positional list".to_string(),
                got: value.kind_name().to_string(),
            })?;
        if items.len() != descriptor.fields().len() {
            return Err(ArborError::FieldCountMismatch {
                type_name: descriptor.name.clone(),
                expected: descriptor.fields().len(),
                found: items.len(),
            });
        }

        let node = de.graph.alloc(handle, registry);
        for (index, (item, fd)) in items.iter().zip(descriptor.fields()).enumerate() {
            let datum = de.deserialize(item, &fd.ty)?;
            de.graph.set_field(node, index, datum);
        }
        Ok(Datum::Ref(node))
    }
}

/// Universal reflective fallback for reference types.
///
/// Serializes a node's fields by name, honoring the per-field condition
/// and null-skip gates; per-field failures are logged and skip only that
/// field. Deserialization allocates the shell and registers its `$id`
/// before populating fields, so cycles resolve to the partially-built
/// instance.
pub struct ObjectFormat;

impl ObjectFormat {
    fn find_field_value<'v>(
        compound: &'v Compound,
        fd: &FieldDescriptor,
    ) -> Option<&'v TaggedValue> {
        // Current name always wins, then a case-insensitive match, then
        // former names with newer registrations taking precedence.
        if let Some(v) = compound.get(&fd.name) {
            return Some(v);
        }
        if let Some(v) = compound.get_ignore_case(&fd.name) {
            return Some(v);
        }
        for former in fd.former_names.iter().rev() {
            if let Some(v) = compound.get(former) {
                return Some(v);
            }
            if let Some(v) = compound.get_ignore_case(former) {
                return Some(v);
            }
        }
        None
    }
}

impl Format for ObjectFormat {
    fn name(&self) -> &'static str {
        "object"
    }

    fn can_handle(&self, ty: &TypeSpec, _registry: &TypeRegistry) -> bool {
        matches!(ty, TypeSpec::Object(_) | TypeSpec::Any)
    }

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue> {
        let id = value.as_ref_id().ok_or_else(|| ArborError::ValueMismatch {
            expected: format!("{declared:?}"),
            got: format!("{value:?}"),
        })?;

        // Already seen: write only the reference id
        if let Some(existing) = ser.ctx.id_of(id) {
            let mut stub = Compound::with_capacity(1);
            stub.insert(ID_KEY, TaggedValue::U64(existing));
            return Ok(TaggedValue::Compound(stub));
        }

        let registry = ser.registry;
        let graph = ser.graph;
        let node = graph.node(id);
        let descriptor = registry.get(node.ty);

        let mut compound = Compound::with_capacity(descriptor.fields().len() + 1);
        // Register before recursing so cyclic children see this instance
        let assigned = ser.ctx.assign(id);
        compound.insert(ID_KEY, TaggedValue::U64(assigned));

        ser.ctx.begin_dependencies();
        for (field, fd) in node.fields.iter().zip(descriptor.fields()) {
            if let Some(gate) = &fd.condition {
                match descriptor
                    .field_index(gate)
                    .and_then(|i| node.fields[i].as_bool())
                {
                    Some(true) => {}
                    Some(false) => continue,
                    None => {
                        warn!(
                            field = %fd.name,
                            gate = %gate,
                            "condition gate is missing or not boolean, skipping field"
                        );
                        continue;
                    }
                }
            }
            if fd.skip_if_null && field.is_null() {
                continue;
            }
            match ser.serialize(&fd.ty, field) {
                Ok(tv) => compound.insert(fd.name.clone(), tv),
                Err(err) => {
                    warn!(field = %fd.name, error = %err, "field failed to serialize, skipping");
                }
            }
        }
        ser.ctx.end_dependencies();

        Ok(TaggedValue::Compound(compound))
    }

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum> {
        let registry = de.registry;
        let handle = match declared {
            TypeSpec::Object(handle) => *handle,
            TypeSpec::Any => {
                warn!("compound declared as plain object carries no $type, yielding null");
                return Ok(Datum::Null);
            }
            other => {
                return Err(ArborError::ValueMismatch {
                    expected: "object".to_string(),
                    got: format!("{other:?}"),
                })
            }
        };
        let compound = value
            .as_compound()
            .ok_or_else(|| ArborError::ValueMismatch {
                expected: registry.name_of(handle).to_string(),
                got: value.kind_name().to_string(),
            })?;

        let descriptor = registry.get(handle);
        let (is_abstract, has_default_ctor) = match &descriptor.kind {
            TypeKind::Record {
                is_abstract,
                has_default_ctor,
                ..
            } => (*is_abstract, *has_default_ctor),
            TypeKind::Enum { .. } => {
                return Err(ArborError::ValueMismatch {
                    expected: "record type".to_string(),
                    got: descriptor.name.clone(),
                })
            }
        };
        if is_abstract {
            warn!(type_name = %descriptor.name, "abstract target type without $type, yielding null");
            return Ok(Datum::Null);
        }
        if !has_default_ctor {
            return Err(ArborError::MissingConstructor(descriptor.name.clone()));
        }

        let node = de.graph.alloc(handle, registry);
        // Register under the written id before touching any field so back
        // references inside the fields resolve to this shell
        if let Some(written) = compound.get(ID_KEY).and_then(|v| v.as_u64()) {
            de.ctx.register(written, node);
        }

        de.ctx.begin_dependencies();
        for (index, fd) in descriptor.fields().iter().enumerate() {
            let Some(tv) = Self::find_field_value(compound, fd) else {
                continue;
            };
            match de.deserialize(tv, &fd.ty) {
                Ok(datum) => de.graph.set_field(node, index, datum),
                Err(err) => {
                    warn!(
                        field = %fd.name,
                        type_name = %descriptor.name,
                        error = %err,
                        "field failed to deserialize, leaving default"
                    );
                }
            }
        }
        de.ctx.end_dependencies();

        Ok(Datum::Ref(node))
    }
}
