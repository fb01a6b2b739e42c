//! Dispatcher: type resolution, polymorphism markers, reference
//! short-circuiting, and format selection
//!
//! `Serializer` and `Deserializer` are the two public entry points of the
//! engine. Each owns a fresh [`SerializationContext`] for exactly one
//! top-level call; formats recurse back into the dispatcher for nested
//! values, so the call tree mirrors the object graph.

use std::collections::HashMap;

use tracing::warn;

use crate::context::SerializationContext;
use crate::error::Result;
use crate::formats::FormatRegistry;
use crate::graph::{Datum, Graph};
use crate::registry::{TypeRegistry, TypeSpec};
use crate::value::{TaggedValue, ID_KEY, TYPE_KEY};

/// Serializes live graph values into tagged value trees
pub struct Serializer<'a> {
    pub registry: &'a TypeRegistry,
    formats: &'a FormatRegistry,
    pub graph: &'a Graph,
    pub ctx: SerializationContext,
    cache: HashMap<TypeSpec, usize>,
}

impl<'a> Serializer<'a> {
    pub fn new(registry: &'a TypeRegistry, formats: &'a FormatRegistry, graph: &'a Graph) -> Self {
        Self {
            registry,
            formats,
            graph,
            ctx: SerializationContext::new(),
            cache: HashMap::new(),
        }
    }

    /// Serialize one value declared as `declared`.
    ///
    /// Null short-circuits. Otherwise the actual runtime type is resolved
    /// (for references, the node's registered type), the first matching
    /// format takes over, and when the actual type differs from the
    /// declared one the resulting compound is stamped with `$type` so the
    /// concrete type is recoverable on the way back.
    pub fn serialize(&mut self, declared: &TypeSpec, value: &Datum) -> Result<TaggedValue> {
        if value.is_null() {
            return Ok(TaggedValue::Null);
        }

        let actual = self.actual_type(declared, value);

        // A back reference serializes as an $id stub; its type is already
        // known from the defining occurrence, so no marker is needed.
        let needs_marker = match (declared, value) {
            (TypeSpec::Object(decl), Datum::Ref(id)) => {
                *decl != self.graph.node(*id).ty && self.ctx.id_of(*id).is_none()
            }
            (TypeSpec::Any, Datum::Ref(id)) => self.ctx.id_of(*id).is_none(),
            _ => false,
        };

        let formats = self.formats;
        let index = formats.resolve_index(&actual, self.registry, &mut self.cache)?;
        let mut result = formats.get(index).serialize(&actual, value, self)?;

        if needs_marker {
            if let (TaggedValue::Compound(compound), Datum::Ref(id)) = (&mut result, value) {
                let name = self.registry.name_of(self.graph.node(*id).ty).to_string();
                compound.insert(TYPE_KEY, TaggedValue::Str(name));
            }
        }
        Ok(result)
    }

    /// Resolve the actual type used for format dispatch.
    ///
    /// Scalars carry their own kind; references carry their node's
    /// registered type; structured values keep the declared shape (or a
    /// fully `Any`-typed shape when the declaration gives none).
    fn actual_type(&self, declared: &TypeSpec, value: &Datum) -> TypeSpec {
        if let Datum::Ref(id) = value {
            return TypeSpec::Object(self.graph.node(*id).ty);
        }
        // The optional wrapper owns the presence/absence encoding and must
        // not be bypassed by the inner value's own kind.
        if let TypeSpec::Option(_) = declared {
            return declared.clone();
        }
        match value {
            Datum::Bool(_) => TypeSpec::Bool,
            Datum::I8(_) => TypeSpec::I8,
            Datum::I16(_) => TypeSpec::I16,
            Datum::I32(_) => TypeSpec::I32,
            Datum::I64(_) => TypeSpec::I64,
            Datum::U8(_) => TypeSpec::U8,
            Datum::U16(_) => TypeSpec::U16,
            Datum::U32(_) => TypeSpec::U32,
            Datum::U64(_) => TypeSpec::U64,
            Datum::F32(_) => TypeSpec::F32,
            Datum::F64(_) => TypeSpec::F64,
            Datum::Decimal(_) => TypeSpec::Decimal,
            Datum::Str(_) => TypeSpec::Str,
            Datum::Bytes(_) => TypeSpec::Bytes,
            Datum::Time(_) => TypeSpec::Time,
            Datum::Enum { ty, .. } => TypeSpec::Enum(*ty),
            Datum::Seq(_) => match declared {
                TypeSpec::Seq(_) => declared.clone(),
                _ => TypeSpec::seq(TypeSpec::Any),
            },
            Datum::Array { dims, .. } => match declared {
                TypeSpec::Array { .. } => declared.clone(),
                _ => TypeSpec::array(dims.len() as u8, TypeSpec::Any),
            },
            Datum::Dict(_) => match declared {
                TypeSpec::Dict { .. } => declared.clone(),
                _ => TypeSpec::dict(TypeSpec::Any, TypeSpec::Any),
            },
            Datum::Tuple { mutable, items } => match declared {
                TypeSpec::Tuple { .. } => declared.clone(),
                _ => TypeSpec::Tuple {
                    mutable: *mutable,
                    items: vec![TypeSpec::Any; items.len()],
                },
            },
            Datum::Null | Datum::Ref(_) => declared.clone(),
        }
    }
}

/// Reconstructs live graph values from tagged value trees
pub struct Deserializer<'a> {
    pub registry: &'a TypeRegistry,
    formats: &'a FormatRegistry,
    pub graph: &'a mut Graph,
    pub ctx: SerializationContext,
    cache: HashMap<TypeSpec, usize>,
}

impl<'a> Deserializer<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        formats: &'a FormatRegistry,
        graph: &'a mut Graph,
    ) -> Self {
        Self {
            registry,
            formats,
            graph,
            ctx: SerializationContext::new(),
            cache: HashMap::new(),
        }
    }

    /// Deserialize one tree node declared as `declared`.
    ///
    /// A compound whose `$id` is already registered short-circuits to the
    /// existing node. A `$type` marker overrides the declared type; an
    /// unresolvable type name is logged and yields null rather than
    /// aborting the surrounding graph.
    pub fn deserialize(&mut self, value: &TaggedValue, declared: &TypeSpec) -> Result<Datum> {
        if value.is_null() {
            return Ok(Datum::Null);
        }

        let mut dispatch = declared.clone();
        if let Some(compound) = value.as_compound() {
            if let Some(id) = compound.get(ID_KEY).and_then(|v| v.as_u64()) {
                if let Some(node) = self.ctx.resolve(id) {
                    return Ok(Datum::Ref(node));
                }
            }
            if let Some(name) = compound.get(TYPE_KEY).and_then(|v| v.as_str()) {
                match self.registry.resolve(name) {
                    Ok(ty) => dispatch = TypeSpec::Object(ty),
                    Err(err) => {
                        warn!(type_name = name, error = %err, "unresolvable $type, yielding null");
                        return Ok(Datum::Null);
                    }
                }
            }
        }

        let formats = self.formats;
        let index = formats.resolve_index(&dispatch, self.registry, &mut self.cache)?;
        formats.get(index).deserialize(value, &dispatch, self)
    }
}
