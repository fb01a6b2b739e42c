//! Type metadata registry
//!
//! All structural knowledge about serializable types lives here as explicit
//! per-type records built once at registration: field lists with rename and
//! gating policies, enum underlying kinds, and the named-vs-ordinal layout
//! choice. The dispatcher and the object formats consult these records
//! instead of inspecting live values.

use std::collections::HashMap;

use crate::error::{ArborError, Result};

/// Handle to a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub u32);

/// Declared type of a field or slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Str,
    Bytes,
    /// UTC timestamp
    Time,
    /// Registered enum type
    Enum(TypeRef),
    /// Ordered homogeneous sequence
    Seq(Box<TypeSpec>),
    /// Multi-dimensional array, row-major
    Array { rank: u8, elem: Box<TypeSpec> },
    /// Keyed dictionary
    Dict {
        key: Box<TypeSpec>,
        value: Box<TypeSpec>,
    },
    /// Fixed-arity positional product type
    Tuple {
        mutable: bool,
        items: Vec<TypeSpec>,
    },
    /// Optional wrapper around a value type
    Option(Box<TypeSpec>),
    /// Registered object (reference) type
    Object(TypeRef),
    /// Declared as the universal base type; actual type recovered via $type
    Any,
}

impl TypeSpec {
    pub fn seq(elem: TypeSpec) -> Self {
        TypeSpec::Seq(Box::new(elem))
    }

    pub fn array(rank: u8, elem: TypeSpec) -> Self {
        TypeSpec::Array {
            rank,
            elem: Box::new(elem),
        }
    }

    pub fn dict(key: TypeSpec, value: TypeSpec) -> Self {
        TypeSpec::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn optional(inner: TypeSpec) -> Self {
        TypeSpec::Option(Box::new(inner))
    }
}

/// Record layout choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Fields keyed by name in a compound
    Named,
    /// Positional field-name-free list; layout treated as stable across
    /// versions, so reordering or inserting fields is a silent break
    Ordinal,
}

/// Per-field metadata record
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    /// Former names accepted on deserialize, listed oldest first. The
    /// current name always wins; among former names newer entries win.
    pub former_names: Vec<String>,
    pub ty: TypeSpec,
    /// Skip the field on serialize when its value is null
    pub skip_if_null: bool,
    /// Name of a sibling boolean field gating serialization; the field is
    /// skipped entirely when that sibling is false
    pub condition: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            name: name.into(),
            former_names: Vec::new(),
            ty,
            skip_if_null: false,
            condition: None,
        }
    }

    pub fn formerly(mut self, name: impl Into<String>) -> Self {
        self.former_names.push(name.into());
        self
    }

    pub fn skip_if_null(mut self) -> Self {
        self.skip_if_null = true;
        self
    }

    pub fn condition(mut self, sibling: impl Into<String>) -> Self {
        self.condition = Some(sibling.into());
        self
    }
}

/// Structural kind of a registered type
#[derive(Debug, Clone)]
pub enum TypeKind {
    Record {
        fields: Vec<FieldDescriptor>,
        layout: Layout,
        /// Abstract types cannot be instantiated directly; deserializing
        /// one without a $type marker yields a logged null
        is_abstract: bool,
        /// Whether a shell instance can be constructed with default field
        /// values; absence is a fatal deserialize error
        has_default_ctor: bool,
    },
    Enum {
        /// Integer kind the enum is stored as on the wire
        underlying: TypeSpec,
    },
}

/// A registered type: fully-qualified name plus structural metadata
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    pub fn fields(&self) -> &[FieldDescriptor] {
        match &self.kind {
            TypeKind::Record { fields, .. } => fields,
            TypeKind::Enum { .. } => &[],
        }
    }

    pub fn layout(&self) -> Layout {
        match &self.kind {
            TypeKind::Record { layout, .. } => *layout,
            TypeKind::Enum { .. } => Layout::Named,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }
}

/// Registry of all serializable types, built once at process start
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeRef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, descriptor: TypeDescriptor) -> TypeRef {
        let handle = TypeRef(self.types.len() as u32);
        self.by_name.insert(descriptor.name.clone(), handle);
        self.types.push(descriptor);
        handle
    }

    /// Register a named-layout record with a default constructor
    pub fn register_record(
        &mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> TypeRef {
        self.register(TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Record {
                fields,
                layout: Layout::Named,
                is_abstract: false,
                has_default_ctor: true,
            },
        })
    }

    /// Register a positional (ordinal) record
    pub fn register_ordinal(
        &mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> TypeRef {
        self.register(TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Record {
                fields,
                layout: Layout::Ordinal,
                is_abstract: false,
                has_default_ctor: true,
            },
        })
    }

    /// Register an abstract base type; only concrete subtypes resolved via
    /// $type can be instantiated
    pub fn register_abstract(
        &mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> TypeRef {
        self.register(TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Record {
                fields,
                layout: Layout::Named,
                is_abstract: true,
                has_default_ctor: false,
            },
        })
    }

    /// Register a record that lacks a parameterless constructor
    pub fn register_without_ctor(
        &mut self,
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> TypeRef {
        self.register(TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Record {
                fields,
                layout: Layout::Named,
                is_abstract: false,
                has_default_ctor: false,
            },
        })
    }

    /// Register an enum with its underlying integer kind
    pub fn register_enum(&mut self, name: impl Into<String>, underlying: TypeSpec) -> TypeRef {
        self.register(TypeDescriptor {
            name: name.into(),
            kind: TypeKind::Enum { underlying },
        })
    }

    pub fn get(&self, handle: TypeRef) -> &TypeDescriptor {
        &self.types[handle.0 as usize]
    }

    pub fn name_of(&self, handle: TypeRef) -> &str {
        &self.get(handle).name
    }

    /// Resolve a fully-qualified type name, as carried by $type markers
    pub fn resolve(&self, name: &str) -> Result<TypeRef> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ArborError::TypeResolution(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
