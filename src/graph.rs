//! Object-graph arena
//!
//! Live object graphs are arenas of typed nodes addressed by integer
//! handles rather than native references. Cycle detection becomes a
//! handle-revisit check and identity equality is handle equality, which
//! keeps reference semantics observable without shared mutable pointers.

use chrono::{DateTime, Utc};

use crate::registry::{TypeRef, TypeRegistry, TypeSpec};
use crate::value::Dec128;

/// Handle to a node in a [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A live typed value
///
/// Scalars carry their own kind; structured values lean on the declared
/// [`TypeSpec`] of the slot holding them. Reference-typed slots hold
/// either `Null` or a `Ref` into the arena. Absent optionals are `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Dec128),
    Str(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    /// Enum constant: the registered enum type plus its integer value
    Enum { ty: TypeRef, value: i64 },
    Seq(Vec<Datum>),
    /// Multi-dimensional array stored flat in row-major order
    Array { dims: Vec<u32>, elems: Vec<Datum> },
    Dict(Vec<(Datum, Datum)>),
    Tuple { mutable: bool, items: Vec<Datum> },
    /// Reference to an arena node
    Ref(NodeId),
}

impl Datum {
    pub fn str(v: impl Into<String>) -> Self {
        Datum::Str(v.into())
    }

    pub fn as_ref_id(&self) -> Option<NodeId> {
        match self {
            Datum::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Default value for a declared type: zero, empty, epoch, or null
    pub fn default_for(ty: &TypeSpec) -> Datum {
        match ty {
            TypeSpec::Bool => Datum::Bool(false),
            TypeSpec::I8 => Datum::I8(0),
            TypeSpec::I16 => Datum::I16(0),
            TypeSpec::I32 => Datum::I32(0),
            TypeSpec::I64 => Datum::I64(0),
            TypeSpec::U8 => Datum::U8(0),
            TypeSpec::U16 => Datum::U16(0),
            TypeSpec::U32 => Datum::U32(0),
            TypeSpec::U64 => Datum::U64(0),
            TypeSpec::F32 => Datum::F32(0.0),
            TypeSpec::F64 => Datum::F64(0.0),
            TypeSpec::Decimal => Datum::Decimal(Dec128::zero()),
            TypeSpec::Str => Datum::Str(String::new()),
            TypeSpec::Bytes => Datum::Bytes(Vec::new()),
            TypeSpec::Time => Datum::Time(DateTime::<Utc>::UNIX_EPOCH),
            TypeSpec::Enum(ty) => Datum::Enum { ty: *ty, value: 0 },
            TypeSpec::Seq(_) => Datum::Seq(Vec::new()),
            TypeSpec::Array { rank, .. } => Datum::Array {
                dims: vec![0; *rank as usize],
                elems: Vec::new(),
            },
            TypeSpec::Dict { .. } => Datum::Dict(Vec::new()),
            TypeSpec::Tuple { mutable, items } => Datum::Tuple {
                mutable: *mutable,
                items: items.iter().map(Datum::default_for).collect(),
            },
            TypeSpec::Option(_) => Datum::Null,
            TypeSpec::Object(_) | TypeSpec::Any => Datum::Null,
        }
    }
}

/// One object instance: its registered type and one datum per field
#[derive(Debug, Clone)]
pub struct Node {
    pub ty: TypeRef,
    pub fields: Vec<Datum>,
}

/// Arena of object nodes
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a shell node with every field at its default value.
    ///
    /// This is the arena equivalent of a parameterless constructor: the
    /// shell exists (and is addressable) before any field is populated,
    /// which is what lets cycles resolve to a partially-built instance.
    pub fn alloc(&mut self, ty: TypeRef, registry: &TypeRegistry) -> NodeId {
        let fields = registry
            .get(ty)
            .fields()
            .iter()
            .map(|f| Datum::default_for(&f.ty))
            .collect();
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { ty, fields });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Field value by declaration index
    pub fn field(&self, id: NodeId, index: usize) -> &Datum {
        &self.node(id).fields[index]
    }

    pub fn set_field(&mut self, id: NodeId, index: usize, value: Datum) {
        self.node_mut(id).fields[index] = value;
    }

    /// Field value by name, via the node's descriptor
    pub fn field_by_name(&self, id: NodeId, name: &str, registry: &TypeRegistry) -> Option<&Datum> {
        let node = self.node(id);
        let index = registry.get(node.ty).field_index(name)?;
        node.fields.get(index)
    }

    pub fn set_field_by_name(
        &mut self,
        id: NodeId,
        name: &str,
        value: Datum,
        registry: &TypeRegistry,
    ) -> bool {
        let ty = self.node(id).ty;
        match registry.get(ty).field_index(name) {
            Some(index) => {
                self.set_field(id, index, value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDescriptor;

    #[test]
    fn alloc_fills_defaults() {
        let mut registry = TypeRegistry::new();
        let ty = registry.register_record(
            "Demo.Item",
            vec![
                FieldDescriptor::new("Count", TypeSpec::I32),
                FieldDescriptor::new("Label", TypeSpec::Str),
                FieldDescriptor::new("Next", TypeSpec::Any),
            ],
        );
        let mut graph = Graph::new();
        let id = graph.alloc(ty, &registry);
        assert_eq!(graph.field(id, 0), &Datum::I32(0));
        assert_eq!(graph.field(id, 1), &Datum::Str(String::new()));
        assert_eq!(graph.field(id, 2), &Datum::Null);
    }

    #[test]
    fn set_field_by_name_resolves_declaration_order() {
        let mut registry = TypeRegistry::new();
        let ty = registry.register_record(
            "Demo.Named",
            vec![
                FieldDescriptor::new("A", TypeSpec::I32),
                FieldDescriptor::new("B", TypeSpec::I32),
            ],
        );
        let mut graph = Graph::new();
        let id = graph.alloc(ty, &registry);
        assert!(graph.set_field_by_name(id, "B", Datum::I32(9), &registry));
        assert_eq!(graph.field(id, 1), &Datum::I32(9));
        assert!(!graph.set_field_by_name(id, "C", Datum::I32(1), &registry));
    }
}
