//! ARBOR Codec - self-describing object-graph serialization
//!
//! ARBOR converts arbitrary object graphs into a self-describing tagged
//! value tree (and back), supporting polymorphism, reference cycles,
//! schema evolution, and two physical encodings: a variable-length binary
//! format and a human-readable text format.
//!
//! # Example
//!
//! ```rust
//! use arbor_codec::{
//!     Datum, FieldDescriptor, FormatRegistry, Graph, Serializer, TypeRegistry, TypeSpec,
//!     to_text,
//! };
//!
//! let mut registry = TypeRegistry::new();
//! let point = registry.register_record(
//!     "Demo.Point",
//!     vec![
//!         FieldDescriptor::new("X", TypeSpec::I32),
//!         FieldDescriptor::new("Y", TypeSpec::I32),
//!     ],
//! );
//!
//! let mut graph = Graph::new();
//! let p = graph.alloc(point, &registry);
//! graph.set_field(p, 0, Datum::I32(3));
//! graph.set_field(p, 1, Datum::I32(4));
//!
//! let formats = FormatRegistry::standard();
//! let mut ser = Serializer::new(&registry, &formats, &graph);
//! let tree = ser.serialize(&TypeSpec::Object(point), &Datum::Ref(p)).unwrap();
//! assert_eq!(to_text(&tree), "{\"$id\":0Q,\"X\":3,\"Y\":4}");
//! ```

mod binary;
mod context;
mod error;
mod formats;
mod graph;
mod io;
mod json;
mod leb128;
mod lzw;
mod registry;
mod serializer;
mod text;
mod value;

pub use binary::*;
pub use context::*;
pub use error::*;
pub use formats::*;
pub use graph::*;
pub use io::*;
pub use json::*;
pub use leb128::*;
pub use lzw::*;
pub use registry::*;
pub use serializer::*;
pub use text::*;
pub use value::*;

#[cfg(test)]
mod tests;
