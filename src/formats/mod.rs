//! Format registry: pluggable per-shape converters
//!
//! Each format is a stateless capability object deciding whether it can
//! handle a declared type and, if so, converting between live data and the
//! tagged value tree. Dispatch order matters: most specific first, the
//! reflective object fallback last, so every type resolves to something.
//! Resolution results are cached per declared type to avoid repeated
//! linear scans.

mod composite;
mod object;
mod primitive;

pub use composite::{ArrayFormat, DictionaryFormat, OptionalFormat, SequenceFormat, TupleFormat};
pub use object::{ObjectFormat, OrdinalFormat};
pub use primitive::{EnumFormat, PrimitiveFormat, TemporalFormat};

use std::collections::HashMap;

use crate::error::{ArborError, Result};
use crate::graph::Datum;
use crate::registry::{TypeRegistry, TypeSpec};
use crate::serializer::{Deserializer, Serializer};
use crate::value::TaggedValue;

/// A pluggable converter for one family of declared types
///
/// Formats are stateless and registered once at startup; all per-call
/// state lives in the dispatcher they are handed back.
pub trait Format: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    fn can_handle(&self, ty: &TypeSpec, registry: &TypeRegistry) -> bool;

    fn serialize(
        &self,
        declared: &TypeSpec,
        value: &Datum,
        ser: &mut Serializer<'_>,
    ) -> Result<TaggedValue>;

    fn deserialize(
        &self,
        value: &TaggedValue,
        declared: &TypeSpec,
        de: &mut Deserializer<'_>,
    ) -> Result<Datum>;
}

/// Ordered list of formats with a guaranteed universal fallback
pub struct FormatRegistry {
    formats: Vec<Box<dyn Format>>,
}

impl FormatRegistry {
    /// The standard format stack, most specific first
    pub fn standard() -> Self {
        Self {
            formats: vec![
                Box::new(PrimitiveFormat),
                Box::new(TemporalFormat),
                Box::new(EnumFormat),
                Box::new(OptionalFormat),
                Box::new(ArrayFormat),
                Box::new(SequenceFormat),
                Box::new(DictionaryFormat),
                Box::new(TupleFormat),
                Box::new(OrdinalFormat),
                Box::new(ObjectFormat),
            ],
        }
    }

    /// Insert a custom format ahead of the existing stack
    pub fn prepend(&mut self, format: Box<dyn Format>) {
        self.formats.insert(0, format);
    }

    pub fn get(&self, index: usize) -> &dyn Format {
        self.formats[index].as_ref()
    }

    /// First format whose `can_handle` accepts `ty`, memoized in `cache`
    pub fn resolve_index(
        &self,
        ty: &TypeSpec,
        registry: &TypeRegistry,
        cache: &mut HashMap<TypeSpec, usize>,
    ) -> Result<usize> {
        if let Some(&index) = cache.get(ty) {
            return Ok(index);
        }
        let index = self
            .formats
            .iter()
            .position(|f| f.can_handle(ty, registry))
            .ok_or_else(|| ArborError::ValueMismatch {
                expected: "a registered format".to_string(),
                got: format!("{ty:?}"),
            })?;
        cache.insert(ty.clone(), index);
        Ok(index)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_always_matches_objects() {
        let registry = TypeRegistry::new();
        let formats = FormatRegistry::standard();
        let mut cache = HashMap::new();
        let index = formats
            .resolve_index(&TypeSpec::Any, &registry, &mut cache)
            .unwrap();
        assert_eq!(formats.get(index).name(), "object");
    }

    #[test]
    fn dispatch_is_cached() {
        let registry = TypeRegistry::new();
        let formats = FormatRegistry::standard();
        let mut cache = HashMap::new();
        let first = formats
            .resolve_index(&TypeSpec::I32, &registry, &mut cache)
            .unwrap();
        assert_eq!(cache.len(), 1);
        let second = formats
            .resolve_index(&TypeSpec::I32, &registry, &mut cache)
            .unwrap();
        assert_eq!(first, second);
    }
}
