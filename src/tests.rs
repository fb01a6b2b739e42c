//! Engine-level tests: dispatcher, formats, reference tracking, and the
//! full tree-to-bytes-and-back pipeline

use crate::*;
use chrono::DateTime;
use pretty_assertions::assert_eq;

fn roundtrip(declared: &TypeSpec, value: &Datum) -> (Graph, Datum) {
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(declared, value).unwrap();

    let mut out_graph = Graph::new();
    let restored = {
        let mut de = Deserializer::new(&registry, &formats, &mut out_graph);
        de.deserialize(&tree, declared).unwrap()
    };
    (out_graph, restored)
}

#[test]
fn primitive_roundtrip_boundary_values() {
    let cases: Vec<(TypeSpec, Datum)> = vec![
        (TypeSpec::Bool, Datum::Bool(true)),
        (TypeSpec::Bool, Datum::Bool(false)),
        (TypeSpec::I8, Datum::I8(i8::MIN)),
        (TypeSpec::I8, Datum::I8(-1)),
        (TypeSpec::I16, Datum::I16(i16::MAX)),
        (TypeSpec::I32, Datum::I32(0)),
        (TypeSpec::I32, Datum::I32(i32::MIN)),
        (TypeSpec::I64, Datum::I64(i64::MIN)),
        (TypeSpec::I64, Datum::I64(i64::MAX)),
        (TypeSpec::U8, Datum::U8(u8::MAX)),
        (TypeSpec::U16, Datum::U16(0)),
        (TypeSpec::U32, Datum::U32(u32::MAX)),
        (TypeSpec::U64, Datum::U64(u64::MAX)),
        (TypeSpec::F32, Datum::F32(f32::MIN_POSITIVE)),
        (TypeSpec::F64, Datum::F64(f64::INFINITY)),
        (TypeSpec::F64, Datum::F64(f64::NEG_INFINITY)),
        (TypeSpec::Str, Datum::str("boundary \u{2603}")),
        (TypeSpec::Str, Datum::str("")),
        (TypeSpec::Bytes, Datum::Bytes(vec![0, 127, 255])),
        (TypeSpec::Decimal, Datum::Decimal(Dec128::new(-12345, 3))),
    ];
    for (declared, value) in cases {
        let (_, restored) = roundtrip(&declared, &value);
        assert_eq!(restored, value, "kind {declared:?}");
    }
}

#[test]
fn float_nan_roundtrips() {
    let (_, restored) = roundtrip(&TypeSpec::F64, &Datum::F64(f64::NAN));
    match restored {
        Datum::F64(v) => assert!(v.is_nan()),
        other => panic!("unexpected datum: {other:?}"),
    }
}

#[test]
fn numeric_widening_and_lossy_narrowing() {
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);

    // An i32 payload widens into an i64 slot
    assert_eq!(
        de.deserialize(&TaggedValue::I32(7), &TypeSpec::I64).unwrap(),
        Datum::I64(7)
    );
    // And narrows into a u8 slot when it fits
    assert_eq!(
        de.deserialize(&TaggedValue::I32(200), &TypeSpec::U8).unwrap(),
        Datum::U8(200)
    );
    // A lossy narrowing is a conversion error
    let err = de
        .deserialize(&TaggedValue::I32(-1), &TypeSpec::U8)
        .unwrap_err();
    assert!(matches!(err, ArborError::PrimitiveConversion { .. }));
}

#[test]
fn temporal_roundtrip() {
    let t = DateTime::from_timestamp_micros(1_700_000_123_456_789).unwrap();
    let (_, restored) = roundtrip(&TypeSpec::Time, &Datum::Time(t));
    assert_eq!(restored, Datum::Time(t));
}

#[test]
fn optional_preserves_presence_and_absence() {
    let declared = TypeSpec::optional(TypeSpec::I32);
    let (_, absent) = roundtrip(&declared, &Datum::Null);
    assert_eq!(absent, Datum::Null);

    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&declared, &Datum::I32(5)).unwrap();
    // Present values are wrapped so codecs cannot confuse them with nulls
    assert_eq!(tree.get("value"), Some(&TaggedValue::I32(5)));

    let (_, present) = roundtrip(&declared, &Datum::I32(5));
    assert_eq!(present, Datum::I32(5));
}

#[test]
fn sequence_roundtrip() {
    let declared = TypeSpec::seq(TypeSpec::Str);
    let value = Datum::Seq(vec![Datum::str("a"), Datum::str("b"), Datum::str("c")]);
    let (_, restored) = roundtrip(&declared, &value);
    assert_eq!(restored, value);
}

#[test]
fn multi_dimensional_array_roundtrip() {
    let declared = TypeSpec::array(2, TypeSpec::I32);
    // 2x3 matrix flattened row-major
    let value = Datum::Array {
        dims: vec![2, 3],
        elems: (1..=6).map(Datum::I32).collect(),
    };
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&declared, &value).unwrap();
    assert!(tree.get("dimensions").is_some());
    assert_eq!(tree.get("elements").and_then(|v| v.as_list()).unwrap().len(), 6);

    let (_, restored) = roundtrip(&declared, &value);
    assert_eq!(restored, value);
}

#[test]
fn array_element_count_mismatch_is_fatal() {
    let declared = TypeSpec::array(2, TypeSpec::I32);
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let tree = TaggedValue::compound(vec![
        entry("dimensions", TaggedValue::List(vec![TaggedValue::I32(2), TaggedValue::I32(3)])),
        entry("elements", TaggedValue::List(vec![TaggedValue::I32(1)])),
    ]);
    assert!(de.deserialize(&tree, &declared).is_err());
}

#[test]
fn string_keyed_dictionary_uses_compact_form() {
    let declared = TypeSpec::dict(TypeSpec::Str, TypeSpec::I32);
    let value = Datum::Dict(vec![
        (Datum::str("one"), Datum::I32(1)),
        (Datum::str("two"), Datum::I32(2)),
    ]);
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&declared, &value).unwrap();
    // Keys are map keys directly, no entries wrapper
    assert_eq!(tree.get("one"), Some(&TaggedValue::I32(1)));
    assert!(tree.get("entries").is_none());

    let (_, restored) = roundtrip(&declared, &value);
    assert_eq!(restored, value);
}

#[test]
fn int_keyed_dictionary_uses_entries_form() {
    let declared = TypeSpec::dict(TypeSpec::I32, TypeSpec::Str);
    let value = Datum::Dict(vec![
        (Datum::I32(1), Datum::str("one")),
        (Datum::I32(2), Datum::str("two")),
    ]);
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&declared, &value).unwrap();
    assert_eq!(tree.get("entries").and_then(|v| v.as_list()).unwrap().len(), 2);

    let (_, restored) = roundtrip(&declared, &value);
    assert_eq!(restored, value);
}

#[test]
fn tuple_roundtrip_and_arity_check() {
    let declared = TypeSpec::Tuple {
        mutable: true,
        items: vec![TypeSpec::I32, TypeSpec::Str],
    };
    let value = Datum::Tuple {
        mutable: true,
        items: vec![Datum::I32(0), Datum::str("x")],
    };
    let registry = TypeRegistry::new();
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&declared, &value).unwrap();
    assert_eq!(tree.get("isMutableVariant"), Some(&TaggedValue::Bool(true)));
    assert_eq!(tree.get("count"), Some(&TaggedValue::I32(2)));
    // Default-valued slots are still written
    assert_eq!(
        tree.get("items").and_then(|v| v.get("Item1")),
        Some(&TaggedValue::I32(0))
    );

    let (_, restored) = roundtrip(&declared, &value);
    assert_eq!(restored, value);

    // A three-slot declaration rejects the two-slot payload fatally
    let wide = TypeSpec::Tuple {
        mutable: true,
        items: vec![TypeSpec::I32, TypeSpec::Str, TypeSpec::Bool],
    };
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let err = de.deserialize(&tree, &wide).unwrap_err();
    assert!(matches!(
        err,
        ArborError::TupleArityMismatch { expected: 3, found: 2 }
    ));
}

#[test]
fn enum_serializes_as_underlying_integer() {
    let mut registry = TypeRegistry::new();
    let color = registry.register_enum("Demo.Color", TypeSpec::U8);
    let formats = FormatRegistry::standard();
    let graph = Graph::new();
    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser
        .serialize(&TypeSpec::Enum(color), &Datum::Enum { ty: color, value: 2 })
        .unwrap();
    assert_eq!(tree, TaggedValue::U8(2));

    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let restored = de.deserialize(&tree, &TypeSpec::Enum(color)).unwrap();
    assert_eq!(restored, Datum::Enum { ty: color, value: 2 });
}

// ============================================================
// Object graph tests
// ============================================================

fn node_registry() -> (TypeRegistry, TypeRef) {
    let mut registry = TypeRegistry::new();
    let node = registry.register_record(
        "Demo.Node",
        vec![
            FieldDescriptor::new("Name", TypeSpec::Str),
            FieldDescriptor::new("Next", TypeSpec::Any),
        ],
    );
    (registry, node)
}

#[test]
fn acyclic_object_roundtrip() {
    let (registry, node_ty) = node_registry();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let a = graph.alloc(node_ty, &registry);
    graph.set_field(a, 0, Datum::str("A"));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(node_ty), &Datum::Ref(a)).unwrap();
    assert_eq!(tree.get("Name"), Some(&TaggedValue::str("A")));
    assert!(tree.get(ID_KEY).is_some());

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let restored = de.deserialize(&tree, &TypeSpec::Object(node_ty)).unwrap();
    let root = restored.as_ref_id().unwrap();
    assert_eq!(out.field(root, 0), &Datum::str("A"));
    assert_eq!(out.field(root, 1), &Datum::Null);
}

#[test]
fn two_node_cycle_preserves_identity() {
    // First serialized as {Name:"A", Next:null}, then Next is pointed at a
    // second node that points back; the decoded graph must close the loop
    // on the same instance, not a copy.
    let (registry, node_ty) = node_registry();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let first = graph.alloc(node_ty, &registry);
    graph.set_field(first, 0, Datum::str("A"));
    let second = graph.alloc(node_ty, &registry);
    graph.set_field(second, 0, Datum::str("B"));
    graph.set_field(second, 1, Datum::Ref(first));
    graph.set_field(first, 1, Datum::Ref(second));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(node_ty), &Datum::Ref(first)).unwrap();

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let restored = de.deserialize(&tree, &TypeSpec::Object(node_ty)).unwrap();

    let decoded_first = restored.as_ref_id().unwrap();
    let decoded_second = out.field(decoded_first, 1).as_ref_id().unwrap();
    let back = out.field(decoded_second, 1).as_ref_id().unwrap();
    assert_eq!(back, decoded_first, "Next.Next must be the first node itself");
    assert_eq!(out.field(decoded_first, 0), &Datum::str("A"));
    assert_eq!(out.field(decoded_second, 0), &Datum::str("B"));
}

#[test]
fn three_node_ring_roundtrips_by_identity() {
    let (registry, node_ty) = node_registry();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let nodes: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|name| {
            let id = graph.alloc(node_ty, &registry);
            graph.set_field(id, 0, Datum::str(*name));
            id
        })
        .collect();
    for i in 0..3 {
        graph.set_field(nodes[i], 1, Datum::Ref(nodes[(i + 1) % 3]));
    }

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(node_ty), &Datum::Ref(nodes[0])).unwrap();

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(node_ty))
        .unwrap()
        .as_ref_id()
        .unwrap();

    let mut cursor = root;
    for _ in 0..3 {
        cursor = out.field(cursor, 1).as_ref_id().unwrap();
    }
    assert_eq!(cursor, root, "three hops around the ring return to the root");
}

#[test]
fn shared_reference_serializes_once() {
    let (registry, node_ty) = node_registry();
    let mut registry = registry;
    let holder_ty = registry.register_record(
        "Demo.Holder",
        vec![
            FieldDescriptor::new("Left", TypeSpec::Object(node_ty)),
            FieldDescriptor::new("Right", TypeSpec::Object(node_ty)),
        ],
    );
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let shared = graph.alloc(node_ty, &registry);
    graph.set_field(shared, 0, Datum::str("shared"));
    let holder = graph.alloc(holder_ty, &registry);
    graph.set_field(holder, 0, Datum::Ref(shared));
    graph.set_field(holder, 1, Datum::Ref(shared));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(holder_ty), &Datum::Ref(holder)).unwrap();

    // Second occurrence is an $id stub with no payload
    let right = tree.get("Right").unwrap();
    assert_eq!(right.as_compound().unwrap().len(), 1);
    assert!(right.get(ID_KEY).is_some());

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(holder_ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(
        out.field(root, 0).as_ref_id().unwrap(),
        out.field(root, 1).as_ref_id().unwrap(),
        "both fields must resolve to the same instance"
    );
}

#[test]
fn field_policy_gates_compose() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_record(
        "Demo.Gated",
        vec![
            FieldDescriptor::new("Emit", TypeSpec::Bool),
            FieldDescriptor::new("Payload", TypeSpec::optional(TypeSpec::Str))
                .skip_if_null()
                .condition("Emit"),
        ],
    );
    let formats = FormatRegistry::standard();

    let serialize_with = |emit: bool, payload: Datum| {
        let mut graph = Graph::new();
        let id = graph.alloc(ty, &registry);
        graph.set_field(id, 0, Datum::Bool(emit));
        graph.set_field(id, 1, payload);
        let mut ser = Serializer::new(&registry, &formats, &graph);
        ser.serialize(&TypeSpec::Object(ty), &Datum::Ref(id)).unwrap()
    };

    // Condition gate false: omitted even when the value is present
    let tree = serialize_with(false, Datum::str("x"));
    assert!(tree.get("Payload").is_none());

    // Condition true but value null: the null-skip gate omits it
    let tree = serialize_with(true, Datum::Null);
    assert!(tree.get("Payload").is_none());

    // Both gates pass: included
    let tree = serialize_with(true, Datum::str("x"));
    assert!(tree.get("Payload").is_some());
}

#[test]
fn current_name_beats_former_names() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_record(
        "Demo.Renamed",
        vec![FieldDescriptor::new("Title", TypeSpec::Str).formerly("Caption")],
    );
    let formats = FormatRegistry::standard();

    // Payload carries both names: the current one wins
    let tree = TaggedValue::compound(vec![
        entry("Caption", TaggedValue::str("old")),
        entry("Title", TaggedValue::str("new")),
    ]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(graph.field(root, 0), &Datum::str("new"));

    // Only the former name present: it is accepted
    let tree = TaggedValue::compound(vec![entry("Caption", TaggedValue::str("old"))]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(graph.field(root, 0), &Datum::str("old"));
}

#[test]
fn case_insensitive_name_fallback() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_record(
        "Demo.Cased",
        vec![FieldDescriptor::new("Value", TypeSpec::I32)],
    );
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::compound(vec![entry("value", TaggedValue::I32(11))]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(graph.field(root, 0), &Datum::I32(11));
}

#[test]
fn failed_field_leaves_default_and_continues() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_record(
        "Demo.Partial",
        vec![
            FieldDescriptor::new("Broken", TypeSpec::I32),
            FieldDescriptor::new("Fine", TypeSpec::Str),
        ],
    );
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::compound(vec![
        entry("Broken", TaggedValue::str("not a number")),
        entry("Fine", TaggedValue::str("ok")),
    ]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(graph.field(root, 0), &Datum::I32(0), "failed field stays default");
    assert_eq!(graph.field(root, 1), &Datum::str("ok"), "sibling still populated");
}

#[test]
fn polymorphic_field_carries_type_marker() {
    let mut registry = TypeRegistry::new();
    let base = registry.register_abstract("Demo.Shape", vec![]);
    let circle = registry.register_record(
        "Demo.Circle",
        vec![FieldDescriptor::new("Radius", TypeSpec::F64)],
    );
    let formats = FormatRegistry::standard();

    let mut graph = Graph::new();
    let c = graph.alloc(circle, &registry);
    graph.set_field(c, 0, Datum::F64(2.0));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(base), &Datum::Ref(c)).unwrap();
    assert_eq!(tree.get(TYPE_KEY), Some(&TaggedValue::str("Demo.Circle")));

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(base))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(out.node(root).ty, circle);
    assert_eq!(out.field(root, 0), &Datum::F64(2.0));
}

#[test]
fn unresolvable_type_yields_null_without_aborting_siblings() {
    let mut registry = TypeRegistry::new();
    let holder = registry.register_record(
        "Demo.Holder2",
        vec![
            FieldDescriptor::new("Mystery", TypeSpec::Any),
            FieldDescriptor::new("Count", TypeSpec::I32),
        ],
    );
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::compound(vec![
        entry(
            "Mystery",
            TaggedValue::compound(vec![
                entry(TYPE_KEY, TaggedValue::str("Gone.Type")),
                entry("x", TaggedValue::I32(1)),
            ]),
        ),
        entry("Count", TaggedValue::I32(3)),
    ]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(holder))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(graph.field(root, 0), &Datum::Null);
    assert_eq!(graph.field(root, 1), &Datum::I32(3));
}

#[test]
fn abstract_target_without_marker_yields_null() {
    let mut registry = TypeRegistry::new();
    let base = registry.register_abstract("Demo.Base", vec![]);
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::compound(vec![entry("x", TaggedValue::I32(1))]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    assert_eq!(
        de.deserialize(&tree, &TypeSpec::Object(base)).unwrap(),
        Datum::Null
    );
}

#[test]
fn missing_constructor_is_fatal() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_without_ctor(
        "Demo.NoCtor",
        vec![FieldDescriptor::new("X", TypeSpec::I32)],
    );
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::compound(vec![entry("X", TaggedValue::I32(1))]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let err = de.deserialize(&tree, &TypeSpec::Object(ty)).unwrap_err();
    assert!(matches!(err, ArborError::MissingConstructor(_)));
}

// ============================================================
// Ordinal (positional) records
// ============================================================

#[test]
fn ordinal_record_is_a_bare_list() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_ordinal(
        "Demo.Vec2",
        vec![
            FieldDescriptor::new("X", TypeSpec::F32),
            FieldDescriptor::new("Y", TypeSpec::F32),
        ],
    );
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let v = graph.alloc(ty, &registry);
    graph.set_field(v, 0, Datum::F32(1.0));
    graph.set_field(v, 1, Datum::F32(-2.0));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(ty), &Datum::Ref(v)).unwrap();
    // No field names, no $id, no $type
    assert_eq!(
        tree,
        TaggedValue::List(vec![TaggedValue::F32(1.0), TaggedValue::F32(-2.0)])
    );

    let mut out = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut out);
    let root = de
        .deserialize(&tree, &TypeSpec::Object(ty))
        .unwrap()
        .as_ref_id()
        .unwrap();
    assert_eq!(out.field(root, 1), &Datum::F32(-2.0));
}

#[test]
fn ordinal_field_count_mismatch_is_fatal() {
    let mut registry = TypeRegistry::new();
    let ty = registry.register_ordinal(
        "Demo.Vec2b",
        vec![
            FieldDescriptor::new("X", TypeSpec::F32),
            FieldDescriptor::new("Y", TypeSpec::F32),
        ],
    );
    let formats = FormatRegistry::standard();
    let tree = TaggedValue::List(vec![
        TaggedValue::F32(1.0),
        TaggedValue::F32(2.0),
        TaggedValue::F32(3.0),
    ]);
    let mut graph = Graph::new();
    let mut de = Deserializer::new(&registry, &formats, &mut graph);
    let err = de.deserialize(&tree, &TypeSpec::Object(ty)).unwrap_err();
    assert!(matches!(
        err,
        ArborError::FieldCountMismatch { expected: 2, found: 3, .. }
    ));
}

// ============================================================
// Full pipeline: graph -> tree -> bytes/text -> tree -> graph
// ============================================================

#[test]
fn full_pipeline_through_both_binary_profiles_and_text() {
    let (registry, node_ty) = node_registry();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let first = graph.alloc(node_ty, &registry);
    graph.set_field(first, 0, Datum::str("first"));
    let second = graph.alloc(node_ty, &registry);
    graph.set_field(second, 0, Datum::str("second"));
    graph.set_field(second, 1, Datum::Ref(first));
    graph.set_field(first, 1, Datum::Ref(second));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    let tree = ser.serialize(&TypeSpec::Object(node_ty), &Datum::Ref(first)).unwrap();

    let reload = |tree: &TaggedValue| {
        let mut out = Graph::new();
        let root = {
            let mut de = Deserializer::new(&registry, &formats, &mut out);
            de.deserialize(tree, &TypeSpec::Object(node_ty))
                .unwrap()
                .as_ref_id()
                .unwrap()
        };
        let hop = out.field(root, 1).as_ref_id().unwrap();
        assert_eq!(out.field(hop, 1).as_ref_id().unwrap(), root);
        assert_eq!(out.field(root, 0), &Datum::str("first"));
    };

    for profile in [BinaryProfile::Performance, BinaryProfile::Size] {
        let bytes = to_bytes(&tree, profile);
        reload(&from_bytes(&bytes, profile).unwrap());
    }
    reload(&from_text(&to_text(&tree)).unwrap());
}

#[test]
fn text_form_puts_reserved_keys_first() {
    let (registry, node_ty) = node_registry();
    let formats = FormatRegistry::standard();
    let mut graph = Graph::new();
    let n = graph.alloc(node_ty, &registry);
    graph.set_field(n, 0, Datum::str("n"));

    let mut ser = Serializer::new(&registry, &formats, &graph);
    // Declared as Any so the marker is embedded
    let tree = ser.serialize(&TypeSpec::Any, &Datum::Ref(n)).unwrap();
    let text = to_text(&tree);
    assert!(
        text.starts_with("{\"$id\":0Q,\"$type\":\"Demo.Node\""),
        "got: {text}"
    );
}
