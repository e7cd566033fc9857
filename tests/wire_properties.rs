use std::collections::BTreeMap;

use proptest::prelude::*;

use protium::error::{DecodeError, DescriptorError, EncodeError, VerifyErrorKind};
use protium::schema::{Enum, Field, Root, ScalarType, Type, TypeId};
use protium::util::{bytes_of_hex, hex_of_bytes};
use protium::{CodecMode, MapKey, Message, Value, WideInt, Writer};

fn schema(mode: CodecMode) -> (Root, TypeId) {
    let mut root = Root::new();
    let mut level = Enum::new("test.Level");
    level.add_value("LOW", 0).unwrap().add_value("MID", 1).unwrap().add_value("HIGH", 10).unwrap();
    root.add_enum(level).unwrap();
    let mut inner = Type::new("test.Inner");
    inner.add_field(Field::new("z", 1, "sint64")).unwrap()
        .add_field(Field::new("f", 2, "fixed64")).unwrap()
        .add_field(Field::new("sf", 3, "sfixed64")).unwrap()
        .add_field(Field::new("on", 4, "bool")).unwrap();
    root.add_type(inner).unwrap();
    let mut t = Type::new("test.Scalars");
    t.add_field(Field::new("i32", 1, "int32")).unwrap()
        .add_field(Field::new("s64", 2, "sint64")).unwrap()
        .add_field(Field::new("u64", 3, "uint64")).unwrap()
        .add_field(Field::new("f64", 4, "double")).unwrap()
        .add_field(Field::new("text", 5, "string")).unwrap()
        .add_field(Field::new("flag", 6, "bool")).unwrap()
        .add_field(Field::new("nums", 7, "int32").repeated().packed(true)).unwrap()
        .add_field(Field::new("counts", 8, "int32").map(ScalarType::String)).unwrap()
        .add_field(Field::new("sf32", 9, "sfixed32")).unwrap()
        .add_field(Field::new("u32", 10, "uint32")).unwrap()
        .add_field(Field::new("inner", 11, "Inner")).unwrap()
        .add_field(Field::new("inners", 12, "Inner").repeated()).unwrap()
        .add_field(Field::new("level", 13, "Level")).unwrap()
        .add_field(Field::new("by_z", 14, "Inner").map(ScalarType::Sint64)).unwrap()
        .add_field(Field::new("by_f", 15, "int64").map(ScalarType::Fixed64)).unwrap()
        .add_field(Field::new("by_flag", 16, "Level").map(ScalarType::Bool)).unwrap()
        .add_field(Field::new("by_s32", 17, "string").map(ScalarType::Sint32)).unwrap();
    let id = root.add_type(t).unwrap();
    assert_eq!(root.resolve(), 0);
    root.set_mode(mode);
    (root, id)
}

fn arb_inner() -> impl Strategy<Value = Message> {
    (
        proptest::option::of(any::<i64>()),
        proptest::option::of(any::<u64>()),
        proptest::option::of(any::<i64>()),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(z, f, sf, on)| {
            let mut msg = Message::new();
            let fields = [
                (1, z.map(Value::from)),
                (2, f.map(Value::from)),
                (3, sf.map(Value::from)),
                (4, on.map(Value::from)),
            ];
            for (id, value) in fields {
                if let Some(value) = value {
                    msg.set(id, value);
                }
            }
            msg
        })
}

fn set_map<K, V>(msg: &mut Message, id: u32, entries: BTreeMap<K, V>, entry: impl Fn(K, V) -> (MapKey, Value)) {
    if !entries.is_empty() {
        let map: BTreeMap<MapKey, Value> = entries.into_iter().map(|(k, v)| entry(k, v)).collect();
        msg.set(id, Value::Map(map));
    }
}

fn arb_nested() -> impl Strategy<Value = Message> {
    (
        proptest::option::of(arb_inner()),
        proptest::collection::vec(arb_inner(), 0..3),
        proptest::option::of(any::<i32>()),
        proptest::collection::btree_map(any::<i64>(), arb_inner(), 0..3),
        proptest::collection::btree_map(any::<u64>(), any::<i64>(), 0..3),
        proptest::collection::btree_map(any::<bool>(), any::<i32>(), 0..3),
        proptest::collection::btree_map(any::<i32>(), "[a-z]{0,3}", 0..3),
    )
        .prop_map(|(inner, inners, level, by_z, by_f, by_flag, by_s32)| {
            let mut msg = Message::new();
            if let Some(inner) = inner {
                msg.set(11, inner);
            }
            if !inners.is_empty() {
                msg.set(12, inners.into_iter().map(Value::from).collect::<Vec<_>>());
            }
            if let Some(level) = level {
                msg.set(13, Value::Enum(level));
            }
            set_map(&mut msg, 14, by_z, |k, v| (MapKey::from_i64(k), Value::from(v)));
            set_map(&mut msg, 15, by_f, |k, v| (MapKey::from_u64(k), Value::from(v)));
            set_map(&mut msg, 16, by_flag, |k, v| (MapKey::from(k), Value::Enum(v)));
            set_map(&mut msg, 17, by_s32, |k, v: String| (MapKey::from(k), Value::from(v)));
            msg
        })
}

fn arb_message() -> impl Strategy<Value = Message> {
    (arb_flat(), arb_nested()).prop_map(|(flat, nested)| {
        flat.iter().chain(nested.iter()).map(|(id, v)| (id, v.clone())).collect()
    })
}

fn arb_flat() -> impl Strategy<Value = Message> {
    (
        proptest::option::of(any::<i32>()),
        proptest::option::of(any::<i64>()),
        proptest::option::of(any::<u64>()),
        proptest::option::of(-1.0e12f64..1.0e12),
        proptest::option::of("[a-zé]{0,12}"),
        proptest::option::of(any::<bool>()),
        proptest::collection::vec(any::<i32>(), 0..6),
        proptest::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..4),
        proptest::option::of(any::<i32>()),
        proptest::option::of(any::<u32>()),
    )
        .prop_map(|(a, b, c, d, e, f, nums, counts, g, h)| {
            let mut msg = Message::new();
            let scalars = [
                (1, a.map(Value::from)),
                (2, b.map(Value::from)),
                (3, c.map(Value::from)),
                (4, d.map(Value::from)),
                (5, e.map(Value::from)),
                (6, f.map(Value::from)),
                (9, g.map(Value::from)),
                (10, h.map(Value::from)),
            ];
            for (id, value) in scalars {
                if let Some(value) = value {
                    msg.set(id, value);
                }
            }
            if !nums.is_empty() {
                msg.set(7, nums.into_iter().map(Value::I32).collect::<Vec<_>>());
            }
            if !counts.is_empty() {
                let map: BTreeMap<MapKey, Value> = counts
                    .into_iter()
                    .map(|(k, v)| (MapKey::from(k.as_str()), Value::I32(v)))
                    .collect();
                msg.set(8, Value::Map(map));
            }
            msg
        })
}

proptest! {
    #[test]
    fn roundtrip_is_equivalent(msg in arb_message()) {
        let (root, id) = schema(CodecMode::Compiled);
        let bytes = protium::encode(&root, id, &msg).unwrap();
        let back = protium::decode(&root, id, &bytes).unwrap();
        prop_assert!(back.equivalent(&root, id, &msg));
        prop_assert!(msg.equivalent(&root, id, &back));
    }

    #[test]
    fn reflective_and_compiled_agree(msg in arb_message()) {
        let (compiled, id) = schema(CodecMode::Compiled);
        let (reflective, _) = schema(CodecMode::Reflective);
        let a = protium::encode(&compiled, id, &msg).unwrap();
        let b = protium::encode(&reflective, id, &msg).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(
            protium::decode(&compiled, id, &a).unwrap(),
            protium::decode(&reflective, id, &b).unwrap()
        );
    }

    #[test]
    fn zigzag_roundtrip(n in any::<i64>()) {
        prop_assert_eq!(WideInt::from(n).zz_encode().zz_decode().to_i64(), n);
    }
}

#[test]
fn zigzag_extremes() {
    for n in [i64::MIN, -1, 0, 1, i64::MAX] {
        assert_eq!(WideInt::from(n).zz_encode().zz_decode().to_i64(), n);
    }
    assert_eq!(WideInt::from(i64::MIN).zz_encode().to_u64(), u64::MAX);
}

#[test]
fn varint_boundaries() {
    let (root, id) = schema(CodecMode::Compiled);
    let len_u32 = |v: u32| protium::encode(&root, id, &Message::new().with(10, v)).unwrap().len() - 1;
    assert_eq!(len_u32(127), 1);
    assert_eq!(len_u32(128), 2);
    assert_eq!(len_u32(16383), 2);
    assert_eq!(len_u32(16384), 3);

    for v in [4_294_967_295u64, 4_294_967_296u64] {
        let msg = Message::new().with(3, v);
        let bytes = protium::encode(&root, id, &msg).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(protium::decode(&root, id, &bytes).unwrap(), msg);
    }
    let bytes = protium::encode(&root, id, &Message::new().with(1, -1)).unwrap();
    assert_eq!(hex_of_bytes(&bytes), "08ffffffffffffffffff01");
}

#[test]
fn packed_and_unpacked_decode_alike() {
    let mut root = Root::new();
    let mut packed = Type::new("Packed");
    packed.add_field(Field::new("v", 1, "int32").repeated().packed(true)).unwrap();
    let packed = root.add_type(packed).unwrap();
    let mut loose = Type::new("Loose");
    loose.add_field(Field::new("v", 1, "int32").repeated()).unwrap();
    let loose = root.add_type(loose).unwrap();
    root.resolve();

    let msg = Message::new().with(1, vec![Value::I32(3), Value::I32(270), Value::I32(86942)]);
    let a = protium::encode(&root, packed, &msg).unwrap();
    let b = protium::encode(&root, loose, &msg).unwrap();
    assert_eq!(hex_of_bytes(&a), "0a06038e029ea705");
    assert_eq!(hex_of_bytes(&b), "0803088e02089ea705");
    for (ty, bytes) in [(packed, &a), (packed, &b), (loose, &a), (loose, &b)] {
        assert_eq!(protium::decode(&root, ty, bytes).unwrap(), msg);
    }
}

#[test]
fn string_keyed_map() {
    let (root, id) = schema(CodecMode::Compiled);
    let mut map = BTreeMap::new();
    map.insert(MapKey::from("b"), Value::I32(2));
    map.insert(MapKey::from("a"), Value::I32(1));
    let msg = Message::new().with(8, Value::Map(map));
    let bytes = protium::encode(&root, id, &msg).unwrap();
    assert_eq!(hex_of_bytes(&bytes), "42050a0161100142050a01621002");

    // entries in the opposite order decode to the same map
    let swapped = bytes_of_hex("42050a0162100242050a01611001").unwrap();
    assert_eq!(protium::decode(&root, id, &swapped).unwrap(), msg);
    assert_eq!(protium::decode(&root, id, &bytes).unwrap(), msg);
}

fn verify_root() -> (Root, TypeId) {
    let mut root = Root::new();
    let mut level = Enum::new("Level");
    level.add_value("LOW", 0).unwrap().add_value("HIGH", 10).unwrap();
    root.add_enum(level).unwrap();
    let mut t = Type::new("Job");
    t.add_field(Field::new("name", 1, "string").required()).unwrap()
        .add_field(Field::new("level", 2, "Level")).unwrap()
        .add_field(Field::new("child", 3, "Job")).unwrap();
    let id = root.add_type(t).unwrap();
    root.resolve();
    (root, id)
}

#[test]
fn verifier_reports_first_violation() {
    for mode in [CodecMode::Compiled, CodecMode::Reflective] {
        let (mut root, id) = verify_root();
        root.set_mode(mode);

        let err = protium::verify(&root, id, &Message::new()).unwrap_err();
        assert_eq!(err.kind(), &VerifyErrorKind::MissingRequired);
        assert_eq!(err.to_string(), "Job.name: required field is missing");

        let msg = Message::new().with(1, "a").with(2, Value::Enum(5));
        let err = protium::verify(&root, id, &msg).unwrap_err();
        assert_eq!(err.path(), "Job.level");
        assert!(err.to_string().contains("5 is not a value of enum Level"));

        let msg = Message::new().with(1, "a").with(3, Message::new().with(2, Value::Enum(10)));
        let err = protium::verify(&root, id, &msg).unwrap_err();
        assert_eq!(err.path(), "Job.child.Job.name");

        let msg = Message::new()
            .with(1, "a")
            .with(2, Value::Enum(10))
            .with(3, Message::new().with(1, "b"));
        assert!(protium::verify(&root, id, &msg).is_ok());
    }
}

#[test]
fn unknown_fields_are_skipped() {
    let (root, id) = schema(CodecMode::Compiled);
    let bytes = bytes_of_hex("082a9a06056162636465").unwrap();
    let msg = protium::decode(&root, id, &bytes).unwrap();
    assert_eq!(msg, Message::new().with(1, 42));
}

#[test]
fn nested_length_prefixes() {
    let mut w = Writer::new();
    w.tag(1, protium::WireType::LengthDelimited).fork();
    w.tag(1, protium::WireType::LengthDelimited).fork();
    w.tag(1, protium::WireType::LengthDelimited).fork();
    w.uint32(1).uint32(300);
    w.ldelim();
    w.ldelim();
    w.ldelim();
    let bytes = w.finish();
    assert_eq!(hex_of_bytes(&bytes), "0a070a050a0301ac02");

    // each prefix equals the length of what follows it
    assert_eq!(bytes[1] as usize, bytes.len() - 2);
    assert_eq!(bytes[3] as usize, bytes.len() - 4);
    assert_eq!(bytes[5] as usize, bytes.len() - 6);
}

#[test]
fn cyclic_types_nest() {
    let (root, id) = verify_root();
    let msg = Message::new()
        .with(1, "a")
        .with(3, Message::new().with(1, "b").with(3, Message::new().with(1, "c")));
    let bytes = protium::encode(&root, id, &msg).unwrap();
    assert_eq!(hex_of_bytes(&bytes), "0a01611a080a01621a030a0163");
    assert_eq!(protium::decode(&root, id, &bytes).unwrap(), msg);
}

#[test]
fn descriptor_failures_surface() {
    let mut root = Root::new();
    let mut t = Type::new("T");
    t.add_field(Field::new("later", 1, "Later")).unwrap();
    let id = root.add_type(t).unwrap();
    assert_eq!(root.resolve(), 1);
    assert!(matches!(
        protium::encode(&root, id, &Message::new()),
        Err(EncodeError::Descriptor(DescriptorError::Unresolved { .. }))
    ));
    assert!(matches!(
        protium::decode(&root, id, &[]),
        Err(DecodeError::Descriptor(DescriptorError::Unresolved { .. }))
    ));

    root.add_type(Type::new("Later")).unwrap();
    assert_eq!(root.resolve(), 0);
    let bytes = protium::encode(&root, id, &Message::new().with(1, Message::new())).unwrap();
    assert_eq!(bytes, [0x0a, 0x00]);
}
