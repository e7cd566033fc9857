use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use protium::schema::{Field, Root, ScalarType, Type, TypeId};
use protium::{CodecMode, Message, Value};

fn schema(mode: CodecMode) -> (Root, TypeId) {
    let mut root = Root::new();
    let mut point = Type::new("bench.Point");
    point.add_field(Field::new("x", 1, "sint32")).unwrap()
        .add_field(Field::new("y", 2, "sint32")).unwrap()
        .add_field(Field::new("label", 3, "string")).unwrap();
    root.add_type(point).unwrap();
    let mut path = Type::new("bench.Path");
    path.add_field(Field::new("points", 1, "Point").repeated()).unwrap()
        .add_field(Field::new("weights", 2, "double").repeated().packed(true)).unwrap()
        .add_field(Field::new("ids", 3, "uint64").repeated().packed(true)).unwrap()
        .add_field(Field::new("attrs", 4, "int64").map(ScalarType::String)).unwrap();
    let id = root.add_type(path).unwrap();
    root.resolve();
    root.set_mode(mode);
    (root, id)
}

fn sample(n: usize) -> Message {
    let points = (0..n as i32)
        .map(|i| Value::from(Message::new().with(1, i).with(2, -i).with(3, "pt")))
        .collect::<Vec<_>>();
    let weights = (0..n).map(|i| Value::F64(i as f64 * 0.5)).collect::<Vec<_>>();
    let ids = (0..n as u64).map(|i| Value::U64(i << 33)).collect::<Vec<_>>();
    let attrs = (0..8i64).map(|i| (format!("k{i}").as_str().into(), Value::I64(i))).collect();
    Message::new()
        .with(1, points)
        .with(2, weights)
        .with(3, ids)
        .with(4, Value::Map(attrs))
}

fn encode_bench(c: &mut Criterion) {
    let msg = sample(64);
    let mut group = c.benchmark_group("encode");
    for mode in [CodecMode::Reflective, CodecMode::Compiled] {
        let (root, id) = schema(mode);
        let codec = root.codec(id);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &msg, |b, msg| {
            b.iter(|| black_box(codec.encode(msg).unwrap()))
        });
    }
    group.finish();
}

fn decode_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for mode in [CodecMode::Reflective, CodecMode::Compiled] {
        let (root, id) = schema(mode);
        let codec = root.codec(id);
        let bytes = codec.encode(&sample(64)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &bytes, |b, bytes| {
            b.iter(|| black_box(codec.decode(bytes).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, encode_bench, decode_bench);
criterion_main!(benches);
