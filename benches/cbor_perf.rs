use std::hint::black_box;

use cbor_canon::{Encoder, EncoderOptions, Value, decode_all, encode, to_vec};
use codspeed_criterion_compat::{Criterion, Throughput, criterion_group, criterion_main};
use serde::Serialize;

#[derive(Serialize)]
struct Claim {
    title: String,
    format: String,
    instance_id: String,
    signature: serde_bytes::ByteBuf,
    assertions: Vec<String>,
    version: u32,
}

fn sample_map(entries: usize) -> Value {
    Value::map((0..entries).rev().map(|i| {
        (
            Value::from(format!("key-{i}")),
            Value::Array(vec![Value::from(i as u64 * 1_000), Value::Float(i as f64 / 4.0)]),
        )
    }))
}

fn bench_encode(c: &mut Criterion) {
    let value = sample_map(256);
    let size = encode(&value).map(|b| b.len()).unwrap_or_default();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("canonical_map", |b| b.iter(|| encode(black_box(&value))));
    group.bench_function("insertion_order_map", |b| {
        b.iter(|| {
            let mut encoder = Encoder::new(EncoderOptions::default().canonical(false));
            encoder.write(black_box(&value)).map(|_| ()).ok();
            encoder.finalize()
        })
    });
    group.bench_function("streaming", |b| {
        b.iter(|| {
            let mut total = 0usize;
            let mut encoder = Encoder::streaming(|chunk: &[u8]| total += chunk.len());
            encoder.write(black_box(&value)).map(|_| ()).ok();
            drop(encoder);
            total
        })
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let bytes = encode(&sample_map(256)).unwrap_or_default();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("decode_all", |b| b.iter(|| decode_all(black_box(&bytes))));
    group.finish();
}

fn bench_serde(c: &mut Criterion) {
    let claim = Claim {
        title: "image.jpg".to_string(),
        format: "image/jpeg".to_string(),
        instance_id: "xmp:iid:7b57930e-2f23-47fc-affe-0400d70b738d".to_string(),
        signature: serde_bytes::ByteBuf::from(vec![0xa5; 512]),
        assertions: (0..16).map(|i| format!("self#jumbf=assertion-{i}")).collect(),
        version: 2,
    };
    c.bench_function("to_vec_struct", |b| b.iter(|| to_vec(black_box(&claim))));
}

criterion_group!(benches, bench_encode, bench_decode, bench_serde);
criterion_main!(benches);
