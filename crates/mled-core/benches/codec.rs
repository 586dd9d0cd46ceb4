//! Codec benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mled_core::{CuePrepare, Packet, Pattern, PatternConfig, Rgb};

fn prepare_packet() -> Packet {
    Packet::cue_prepare(
        7,
        100,
        CuePrepare {
            cue_id: 42,
            fade_in_ms: 250,
            fade_out_ms: 500,
            pattern: PatternConfig::new(
                Pattern::Chase {
                    speed: 30,
                    tail_len: 5,
                    gap_len: 10,
                    trains: 2,
                    fg: Rgb::WHITE,
                    bg: Rgb { r: 16, g: 0, b: 32 },
                    direction: 2,
                    fade_tail: true,
                },
                80,
            ),
        },
    )
}

fn encode_benchmark(c: &mut Criterion) {
    let pkt = prepare_packet();

    c.bench_function("encode_cue_prepare", |b| {
        b.iter(|| black_box(pkt.encode().unwrap()))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let encoded = prepare_packet().encode().unwrap();

    c.bench_function("decode_cue_prepare", |b| {
        b.iter(|| black_box(Packet::decode(&encoded).unwrap()))
    });
}

fn roundtrip_benchmark(c: &mut Criterion) {
    let pkt = prepare_packet();

    c.bench_function("roundtrip_cue_prepare", |b| {
        b.iter(|| {
            let encoded = pkt.encode().unwrap();
            black_box(Packet::decode(&encoded).unwrap())
        })
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark, roundtrip_benchmark);
criterion_main!(benches);
