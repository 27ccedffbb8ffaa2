// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor codec and loopback benchmarks
//!
//! - encode / decode throughput for growing payloads
//! - one send + recv round trip through a Cyclone UDPv4 channel

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddschan::metadata::codec;
use ddschan::{
    ChannelFactory, DdsBackendType, DdsTransportType, MetaData, RecvPort, ScalarType, SendPort,
};

const PAYLOAD_SIZES: [usize; 4] = [1, 1024, 64 * 1024, 1024 * 1024];

fn descriptor(nbytes: usize) -> MetaData {
    let elements = (nbytes / 4).max(1) as u64;
    MetaData::new(
        ScalarType::Float32,
        &[elements],
        vec![0xAB; elements as usize * 4],
    )
    .expect("valid descriptor")
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_encode");
    for size in PAYLOAD_SIZES {
        let md = descriptor(size);
        group.throughput(Throughput::Bytes(codec::encoded_len(&md) as u64));
        group.bench_with_input(BenchmarkId::new("float32", size), &md, |b, md| {
            b.iter(|| black_box(codec::encode(black_box(md)).expect("encode")));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");
    for size in PAYLOAD_SIZES {
        let bytes = codec::encode(&descriptor(size)).expect("encode");
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("float32", size), &bytes, |b, bytes| {
            b.iter(|| black_box(codec::decode(black_box(bytes)).expect("decode")));
        });
    }
    group.finish();
}

fn bench_loopback(c: &mut Criterion) {
    let factory = ChannelFactory::new();
    let channel = factory
        .get_dds_channel(
            "bench_src",
            "bench_dst",
            "rt/bench_loopback",
            16,
            1,
            DdsTransportType::UdpV4,
            DdsBackendType::CycloneDds,
        )
        .expect("channel");
    let tx = channel.send_port();
    let rx = channel.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    let md = MetaData::from_bytes(vec![42]);
    c.bench_function("loopback_send_recv_1b", |b| {
        b.iter(|| {
            tx.send(black_box(&md)).expect("send");
            black_box(rx.recv().expect("recv"));
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_loopback);
criterion_main!(benches);
