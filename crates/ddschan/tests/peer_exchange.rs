// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! Independent factories on one host
//!
//! Each `ChannelFactory::new()` owns its own data space, so these channels
//! only meet through the wire transport, the same way two processes do.

use ddschan::{
    ChannelFactory, DdsBackendType, DdsChannel, DdsTransportType, MetaData, RecvPort, SendPort,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(5);

fn channel(factory: &ChannelFactory, topic: &str, transport: DdsTransportType) -> Arc<DdsChannel> {
    factory
        .get_dds_channel(
            "test_src",
            "test_dst",
            topic,
            10,
            1,
            transport,
            DdsBackendType::CycloneDds,
        )
        .expect("channel")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn exchange(topic: &str, transport: DdsTransportType) {
    let publisher = ChannelFactory::new();
    let subscriber = ChannelFactory::new();

    let tx = channel(&publisher, topic, transport).send_port();
    let rx = channel(&subscriber, topic, transport).recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    assert!(
        wait_until(|| tx.matched_readers() >= 1),
        "publisher never matched the other factory's reader"
    );

    tx.send(&MetaData::from_bytes(vec![0x2A])).expect("send");
    let md = rx.recv_timeout(DEADLINE).expect("recv").expect("sample");
    assert_eq!(md.payload(), &[0x2A]);
    assert!(rx.try_recv().expect("poll").is_none());

    tx.join().expect("join tx");
    rx.join().expect("join rx");
}

#[test]
fn factories_exchange_over_udp() {
    exchange("rt/wire_exchange", DdsTransportType::UdpV4);
}

#[test]
fn factories_exchange_over_shared_memory_lane() {
    exchange("rt/wire_exchange_shm", DdsTransportType::Shm);
}

#[test]
fn closed_subscriber_unmatches() {
    let publisher = ChannelFactory::new();
    let subscriber = ChannelFactory::new();

    let tx = channel(&publisher, "rt/wire_leave", DdsTransportType::UdpV4).send_port();
    let rx = channel(&subscriber, "rt/wire_leave", DdsTransportType::UdpV4).recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");
    assert!(wait_until(|| tx.matched_readers() >= 1), "never matched");

    drop(rx);
    subscriber.close_all();
    drop(subscriber);
    assert!(
        wait_until(|| tx.matched_readers() == 0),
        "reader still matched after its factory closed"
    );
}

#[test]
fn ordered_stream_crosses_with_backpressure() {
    let publisher = ChannelFactory::new();
    let subscriber = ChannelFactory::new();

    let tx = channel(&publisher, "rt/wire_stream", DdsTransportType::UdpV4).send_port();
    let rx = channel(&subscriber, "rt/wire_stream", DdsTransportType::UdpV4).recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");
    assert!(wait_until(|| tx.matched_readers() >= 1), "never matched");

    let consumer = {
        let rx = Arc::clone(&rx);
        thread::spawn(move || {
            (0..200u32)
                .map(|_| {
                    rx.recv_timeout(DEADLINE)
                        .expect("recv")
                        .expect("sample")
                        .payload()[0]
                })
                .collect::<Vec<u8>>()
        })
    };

    let expected: Vec<u8> = (0..200u32).map(|n| (n % 251) as u8).collect();
    for value in &expected {
        tx.send(&MetaData::from_bytes(vec![*value])).expect("send");
    }
    assert_eq!(consumer.join().expect("consumer"), expected);
}
