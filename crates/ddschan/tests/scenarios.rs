// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::too_many_lines)] // Example/test code

//! End-to-end channel scenarios
//!
//! Loopback, ordering, backpressure, descriptor validation, memoization and
//! join/recv cancellation through the public factory API.

use ddschan::{
    ChannelConfig, ChannelFactory, DdsBackendType, DdsChannel, DdsTransportType, Error,
    MetaData, RecvPort, ScalarType, SendPort,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn channel(factory: &ChannelFactory, topic: &str, depth: usize) -> Arc<DdsChannel> {
    factory
        .get_dds_channel(
            "test_src",
            "test_dst",
            topic,
            depth,
            1,
            DdsTransportType::UdpV4,
            DdsBackendType::CycloneDds,
        )
        .expect("channel")
}

/// `nd=1, type=7, elsize=1, dims=[1], strides=[1]`
fn one_byte(value: u8) -> MetaData {
    MetaData::from_bytes(vec![value])
}

#[test]
fn loopback_single_byte() {
    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/s1_loopback", 10);
    let tx = ch.send_port();
    let rx = ch.recv_port();

    tx.start().expect("start tx");
    rx.start().expect("start rx");
    tx.send(&one_byte(0x2A)).expect("send");

    let md = rx.recv().expect("recv");
    assert_eq!(md.nd, 1);
    assert_eq!(md.dtype, 7);
    assert_eq!(md.elsize, 1);
    assert_eq!(md.total_size, 1);
    assert_eq!(md.shape(), &[1]);
    assert_eq!(md.strides(), &[1]);
    assert_eq!(md.payload(), &[0x2A]);

    tx.join().expect("join tx");
    rx.join().expect("join rx");
}

#[test]
fn loop_of_100_arrives_in_order() {
    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/s2_loop", 10);
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    let consumer = {
        let rx = Arc::clone(&rx);
        thread::spawn(move || {
            (0..100)
                .map(|_| rx.recv().expect("recv").payload()[0])
                .collect::<Vec<u8>>()
        })
    };

    let mut expected = Vec::new();
    for remaining in (0..100u32).rev() {
        let value = (remaining % 255) as u8;
        tx.send(&one_byte(value)).expect("send");
        expected.push(value);
    }

    assert_eq!(consumer.join().expect("consumer"), expected);
    assert_eq!(tx.stats().samples, 100);
    assert_eq!(rx.stats().samples, 100);
    tx.join().expect("join tx");
}

#[test]
fn depth_bound_blocks_until_receiver_consumes() {
    let factory = ChannelFactory::with_config(
        ChannelConfig::default().with_max_blocking_time(Duration::from_secs(10)),
    );
    let ch = channel(&factory, "rt/s3_backpressure", 2);
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");

    tx.send(&one_byte(1)).expect("first");
    tx.send(&one_byte(2)).expect("second");

    let done = Arc::new(AtomicBool::new(false));
    let third = {
        let tx = Arc::clone(&tx);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let result = tx.send(&one_byte(3));
            done.store(true, Ordering::SeqCst);
            result
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "third send should block");

    rx.start().expect("start rx");
    assert_eq!(rx.recv().expect("recv").payload(), &[1]);
    third.join().expect("thread").expect("third send completes");
    assert!(done.load(Ordering::SeqCst));

    assert_eq!(rx.recv().expect("recv").payload(), &[2]);
    assert_eq!(rx.recv().expect("recv").payload(), &[3]);
}

#[test]
fn send_times_out_when_nobody_reads() {
    let factory = ChannelFactory::with_config(
        ChannelConfig::default().with_max_blocking_time(Duration::from_millis(50)),
    );
    let ch = channel(&factory, "rt/s3_timeout", 1);
    let tx = ch.send_port();
    tx.start().expect("start");
    tx.send(&one_byte(1)).expect("buffered");

    let err = tx.send(&one_byte(2)).expect_err("history full");
    assert!(matches!(err, Error::BackendTimeout(_)));
    assert_eq!(tx.stats().samples, 1);
}

#[test]
fn invalid_descriptor_is_not_published() {
    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/s4_invalid", 4);
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    let mut md = MetaData::new(ScalarType::Byte, &[2, 3], vec![0u8; 6]).expect("valid");
    md.total_size = 5;
    assert!(matches!(tx.send(&md), Err(Error::DescriptorInvalid(_))));
    assert!(rx.try_recv().expect("poll").is_none());
}

#[test]
fn factory_identity_is_memoized() {
    let factory = ChannelFactory::new();
    let a = channel(&factory, "rt/s5_identity", 10);
    let b = channel(&factory, "rt/s5_identity", 10);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.send_port(), &b.send_port()));

    let deeper = channel(&factory, "rt/s5_identity", 11);
    assert!(!Arc::ptr_eq(&a, &deeper));
}

#[test]
fn join_unblocks_recv() {
    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/s6_join", 4);
    let rx = ch.recv_port();
    rx.start().expect("start");

    let (joined_tx, joined_rx) = std::sync::mpsc::channel::<Instant>();
    let waiter = {
        let rx = Arc::clone(&rx);
        thread::spawn(move || {
            let result = rx.recv();
            let joined_at = joined_rx.recv().expect("join time");
            (result, joined_at.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    joined_tx.send(Instant::now()).expect("send join time");
    rx.join().expect("join");

    let (result, latency) = waiter.join().expect("waiter");
    assert_eq!(result.unwrap_err(), Error::Closed);
    assert!(latency < Duration::from_millis(100), "took {:?}", latency);
}

#[test]
fn late_receiver_gets_buffered_samples() {
    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/late_rx", 4);
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");
    for v in 0..3 {
        tx.send(&one_byte(v)).expect("send");
    }

    rx.start().expect("start rx");
    for v in 0..3 {
        assert_eq!(rx.recv().expect("recv").payload(), &[v]);
    }
    assert!(rx.try_recv().expect("poll").is_none());
}

#[test]
fn multidimensional_descriptor_round_trips() {
    let factory = ChannelFactory::new();
    let ch = factory
        .get_dds_channel(
            "src",
            "dst",
            "rt/tensor",
            2,
            8,
            DdsTransportType::UdpV6,
            DdsBackendType::CycloneDds,
        )
        .expect("channel");
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    let payload: Vec<u8> = (0..2 * 3 * 4 * 8).map(|i| i as u8).collect();
    let md = MetaData::new(ScalarType::Float64, &[2, 3, 4], payload).expect("valid");
    tx.send(&md).expect("send");

    let got = rx.recv_timeout(Duration::from_secs(1)).expect("recv").expect("sample");
    assert_eq!(got, md);
    assert_eq!(got.strides(), &[96, 32, 8]);
}

#[test]
fn shared_memory_enforces_chunk_size() {
    let factory = ChannelFactory::new();
    let ch = factory
        .get_dds_channel(
            "src",
            "dst",
            "rt/shm_chunk",
            4,
            1,
            DdsTransportType::Shm,
            DdsBackendType::CycloneDds,
        )
        .expect("channel");
    assert!(ch.participant_config().contains("<SharedMemory>"));

    let tx = ch.send_port();
    tx.start().expect("start");
    tx.send(&one_byte(9)).expect("fits");
    let err = tx
        .send(&MetaData::from_bytes(vec![1, 2]))
        .expect_err("larger than chunk");
    assert!(matches!(err, Error::BackendError(_)));
}

#[test]
fn channels_on_one_topic_see_each_other() {
    let factory = ChannelFactory::new();
    let a = factory
        .get_dds_channel(
            "a_src",
            "a_dst",
            "rt/shared_topic",
            4,
            1,
            DdsTransportType::UdpV4,
            DdsBackendType::CycloneDds,
        )
        .expect("channel a");
    let b = factory
        .get_dds_channel(
            "b_src",
            "b_dst",
            "rt/shared_topic",
            4,
            1,
            DdsTransportType::UdpV4,
            DdsBackendType::CycloneDds,
        )
        .expect("channel b");
    assert!(!Arc::ptr_eq(&a, &b));

    let tx = a.send_port();
    let rx = b.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");
    tx.send(&one_byte(77)).expect("send");
    assert_eq!(rx.recv().expect("recv").payload(), &[77]);
}

#[test]
fn memoized_channel_delivers_once() {
    let factory = ChannelFactory::new();
    let a = channel(&factory, "rt/s5_once", 10);
    let b = channel(&factory, "rt/s5_once", 10);
    assert!(Arc::ptr_eq(&a, &b));

    let tx = a.send_port();
    let rx = b.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    tx.send(&one_byte(5)).expect("send");
    assert_eq!(rx.recv().expect("recv").payload(), &[5]);
    assert!(rx.try_recv().expect("poll").is_none());
    assert_eq!(rx.stats().samples, 1);
}

#[test]
fn concurrent_senders_keep_their_own_order() {
    const SENDERS: u8 = 4;
    const PER_SENDER: u8 = 25;

    let factory = ChannelFactory::new();
    let ch = channel(&factory, "rt/concurrent_send", 10);
    let tx = ch.send_port();
    let rx = ch.recv_port();
    tx.start().expect("start tx");
    rx.start().expect("start rx");

    let consumer = {
        let rx = Arc::clone(&rx);
        thread::spawn(move || {
            (0..usize::from(SENDERS) * usize::from(PER_SENDER))
                .map(|_| rx.recv().expect("recv").payload().to_vec())
                .collect::<Vec<Vec<u8>>>()
        })
    };

    let senders: Vec<_> = (0..SENDERS)
        .map(|sender| {
            let tx = Arc::clone(&tx);
            thread::spawn(move || {
                for n in 0..PER_SENDER {
                    tx.send(&MetaData::from_bytes(vec![sender, n])).expect("send");
                }
            })
        })
        .collect();
    for handle in senders {
        handle.join().expect("sender");
    }

    let received = consumer.join().expect("consumer");
    assert_eq!(received.len(), usize::from(SENDERS) * usize::from(PER_SENDER));
    for sender in 0..SENDERS {
        let order: Vec<u8> = received
            .iter()
            .filter(|payload| payload[0] == sender)
            .map(|payload| payload[1])
            .collect();
        assert_eq!(order, (0..PER_SENDER).collect::<Vec<_>>(), "sender {}", sender);
    }
    assert!(rx.try_recv().expect("poll").is_none());
    assert_eq!(tx.stats().samples, 100);
}
