// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ddschan-pub - Publish a counter over a DDS channel
//!
//! Sends one-byte descriptors counting down from `--count`, one per
//! interval. With `--echo` the channel's own receive port prints what
//! arrives.

use clap::Parser;
use ddschan::{
    get_channel_factory, DdsBackendType, DdsTransportType, Error, MetaData, RecvPort, ScalarType,
    SendPort,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Publish a counter over a DDS channel
#[derive(Parser, Debug)]
#[command(name = "ddschan-pub")]
#[command(version)]
#[command(about = "Publish one-byte descriptors over a ddschan DDS channel")]
struct Args {
    /// Send port name
    #[arg(long, default_value = "test_cyclonedds_src")]
    src: String,

    /// Receive port name
    #[arg(long, default_value = "test_cyclonedds_dst")]
    dst: String,

    /// Topic name
    #[arg(short, long, default_value = "rt/dds_topic")]
    topic: String,

    /// History depth in samples
    #[arg(long, default_value = "10")]
    depth: usize,

    /// Number of samples to send
    #[arg(short = 'n', long, default_value = "100")]
    count: u32,

    /// Delay between sends in milliseconds
    #[arg(short, long, default_value = "1000")]
    interval_ms: u64,

    /// Transport: udpv4, udpv6, shm
    #[arg(long, default_value = "udpv4")]
    transport: DdsTransportType,

    /// DDS domain ID (overrides DDSCHAN_DOMAIN_ID)
    #[arg(short, long)]
    domain: Option<u32>,

    /// Also start the receive port and print what arrives
    #[arg(long)]
    echo: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = run(&args);
    // The process-wide factory is never dropped; join its channels on
    // every path so peers see us leave.
    get_channel_factory().close_all();

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> ddschan::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("[ddschan-pub] Ctrl+C handler not installed: {}", e);
    }

    let factory = get_channel_factory();
    if let Some(domain) = args.domain {
        let config = (*factory.config()).clone().with_domain_id(domain);
        factory.set_config(config)?;
    }

    let channel = factory.get_dds_channel(
        &args.src,
        &args.dst,
        &args.topic,
        args.depth,
        1,
        args.transport,
        DdsBackendType::CycloneDds,
    )?;
    log::debug!(
        "[ddschan-pub] participant configuration:\n{}",
        channel.participant_config()
    );

    let echo = if args.echo {
        let rx = channel.recv_port();
        rx.start()?;
        Some((rx.clone(), thread::spawn(move || echo_loop(rx.as_ref()))))
    } else {
        None
    };

    let tx = channel.send_port();
    tx.start()?;

    let mut metadata = MetaData::new(ScalarType::Byte, &[1], vec![0])?;
    let mut remaining = args.count;
    while remaining > 0 && running.load(Ordering::SeqCst) {
        remaining -= 1;
        metadata.mdata[0] = (remaining % 255) as u8;
        match tx.send(&metadata) {
            Ok(()) => println!("DDS send : '{}'", remaining),
            // No reader drained the history within max_blocking_time.
            Err(e @ Error::BackendTimeout(_)) => log::warn!("[ddschan-pub] {}", e),
            Err(e) => return Err(e),
        }
        sleep_while_running(Duration::from_millis(args.interval_ms), &running);
    }

    tx.join()?;
    if let Some((rx, handle)) = echo {
        rx.join()?;
        join_echo(handle);
    }

    let stats = tx.stats();
    println!("Sent {} sample(s), {} bytes", stats.samples, stats.bytes);
    Ok(())
}

fn echo_loop(rx: &dyn RecvPort) {
    loop {
        match rx.recv() {
            Ok(md) => println!("DDS recv : '{}'", md.payload().first().copied().unwrap_or(0)),
            Err(Error::Closed) => break,
            Err(e @ Error::DescriptorInvalid(_)) => eprintln!("DDS recv : dropped ({})", e),
            Err(e) => {
                eprintln!("DDS recv : {}", e);
                break;
            }
        }
    }
}

/// Join the echo thread; a panic there is logged rather than lost.
fn join_echo(handle: thread::JoinHandle<()>) -> bool {
    let joined = handle.join().is_ok();
    if !joined {
        log::error!("[ddschan-pub] echo thread panicked");
    }
    joined
}

fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
