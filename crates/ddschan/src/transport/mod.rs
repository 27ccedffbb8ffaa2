// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire transport between data spaces.
//!
//! Each participant opens a [`WireBridge`]: a unicast socket, a shared
//! multicast socket where the transport has one, and an IO thread. Bridges
//! announce their enabled endpoints periodically; a peer that reads a topic
//! this participant writes gets a remote stand-in reader in the local data
//! space, and the other way round. Samples cross as DATA fragments and are
//! acknowledged, so reliable writers block on remote readers exactly like
//! on local ones.
//!
//! Participants of the same data space never talk over the wire; they
//! already share topics in memory.
//!
//! | Transport | Announce | Data |
//! |-----------|----------|------|
//! | UDPv4 | `239.255.0.1` + loopback lanes | unicast UDP |
//! | UDPv6 | `ff02::ffff:239.255.0.1` + loopback lanes | unicast UDP |
//! | SHM | loopback lanes | loopback UDP |
//!
//! The datagram format is specific to ddschan (see [`wire`]); it borrows the
//! RTPS port mapping but does not interoperate with other DDS stacks.

mod bridge;
mod peer;
mod ports;
mod socket;
pub mod wire;

pub use bridge::{WireBridge, WireLink};
pub use peer::LocalEndpoint;
pub use ports::PortMapping;
pub use wire::{EndpointKind, GuidPrefix};

use crate::engine::LinkId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_LINK: AtomicU64 = AtomicU64::new(1);
static SPACES: AtomicU32 = AtomicU32::new(0);

/// Fresh link id; never [`NO_LINK`](crate::engine::NO_LINK).
pub(crate) fn next_link_id() -> LinkId {
    NEXT_LINK.fetch_add(1, Ordering::Relaxed)
}

/// Identifier for a new data space, distinct within this process and
/// unlikely to repeat across processes started together.
pub fn next_space_id() -> u32 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    // High half from the hash, low half counts spaces of this process.
    let high = (hasher.finish() as u32) & 0xFFFF_0000;
    high | (SPACES.fetch_add(1, Ordering::Relaxed) & 0xFFFF)
}
