// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ddschan configuration - constants and channel defaults
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (descriptor layout, domain range)
//! - **Level 2 (Dynamic)**: [`ChannelConfig`], built in code or from the environment
//!
//! # Environment Variables
//!
//! - `DDSCHAN_DOMAIN_ID`: DDS domain (default: 0)
//! - `DDSCHAN_MAX_BLOCKING_MS`: bound on a blocked send (default: 5000)
//! - `DDSCHAN_JOIN_LINGER_MS`: best-effort drain on join (default: 1000)
//!
//! # Example
//!
//! ```
//! use ddschan::config::ChannelConfig;
//! use std::time::Duration;
//!
//! let config = ChannelConfig::default()
//!     .with_domain_id(3)
//!     .with_max_blocking_time(Duration::from_millis(250));
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

// =======================================================================
// Descriptor layout
// =======================================================================

/// Maximum array rank carried by a descriptor.
pub const MAX_RANK: usize = 5;

/// Sample type name announced for the descriptor topic type.
///
/// Peers must register the same name or topic creation fails.
pub const METADATA_TYPE_NAME: &str = "DDSMetaData";

/// Encoded header length in bytes.
///
/// `nd(4) + type(4) + elsize(4) + total_size(8) + dims(8 x 5) + strides(8 x 5) = 100`
pub const METADATA_HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8 * MAX_RANK + 8 * MAX_RANK;

// =======================================================================
// Domain
// =======================================================================

/// Maximum domain ID per DDS specification (RTPS v2.3 Sec.9.6.1.1)
pub const MAX_DOMAIN_ID: u32 = 232;

/// Default DDS domain.
pub const DEFAULT_DOMAIN_ID: u32 = 0;

// =======================================================================
// Timing
// =======================================================================

/// Default bound on a blocked send (milliseconds).
pub const DEFAULT_MAX_BLOCKING_MS: u64 = 5_000;

/// Default drain window on send port join (milliseconds).
pub const DEFAULT_JOIN_LINGER_MS: u64 = 1_000;

// =======================================================================
// Wire transport (RTPS v2.5 Sec.9.6.1.1 port mapping)
// =======================================================================

/// Port base
pub const PORT_BASE: u16 = 7400;

/// Domain gain
///
/// Announce multicast port: `PORT_BASE + (DOMAIN_ID_GAIN x domain_id)`
pub const DOMAIN_ID_GAIN: u16 = 250;

/// Participant gain
///
/// Unicast port: `base + (PARTICIPANT_ID_GAIN x participant_index)`
pub const PARTICIPANT_ID_GAIN: u16 = 2;

/// UDP unicast offset (participant traffic over udp/udp6).
pub const UDP_UNICAST_OFFSET: u16 = 10;

/// Loopback unicast offset (shared memory participants).
pub const SHM_UNICAST_OFFSET: u16 = 11;

/// Participant indexes tried before falling back to an ephemeral port.
pub const MAX_PARTICIPANT_INDEX: u16 = 120;

/// Participant indexes announced to on the loopback address.
///
/// Covers hosts where multicast is unavailable.
pub const LOOPBACK_ANNOUNCE_SPAN: u16 = 32;

/// Announce multicast group (IPv4).
pub const MULTICAST_GROUP_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Announce multicast group (IPv6, link-local scope): `ff02::ffff:239.255.0.1`
pub const MULTICAST_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0xffff, 0xefff, 0x0001);

/// Largest datagram sent or received.
pub const MAX_PACKET_SIZE: usize = 65536;

/// Largest sample slice carried by one DATA datagram.
pub const FRAGMENT_SIZE: usize = 60_000;

/// Period between participant announcements (milliseconds).
pub const ANNOUNCE_PERIOD_MS: u64 = 500;

/// Unacknowledged samples are resent after this long without progress (milliseconds).
pub const RESEND_PERIOD_MS: u64 = 50;

/// A peer silent for this long is dropped (milliseconds).
pub const LEASE_DURATION_MS: u64 = 3_000;

/// Environment variable names.
pub mod env {
    pub const DOMAIN_ID: &str = "DDSCHAN_DOMAIN_ID";
    pub const MAX_BLOCKING_MS: &str = "DDSCHAN_MAX_BLOCKING_MS";
    pub const JOIN_LINGER_MS: &str = "DDSCHAN_JOIN_LINGER_MS";
}

// =======================================================================
// Channel configuration
// =======================================================================

/// Defaults applied to every channel a factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// DDS domain joined by participants.
    pub domain_id: u32,
    /// Longest a `send` may wait for history space before `BackendTimeout`.
    pub max_blocking_time: Duration,
    /// How long `join` waits for accepted samples to be acknowledged.
    pub join_linger: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            domain_id: DEFAULT_DOMAIN_ID,
            max_blocking_time: Duration::from_millis(DEFAULT_MAX_BLOCKING_MS),
            join_linger: Duration::from_millis(DEFAULT_JOIN_LINGER_MS),
        }
    }
}

impl ChannelConfig {
    /// Build a config from `DDSCHAN_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            domain_id: lookup(env::DOMAIN_ID)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.domain_id),
            max_blocking_time: parse_u64(env::MAX_BLOCKING_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_blocking_time),
            join_linger: parse_u64(env::JOIN_LINGER_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.join_linger),
        }
    }

    /// Set the DDS domain.
    pub fn with_domain_id(mut self, domain_id: u32) -> Self {
        self.domain_id = domain_id;
        self
    }

    /// Set the send blocking bound.
    pub fn with_max_blocking_time(mut self, timeout: Duration) -> Self {
        self.max_blocking_time = timeout;
        self
    }

    /// Set the join drain window.
    pub fn with_join_linger(mut self, linger: Duration) -> Self {
        self.join_linger = linger;
        self
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidConfig(format!(
                "domain_id {} out of range (0-{})",
                self.domain_id, MAX_DOMAIN_ID
            )));
        }
        if self.max_blocking_time.is_zero() {
            return Err(Error::InvalidConfig(
                "max_blocking_time must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
