// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS backend adapters.
//!
//! A channel never talks to a vendor API directly. It goes through the
//! traits below, which one adapter per vendor implements:
//!
//! ```text
//! DdsBackend            (one per vendor, registered in the factory)
//! +-- BackendParticipant    (shared per (transport, backend), see pool)
//!     +-- BackendTopic
//!     +-- BackendWriter     (Arc, held by a SendPort)
//!     +-- BackendReader     (Arc, held by a RecvPort)
//! ```
//!
//! [`cyclone::CycloneBackend`] is the built-in adapter. Other vendors plug in
//! through `ChannelFactory::register_backend`.

pub mod cyclone;
pub mod pool;

use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::qos::EndpointQos;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

pub use cyclone::CycloneBackend;
pub use pool::{ParticipantPool, SharedParticipant};

/// Underlying carrier of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DdsTransportType {
    /// Shared memory (same host).
    Shm,
    TcpV4,
    TcpV6,
    UdpV4,
    UdpV6,
}

impl DdsTransportType {
    pub const ALL: [DdsTransportType; 5] = [
        DdsTransportType::Shm,
        DdsTransportType::TcpV4,
        DdsTransportType::TcpV6,
        DdsTransportType::UdpV4,
        DdsTransportType::UdpV6,
    ];
}

impl std::fmt::Display for DdsTransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DdsTransportType::Shm => "SHM",
            DdsTransportType::TcpV4 => "TCPv4",
            DdsTransportType::TcpV6 => "TCPv6",
            DdsTransportType::UdpV4 => "UDPv4",
            DdsTransportType::UdpV6 => "UDPv6",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for DdsTransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "shm" | "shared-memory" => Ok(DdsTransportType::Shm),
            "tcpv4" | "tcp" => Ok(DdsTransportType::TcpV4),
            "tcpv6" | "tcp6" => Ok(DdsTransportType::TcpV6),
            "udpv4" | "udp" => Ok(DdsTransportType::UdpV4),
            "udpv6" | "udp6" => Ok(DdsTransportType::UdpV6),
            _ => Err(Error::InvalidConfig(format!("unknown transport: {}", s))),
        }
    }
}

/// DDS vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DdsBackendType {
    /// Eclipse Cyclone DDS (built-in adapter).
    CycloneDds,
    /// eProsima Fast DDS (no built-in adapter).
    FastDds,
}

impl std::fmt::Display for DdsBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DdsBackendType::CycloneDds => write!(f, "CycloneDDS"),
            DdsBackendType::FastDds => write!(f, "FastDDS"),
        }
    }
}

impl std::str::FromStr for DdsBackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cyclone" | "cyclonedds" => Ok(DdsBackendType::CycloneDds),
            "fast" | "fastdds" | "fastrtps" => Ok(DdsBackendType::FastDds),
            _ => Err(Error::InvalidConfig(format!("unknown backend: {}", s))),
        }
    }
}

/// One DDS vendor.
///
/// Implemented by:
/// - `CycloneBackend`: built in
/// - anything registered with `ChannelFactory::register_backend`
pub trait DdsBackend: Send + Sync {
    fn backend_type(&self) -> DdsBackendType;

    /// Whether participants can be created on `transport`.
    fn supports_transport(&self, transport: DdsTransportType) -> bool;

    /// Create a domain participant configured for `transport`.
    ///
    /// Fails `UnknownBackend` for unsupported transports.
    fn create_participant(
        &self,
        transport: DdsTransportType,
        config: &ChannelConfig,
    ) -> Result<Box<dyn BackendParticipant>>;
}

/// A domain participant.
pub trait BackendParticipant: Send + Sync {
    fn transport(&self) -> DdsTransportType;

    fn domain_id(&self) -> u32;

    /// Vendor configuration document the participant was created with.
    fn configuration(&self) -> &str;

    /// Create (or attach to) a topic whose samples carry `element_size`
    /// payload bytes in the common case.
    fn create_topic(
        &self,
        name: &str,
        type_name: &str,
        element_size: usize,
    ) -> Result<Box<dyn BackendTopic>>;

    /// Create a disabled writer.
    fn create_writer(
        &self,
        topic: &dyn BackendTopic,
        qos: &EndpointQos,
    ) -> Result<Arc<dyn BackendWriter>>;

    /// Create a disabled reader.
    fn create_reader(
        &self,
        topic: &dyn BackendTopic,
        qos: &EndpointQos,
    ) -> Result<Arc<dyn BackendReader>>;
}

/// A topic created by a participant.
pub trait BackendTopic: Send + Sync {
    fn name(&self) -> &str;

    fn type_name(&self) -> &str;

    /// Transport-imposed per-sample byte limit, `None` if unbounded.
    fn max_sample_size(&self) -> Option<usize>;

    /// Downcast support so an adapter can recover its own topic type.
    fn as_any(&self) -> &dyn Any;
}

/// Publishing side of a topic.
pub trait BackendWriter: Send + Sync {
    /// Start matching readers.
    fn enable(&self) -> Result<()>;

    /// Publish one serialized sample.
    ///
    /// Blocks at most `max_blocking` while the history is full, then fails
    /// `BackendTimeout`.
    fn write(&self, sample: Vec<u8>, max_blocking: Duration) -> Result<()>;

    /// Wait until every matched reader holds every written sample.
    fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()>;

    fn matched_readers(&self) -> usize;

    /// Release the writer. Idempotent.
    fn close(&self);
}

/// Subscribing side of a topic.
pub trait BackendReader: Send + Sync {
    /// Start matching writers.
    fn enable(&self) -> Result<()>;

    /// Take the next serialized sample.
    ///
    /// `None` waits until a sample arrives or the reader is closed,
    /// `Some(Duration::ZERO)` polls. Returns `Ok(None)` on expiry and
    /// `Err(Closed)` once closed.
    fn take(&self, timeout: Option<Duration>) -> Result<Option<Arc<[u8]>>>;

    /// Release the reader and wake blocked `take` calls. Idempotent.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_names() {
        for transport in DdsTransportType::ALL {
            let parsed: DdsTransportType = transport.to_string().parse().expect("round trip");
            assert_eq!(parsed, transport);
        }
        assert_eq!(DdsTransportType::UdpV4.to_string(), "UDPv4");
        assert!("carrier-pigeon".parse::<DdsTransportType>().is_err());
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(DdsBackendType::CycloneDds.to_string(), "CycloneDDS");
        assert_eq!(
            "fastdds".parse::<DdsBackendType>().expect("parse"),
            DdsBackendType::FastDds
        );
        assert!(matches!(
            "opendds".parse::<DdsBackendType>(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
