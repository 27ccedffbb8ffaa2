// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS channel: one topic bound to a `(SendPort, RecvPort)` pair.
//!
//! # Port lifecycle
//!
//! ```text
//! Created --start()--> Started --join()--> Joined
//! ```
//!
//! `send`/`recv` are only allowed in `Started`. `join` on a joined port
//! returns `Ok(())`; every other out-of-order call fails with a lifecycle
//! error (`NotStarted`, `AlreadyStarted`, `AlreadyJoined`).
//!
//! # Example
//!
//! ```
//! use ddschan::{ChannelFactory, DdsBackendType, DdsTransportType, MetaData, RecvPort, SendPort};
//!
//! let factory = ChannelFactory::new();
//! let channel = factory
//!     .get_dds_channel("src", "dst", "rt/doc_loopback", 4, 1,
//!                      DdsTransportType::UdpV4, DdsBackendType::CycloneDds)
//!     .unwrap();
//!
//! let tx = channel.send_port();
//! let rx = channel.recv_port();
//! tx.start().unwrap();
//! rx.start().unwrap();
//!
//! tx.send(&MetaData::from_bytes(vec![42])).unwrap();
//! assert_eq!(rx.recv().unwrap().payload(), &[42]);
//!
//! tx.join().unwrap();
//! rx.join().unwrap();
//! ```

mod recv;
mod send;

pub use recv::DdsRecvPort;
pub use send::DdsSendPort;

use crate::backend::{BackendTopic, DdsBackendType, DdsTransportType, SharedParticipant};
use crate::config::{ChannelConfig, METADATA_TYPE_NAME};
use crate::error::{Error, Result};
use crate::metadata::MetaData;
use crate::qos::EndpointQos;
use std::sync::Arc;

/// Sending half of a channel, as seen by an actor runtime.
pub trait SendPort: Send + Sync {
    fn name(&self) -> &str;

    /// Arm the port. Only valid once, from `Created`.
    fn start(&self) -> Result<()>;

    /// Publish one descriptor. Blocks while the peer is behind.
    fn send(&self, metadata: &MetaData) -> Result<()>;

    /// Drain and release. Idempotent once started.
    fn join(&self) -> Result<()>;
}

/// Receiving half of a channel, as seen by an actor runtime.
pub trait RecvPort: Send + Sync {
    fn name(&self) -> &str;

    /// Arm the port. Only valid once, from `Created`.
    fn start(&self) -> Result<()>;

    /// Block until the next descriptor; `Err(Closed)` once joined.
    fn recv(&self) -> Result<MetaData>;

    /// Next descriptor if one is pending.
    fn try_recv(&self) -> Result<Option<MetaData>>;

    /// Release and wake blocked `recv` calls. Idempotent once started.
    fn join(&self) -> Result<()>;
}

/// Port lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Created,
    Started,
    Joined,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Created => write!(f, "created"),
            PortState::Started => write!(f, "started"),
            PortState::Joined => write!(f, "joined"),
        }
    }
}

/// Counters snapshot of one port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    /// Samples sent or received.
    pub samples: u64,
    /// Serialized bytes sent or received (header included).
    pub bytes: u64,
    /// Received samples that failed to decode.
    pub decode_failures: u64,
}

/// Everything that distinguishes one channel from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelIdentity {
    pub src_name: String,
    pub dst_name: String,
    pub topic: String,
    /// History depth in samples.
    pub depth: usize,
    /// Byte size of one payload element.
    pub element_size: usize,
    pub transport: DdsTransportType,
    pub backend: DdsBackendType,
}

impl ChannelIdentity {
    pub fn new(
        src_name: impl Into<String>,
        dst_name: impl Into<String>,
        topic: impl Into<String>,
        depth: usize,
        element_size: usize,
        transport: DdsTransportType,
        backend: DdsBackendType,
    ) -> Self {
        Self {
            src_name: src_name.into(),
            dst_name: dst_name.into(),
            topic: topic.into(),
            depth,
            element_size,
            transport,
            backend,
        }
    }

    /// Check the parts that do not depend on registered backends.
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 || u32::try_from(self.depth).is_err() {
            return Err(Error::InvalidDepth);
        }
        if self.topic.is_empty() {
            return Err(Error::InvalidConfig("topic name is empty".into()));
        }
        Ok(())
    }
}

impl std::fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} on '{}' (depth={}, elsize={}, {}/{})",
            self.src_name,
            self.dst_name,
            self.topic,
            self.depth,
            self.element_size,
            self.backend,
            self.transport
        )
    }
}

/// A live channel.
///
/// Created by [`ChannelFactory`](crate::ChannelFactory) only.
pub struct DdsChannel {
    identity: ChannelIdentity,
    send_port: Arc<DdsSendPort>,
    recv_port: Arc<DdsRecvPort>,
    topic: Box<dyn BackendTopic>,
    // Declared last: dropped after the endpoints created from it.
    participant: Arc<SharedParticipant>,
}

impl DdsChannel {
    pub(crate) fn open(
        identity: ChannelIdentity,
        participant: Arc<SharedParticipant>,
        config: &ChannelConfig,
    ) -> Result<Self> {
        identity.validate()?;
        let depth = u32::try_from(identity.depth).map_err(|_| Error::InvalidDepth)?;

        let topic =
            participant.create_topic(&identity.topic, METADATA_TYPE_NAME, identity.element_size)?;
        let qos = EndpointQos::channel(depth);
        let writer = participant.create_writer(topic.as_ref(), &qos)?;
        let reader = participant.create_reader(topic.as_ref(), &qos)?;

        let send_port = Arc::new(DdsSendPort::new(
            identity.src_name.clone(),
            identity.topic.clone(),
            writer,
            config.clone(),
        ));
        let recv_port = Arc::new(DdsRecvPort::new(
            identity.dst_name.clone(),
            identity.topic.clone(),
            reader,
        ));

        log::info!("[channel] Opened {}", identity);

        Ok(Self {
            identity,
            send_port,
            recv_port,
            topic,
            participant,
        })
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.identity
    }

    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }

    /// Vendor configuration of the shared participant.
    pub fn participant_config(&self) -> &str {
        self.participant.configuration()
    }

    pub fn send_port(&self) -> Arc<DdsSendPort> {
        Arc::clone(&self.send_port)
    }

    pub fn recv_port(&self) -> Arc<DdsRecvPort> {
        Arc::clone(&self.recv_port)
    }

    /// Join both ports whatever their state.
    pub(crate) fn close(&self) {
        self.send_port.shutdown();
        self.recv_port.shutdown();
        log::info!("[channel] Closed {}", self.identity);
    }
}

impl std::fmt::Debug for DdsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdsChannel")
            .field("identity", &self.identity)
            .field("send_state", &self.send_port.state())
            .field("recv_state", &self.recv_port.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(depth: usize, topic: &str) -> ChannelIdentity {
        ChannelIdentity::new(
            "src",
            "dst",
            topic,
            depth,
            1,
            DdsTransportType::UdpV4,
            DdsBackendType::CycloneDds,
        )
    }

    #[test]
    fn test_identity_validation() {
        assert!(identity(1, "rt/a").validate().is_ok());
        assert_eq!(identity(0, "rt/a").validate(), Err(Error::InvalidDepth));
        assert!(matches!(
            identity(1, "").validate(),
            Err(Error::InvalidConfig(_))
        ));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            identity(u32::MAX as usize + 1, "rt/a").validate(),
            Err(Error::InvalidDepth)
        );
    }

    #[test]
    fn test_identity_display() {
        let text = identity(10, "rt/dds_topic").to_string();
        assert!(text.contains("src -> dst"));
        assert!(text.contains("CycloneDDS/UDPv4"));
    }

    #[test]
    fn test_port_state_display() {
        assert_eq!(PortState::Joined.to_string(), "joined");
    }
}
