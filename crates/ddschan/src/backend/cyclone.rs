// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cyclone DDS adapter.
//!
//! Participants are configured the way Cyclone expects (one XML document per
//! participant, selected by transport). Endpoints of one adapter instance
//! meet in its in-memory data space; each participant also starts a
//! [`WireBridge`] so endpoints of other adapter instances and other
//! processes on the same domain and transport are matched over UDP.
//! If the sockets cannot be opened the participant stays process-local.
//!
//! | Transport | Cyclone configuration |
//! |-----------|-----------------------|
//! | UDPv4 | `<Transport>udp</Transport>` |
//! | UDPv6 | `<Transport>udp6</Transport>` |
//! | SHM | `<SharedMemory><Enable>true</Enable>` over udp |
//! | TCPv4/TCPv6 | not offered (`UnknownBackend`) |

use super::{
    BackendParticipant, BackendReader, BackendTopic, BackendWriter, DdsBackend, DdsBackendType,
    DdsTransportType,
};
use crate::config::{ChannelConfig, METADATA_HEADER_LEN};
use crate::engine::{
    DataSpaceReader, DataSpaceWriter, DomainRegistry, DomainState, Origin, TopicState, NO_LINK,
};
use crate::error::{Error, Result};
use crate::qos::EndpointQos;
use crate::transport::{
    next_space_id, EndpointKind, GuidPrefix, LocalEndpoint, WireBridge, WireLink,
};
use std::any::Any;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Transports Cyclone participants can be created on.
pub const SUPPORTED_TRANSPORTS: [DdsTransportType; 3] = [
    DdsTransportType::UdpV4,
    DdsTransportType::UdpV6,
    DdsTransportType::Shm,
];

/// Render the Cyclone configuration document for `transport`.
pub fn config_xml(transport: DdsTransportType, domain_id: u32) -> Result<String> {
    let (network, shared_memory) = match transport {
        DdsTransportType::UdpV4 => ("udp", false),
        DdsTransportType::UdpV6 => ("udp6", false),
        DdsTransportType::Shm => ("udp", true),
        DdsTransportType::TcpV4 | DdsTransportType::TcpV6 => {
            return Err(Error::UnknownBackend {
                backend: DdsBackendType::CycloneDds,
                transport,
            })
        }
    };

    let mut xml = String::with_capacity(512);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n");
    xml.push_str("<CycloneDDS xmlns=\"https://cdds.io/config\">\n");
    xml.push_str(&format!("  <Domain id=\"{}\">\n", domain_id));
    xml.push_str("    <General>\n");
    xml.push_str(&format!("      <Transport>{}</Transport>\n", network));
    xml.push_str("    </General>\n");
    if shared_memory {
        xml.push_str("    <SharedMemory>\n");
        xml.push_str("      <Enable>true</Enable>\n");
        xml.push_str("    </SharedMemory>\n");
    }
    xml.push_str("  </Domain>\n");
    xml.push_str("</CycloneDDS>\n");
    Ok(xml)
}

/// The Cyclone DDS adapter.
///
/// Each adapter instance owns its own data space: participants from the same
/// instance on the same domain see each other's topics in memory, and reach
/// every other data space through their wire bridges.
pub struct CycloneBackend {
    space: DomainRegistry,
    space_id: u32,
    next_instance: AtomicU16,
}

impl Default for CycloneBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CycloneBackend {
    pub fn new() -> Self {
        Self {
            space: DomainRegistry::new(),
            space_id: next_space_id(),
            next_instance: AtomicU16::new(0),
        }
    }

    /// Domains with at least one live participant.
    pub fn active_domains(&self) -> usize {
        self.space.active_domain_count()
    }
}

impl DdsBackend for CycloneBackend {
    fn backend_type(&self) -> DdsBackendType {
        DdsBackendType::CycloneDds
    }

    fn supports_transport(&self, transport: DdsTransportType) -> bool {
        SUPPORTED_TRANSPORTS.contains(&transport)
    }

    fn create_participant(
        &self,
        transport: DdsTransportType,
        config: &ChannelConfig,
    ) -> Result<Box<dyn BackendParticipant>> {
        config.validate()?;
        let xml = config_xml(transport, config.domain_id)?;
        let domain = self.space.get_or_create(config.domain_id);

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let prefix = GuidPrefix::new(self.space_id, instance);
        let bridge = match WireBridge::start(config.domain_id, transport, prefix) {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                log::warn!(
                    "[cyclone] wire transport unavailable, participant stays process-local: {}",
                    e
                );
                None
            }
        };

        log::info!(
            "[cyclone] Participant created domain={} transport={} guid_prefix={}",
            config.domain_id,
            transport,
            prefix
        );
        log::debug!("[cyclone] configuration:\n{}", xml);

        Ok(Box::new(CycloneParticipant {
            transport,
            domain,
            xml,
            bridge,
        }))
    }
}

struct CycloneParticipant {
    transport: DdsTransportType,
    domain: Arc<DomainState>,
    xml: String,
    bridge: Option<WireBridge>,
}

impl CycloneParticipant {
    fn own_topic<'a>(&self, topic: &'a dyn BackendTopic) -> Result<&'a CycloneTopic> {
        let topic = topic.as_any().downcast_ref::<CycloneTopic>().ok_or_else(|| {
            Error::BackendError(format!(
                "topic '{}' was not created by a Cyclone participant",
                topic.name()
            ))
        })?;
        if topic.state.domain_id() != self.domain.domain_id {
            return Err(Error::BackendError(format!(
                "topic '{}' belongs to domain {}, participant to {}",
                topic.name(),
                topic.state.domain_id(),
                self.domain.domain_id
            )));
        }
        Ok(topic)
    }

    fn link(&self) -> Option<WireLink> {
        self.bridge.as_ref().map(WireBridge::link)
    }

    fn origin(&self) -> Origin {
        Origin::Local(self.bridge.as_ref().map_or(NO_LINK, |b| b.link().id()))
    }
}

impl BackendParticipant for CycloneParticipant {
    fn transport(&self) -> DdsTransportType {
        self.transport
    }

    fn domain_id(&self) -> u32 {
        self.domain.domain_id
    }

    fn configuration(&self) -> &str {
        &self.xml
    }

    fn create_topic(
        &self,
        name: &str,
        type_name: &str,
        element_size: usize,
    ) -> Result<Box<dyn BackendTopic>> {
        let state = self.domain.register_topic(name, type_name)?;
        // SHM chunks are fixed at topic creation.
        let max_sample_size = match self.transport {
            DdsTransportType::Shm => Some(METADATA_HEADER_LEN + element_size),
            _ => None,
        };
        Ok(Box::new(CycloneTopic {
            state,
            max_sample_size,
        }))
    }

    fn create_writer(
        &self,
        topic: &dyn BackendTopic,
        qos: &EndpointQos,
    ) -> Result<Arc<dyn BackendWriter>> {
        let topic = self.own_topic(topic)?;
        let inner =
            DataSpaceWriter::create_with_origin(Arc::clone(&topic.state), *qos, self.origin())?;
        Ok(Arc::new(CycloneWriter {
            inner,
            max_sample_size: topic.max_sample_size,
            link: self.link(),
        }))
    }

    fn create_reader(
        &self,
        topic: &dyn BackendTopic,
        qos: &EndpointQos,
    ) -> Result<Arc<dyn BackendReader>> {
        let topic = self.own_topic(topic)?;
        let inner = DataSpaceReader::create_with_origin(
            Arc::clone(&topic.state),
            *qos,
            self.origin(),
            None,
        )?;
        Ok(Arc::new(CycloneReader {
            inner,
            link: self.link(),
        }))
    }
}

impl Drop for CycloneParticipant {
    fn drop(&mut self) {
        log::info!(
            "[cyclone] Participant deleted domain={} transport={}",
            self.domain.domain_id,
            self.transport
        );
    }
}

struct CycloneTopic {
    state: Arc<TopicState>,
    max_sample_size: Option<usize>,
}

impl BackendTopic for CycloneTopic {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn type_name(&self) -> &str {
        self.state.type_name()
    }

    fn max_sample_size(&self) -> Option<usize> {
        self.max_sample_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CycloneWriter {
    inner: DataSpaceWriter,
    max_sample_size: Option<usize>,
    link: Option<WireLink>,
}

impl CycloneWriter {
    fn withdraw(&self) {
        if let Some(link) = &self.link {
            link.withdraw(EndpointKind::Writer, self.inner.topic().name(), self.inner.id());
        }
    }
}

impl BackendWriter for CycloneWriter {
    fn enable(&self) -> Result<()> {
        self.inner.enable()?;
        if let Some(link) = &self.link {
            link.publish(LocalEndpoint {
                kind: EndpointKind::Writer,
                topic: Arc::clone(self.inner.topic()),
                id: self.inner.id(),
                qos: *self.inner.qos(),
            });
        }
        Ok(())
    }

    fn write(&self, sample: Vec<u8>, max_blocking: Duration) -> Result<()> {
        if let Some(max) = self.max_sample_size {
            if sample.len() > max {
                return Err(Error::BackendError(format!(
                    "sample of {} bytes exceeds shared memory chunk of {} bytes",
                    sample.len(),
                    max
                )));
            }
        }
        let seq = self.inner.write(Arc::from(sample), max_blocking)?;
        log::debug!(
            "[cyclone] wrote seq={} on '{}'",
            seq,
            self.inner.topic().name()
        );
        Ok(())
    }

    fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.inner.wait_for_acknowledgments(timeout)
    }

    /// Local readers count one each; a remote participant counts once per
    /// topic however many readers it has there.
    fn matched_readers(&self) -> usize {
        self.inner.matched_readers()
    }

    fn close(&self) {
        self.withdraw();
        self.inner.close();
    }
}

impl Drop for CycloneWriter {
    fn drop(&mut self) {
        self.withdraw();
    }
}

struct CycloneReader {
    inner: DataSpaceReader,
    link: Option<WireLink>,
}

impl CycloneReader {
    fn withdraw(&self) {
        if let Some(link) = &self.link {
            link.withdraw(EndpointKind::Reader, self.inner.topic().name(), self.inner.id());
        }
    }
}

impl BackendReader for CycloneReader {
    fn enable(&self) -> Result<()> {
        self.inner.enable()?;
        if let Some(link) = &self.link {
            link.publish(LocalEndpoint {
                kind: EndpointKind::Reader,
                topic: Arc::clone(self.inner.topic()),
                id: self.inner.id(),
                qos: *self.inner.qos(),
            });
        }
        Ok(())
    }

    fn take(&self, timeout: Option<Duration>) -> Result<Option<Arc<[u8]>>> {
        Ok(self.inner.take(timeout)?.map(|sample| sample.payload))
    }

    fn close(&self) {
        self.withdraw();
        self.inner.close();
    }
}

impl Drop for CycloneReader {
    fn drop(&mut self) {
        self.withdraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::METADATA_TYPE_NAME;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_config_xml_per_transport() {
        let udp = config_xml(DdsTransportType::UdpV4, 0).expect("udp");
        assert!(udp.contains("<Transport>udp</Transport>"));
        assert!(!udp.contains("SharedMemory"));

        let udp6 = config_xml(DdsTransportType::UdpV6, 7).expect("udp6");
        assert!(udp6.contains("<Transport>udp6</Transport>"));
        assert!(udp6.contains("<Domain id=\"7\">"));

        let shm = config_xml(DdsTransportType::Shm, 0).expect("shm");
        assert!(shm.contains("<SharedMemory>"));
    }

    #[test]
    fn test_config_xml_is_well_formed() {
        for transport in SUPPORTED_TRANSPORTS {
            let xml = config_xml(transport, 1).expect("supported");
            let doc = roxmltree::Document::parse(&xml).expect("well-formed XML");
            let root = doc.root_element();
            assert_eq!(root.tag_name().name(), "CycloneDDS");

            let network = root
                .descendants()
                .find(|n| n.has_tag_name("Transport"))
                .and_then(|n| n.text())
                .expect("Transport element");
            let shm_enabled = root
                .descendants()
                .find(|n| n.has_tag_name("Enable"))
                .and_then(|n| n.text());

            match transport {
                DdsTransportType::UdpV6 => assert_eq!(network, "udp6"),
                _ => assert_eq!(network, "udp"),
            }
            assert_eq!(
                shm_enabled == Some("true"),
                transport == DdsTransportType::Shm
            );
        }
    }

    #[test]
    fn test_tcp_not_offered() {
        let backend = CycloneBackend::new();
        assert!(!backend.supports_transport(DdsTransportType::TcpV4));
        let err = backend
            .create_participant(DdsTransportType::TcpV6, &ChannelConfig::default())
            .err()
            .expect("tcp rejected");
        assert_eq!(
            err,
            Error::UnknownBackend {
                backend: DdsBackendType::CycloneDds,
                transport: DdsTransportType::TcpV6
            }
        );
    }

    #[test]
    fn test_participant_loopback() {
        let backend = CycloneBackend::new();
        let participant = backend
            .create_participant(DdsTransportType::UdpV4, &ChannelConfig::default())
            .expect("participant");
        assert!(participant.configuration().contains("udp"));

        let topic = participant
            .create_topic("rt/cyclone", METADATA_TYPE_NAME, 1)
            .expect("topic");
        assert_eq!(topic.max_sample_size(), None);

        let qos = EndpointQos::channel(4);
        let writer = participant
            .create_writer(topic.as_ref(), &qos)
            .expect("writer");
        let reader = participant
            .create_reader(topic.as_ref(), &qos)
            .expect("reader");
        writer.enable().expect("enable");
        reader.enable().expect("enable");
        assert_eq!(writer.matched_readers(), 1);

        writer.write(vec![1, 2, 3], SHORT).expect("write");
        let sample = reader.take(Some(SHORT)).expect("take").expect("sample");
        assert_eq!(&*sample, &[1, 2, 3]);
        assert!(reader.take(Some(Duration::ZERO)).expect("poll").is_none());
    }

    #[test]
    fn test_shm_chunk_limit() {
        let backend = CycloneBackend::new();
        let participant = backend
            .create_participant(DdsTransportType::Shm, &ChannelConfig::default())
            .expect("participant");
        let topic = participant
            .create_topic("rt/shm", METADATA_TYPE_NAME, 4)
            .expect("topic");
        assert_eq!(topic.max_sample_size(), Some(METADATA_HEADER_LEN + 4));

        let writer = participant
            .create_writer(topic.as_ref(), &EndpointQos::channel(2))
            .expect("writer");
        writer.enable().expect("enable");
        writer
            .write(vec![0; METADATA_HEADER_LEN + 4], SHORT)
            .expect("fits");
        let err = writer
            .write(vec![0; METADATA_HEADER_LEN + 5], SHORT)
            .expect_err("too large");
        assert!(matches!(err, Error::BackendError(_)));
    }

    #[test]
    fn test_foreign_topic_rejected() {
        struct Foreign;
        impl BackendTopic for Foreign {
            fn name(&self) -> &str {
                "rt/foreign"
            }
            fn type_name(&self) -> &str {
                METADATA_TYPE_NAME
            }
            fn max_sample_size(&self) -> Option<usize> {
                None
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let backend = CycloneBackend::new();
        let participant = backend
            .create_participant(DdsTransportType::UdpV4, &ChannelConfig::default())
            .expect("participant");
        assert!(participant
            .create_writer(&Foreign, &EndpointQos::channel(1))
            .is_err());
    }

    #[test]
    fn test_domain_released_with_participants() {
        let backend = CycloneBackend::new();
        let p = backend
            .create_participant(DdsTransportType::UdpV4, &ChannelConfig::default())
            .expect("participant");
        assert_eq!(backend.active_domains(), 1);
        drop(p);
        assert_eq!(backend.active_domains(), 0);
    }

    #[test]
    fn test_adapters_meet_over_the_wire() {
        let deadline = Duration::from_secs(5);
        let tx_backend = CycloneBackend::new();
        let rx_backend = CycloneBackend::new();
        let tx = tx_backend
            .create_participant(DdsTransportType::Shm, &ChannelConfig::default())
            .expect("participant");
        let rx = rx_backend
            .create_participant(DdsTransportType::Shm, &ChannelConfig::default())
            .expect("participant");

        let qos = EndpointQos::channel(4);
        let tx_topic = tx
            .create_topic("rt/cyclone_wire", METADATA_TYPE_NAME, 2)
            .expect("topic");
        let rx_topic = rx
            .create_topic("rt/cyclone_wire", METADATA_TYPE_NAME, 2)
            .expect("topic");
        let writer = tx.create_writer(tx_topic.as_ref(), &qos).expect("writer");
        let reader = rx.create_reader(rx_topic.as_ref(), &qos).expect("reader");
        writer.enable().expect("enable");
        reader.enable().expect("enable");

        let start = std::time::Instant::now();
        while writer.matched_readers() == 0 && start.elapsed() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(writer.matched_readers(), 1);

        writer.write(vec![9, 9], deadline).expect("write");
        let sample = reader.take(Some(deadline)).expect("take").expect("sample");
        assert_eq!(&*sample, &[9, 9]);
        writer.wait_for_acknowledgments(deadline).expect("acknowledged");

        reader.close();
        let start = std::time::Instant::now();
        while writer.matched_readers() > 0 && start.elapsed() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(writer.matched_readers(), 0);
    }
}
