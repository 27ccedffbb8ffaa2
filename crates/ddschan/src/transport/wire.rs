// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram codec.
//!
//! Every datagram carries one message behind a fixed header, little-endian:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "DDSC"
//! 4       1     version
//! 5       1     kind (1 announce, 2 bye, 3 data, 4 ack)
//! 6       2     reserved
//! 8       12    sender GUID prefix
//! 20      ...   body
//! ```
//!
//! Bodies:
//!
//! ```text
//! ANNOUNCE  domain u32 | transport u8 | revision u32 | part u16 | parts u16
//!           | count u16 | count x endpoint
//! endpoint  kind u8 | id u64 | topic str | type_name str | type_id [14]
//!           | reliability u8 | history u8 | depth u32 | max_samples u32
//! BYE       (empty)
//! DATA      topic str | writer u64 | seq u64 | first_seq u64
//!           | frag_index u32 | frag_count u32 | total_len u32 | chunk
//! ACK       topic str | writer u64 | upto u64
//! ```
//!
//! `str` is a u16 byte length followed by UTF-8.

use crate::backend::DdsTransportType;
use crate::config::MAX_PACKET_SIZE;
use crate::engine::{EndpointId, TypeId};
use crate::error::{Error, Result};
use crate::qos::{EndpointQos, History, Reliability, ResourceLimits};

pub const MAGIC: [u8; 4] = *b"DDSC";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 20;

/// Vendor bytes opening every GUID prefix.
const VENDOR_ID: [u8; 2] = [0x01, 0xDC];

const KIND_ANNOUNCE: u8 = 1;
const KIND_BYE: u8 = 2;
const KIND_DATA: u8 = 3;
const KIND_ACK: u8 = 4;

/// Participant identity on the wire.
///
/// `vendor(2) | data space(4) | process id(4) | participant instance(2)`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuidPrefix([u8; 12]);

impl GuidPrefix {
    pub fn new(space_id: u32, instance: u16) -> Self {
        let mut bytes = [0u8; 12];
        bytes[0..2].copy_from_slice(&VENDOR_ID);
        bytes[2..6].copy_from_slice(&space_id.to_be_bytes());
        bytes[6..10].copy_from_slice(&std::process::id().to_be_bytes());
        bytes[10..12].copy_from_slice(&instance.to_be_bytes());
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Both participants run over one data space and already share every
    /// sample without the wire.
    pub fn same_space(&self, other: &GuidPrefix) -> bool {
        self.0[..10] == other.0[..10]
    }
}

impl std::fmt::Display for GuidPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i == 2 || i == 6 || i == 10 {
                f.write_str(".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GuidPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GuidPrefix({})", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    Writer,
    Reader,
}

/// One enabled endpoint as its participant announces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointAnnouncement {
    pub kind: EndpointKind,
    pub id: EndpointId,
    pub topic: String,
    pub type_name: String,
    pub type_id: TypeId,
    pub qos: EndpointQos,
}

/// Endpoint set of a participant, possibly split over several datagrams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announce {
    pub domain_id: u32,
    pub transport: DdsTransportType,
    /// Bumped each time the sender re-announces.
    pub revision: u32,
    pub part: u16,
    pub parts: u16,
    pub endpoints: Vec<EndpointAnnouncement>,
}

/// One slice of a sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFragment {
    pub topic: String,
    pub writer: EndpointId,
    pub seq: u64,
    /// Oldest sequence number of `writer` the sender still holds.
    pub first_seq: u64,
    pub frag_index: u32,
    pub frag_count: u32,
    pub total_len: u32,
    pub chunk: Vec<u8>,
}

/// Every sample of `writer` up to `upto` is held by the receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    pub topic: String,
    pub writer: EndpointId,
    pub upto: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Announce(Announce),
    Bye,
    Data(DataFragment),
    Ack(Ack),
}

impl Message {
    fn kind(&self) -> u8 {
        match self {
            Message::Announce(_) => KIND_ANNOUNCE,
            Message::Bye => KIND_BYE,
            Message::Data(_) => KIND_DATA,
            Message::Ack(_) => KIND_ACK,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    pub sender: GuidPrefix,
    pub message: Message,
}

impl Datagram {
    pub fn new(sender: GuidPrefix, message: Message) -> Self {
        Self { sender, message }
    }

    /// Serialize into a fresh buffer.
    ///
    /// # Errors
    ///
    /// `BackendError` when a string exceeds 65535 bytes or the datagram
    /// exceeds [`MAX_PACKET_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 64);
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(self.message.kind());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(self.sender.as_bytes());

        match &self.message {
            Message::Announce(a) => {
                buf.extend_from_slice(&a.domain_id.to_le_bytes());
                buf.push(transport_tag(a.transport));
                buf.extend_from_slice(&a.revision.to_le_bytes());
                buf.extend_from_slice(&a.part.to_le_bytes());
                buf.extend_from_slice(&a.parts.to_le_bytes());
                let count = u16::try_from(a.endpoints.len()).map_err(|_| {
                    Error::BackendError(format!("{} endpoints in one announce", a.endpoints.len()))
                })?;
                buf.extend_from_slice(&count.to_le_bytes());
                for ep in &a.endpoints {
                    buf.push(match ep.kind {
                        EndpointKind::Writer => 1,
                        EndpointKind::Reader => 2,
                    });
                    buf.extend_from_slice(&ep.id.to_le_bytes());
                    put_str(&mut buf, &ep.topic)?;
                    put_str(&mut buf, &ep.type_name)?;
                    buf.extend_from_slice(ep.type_id.as_bytes());
                    put_qos(&mut buf, &ep.qos);
                }
            }
            Message::Bye => {}
            Message::Data(d) => {
                put_str(&mut buf, &d.topic)?;
                buf.extend_from_slice(&d.writer.to_le_bytes());
                buf.extend_from_slice(&d.seq.to_le_bytes());
                buf.extend_from_slice(&d.first_seq.to_le_bytes());
                buf.extend_from_slice(&d.frag_index.to_le_bytes());
                buf.extend_from_slice(&d.frag_count.to_le_bytes());
                buf.extend_from_slice(&d.total_len.to_le_bytes());
                buf.extend_from_slice(&d.chunk);
            }
            Message::Ack(a) => {
                put_str(&mut buf, &a.topic)?;
                buf.extend_from_slice(&a.writer.to_le_bytes());
                buf.extend_from_slice(&a.upto.to_le_bytes());
            }
        }

        if buf.len() > MAX_PACKET_SIZE {
            return Err(Error::BackendError(format!(
                "datagram of {} bytes exceeds {}",
                buf.len(),
                MAX_PACKET_SIZE
            )));
        }
        Ok(buf)
    }

    /// Parse one received datagram.
    ///
    /// # Errors
    ///
    /// `BackendError` on a foreign magic, an unknown version or kind, or a
    /// truncated body.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(buf);
        if r.array::<4>()? != MAGIC {
            return Err(malformed("foreign magic"));
        }
        let version = r.u8()?;
        if version != VERSION {
            return Err(malformed(&format!("version {}", version)));
        }
        let kind = r.u8()?;
        r.array::<2>()?;
        let sender = GuidPrefix::from_bytes(r.array::<12>()?);

        let message = match kind {
            KIND_ANNOUNCE => {
                let domain_id = r.u32()?;
                let transport = transport_from_tag(r.u8()?)?;
                let revision = r.u32()?;
                let part = r.u16()?;
                let parts = r.u16()?;
                if parts == 0 || part >= parts {
                    return Err(malformed(&format!("announce part {} of {}", part, parts)));
                }
                let count = r.u16()?;
                let mut endpoints = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let kind = match r.u8()? {
                        1 => EndpointKind::Writer,
                        2 => EndpointKind::Reader,
                        other => return Err(malformed(&format!("endpoint kind {}", other))),
                    };
                    endpoints.push(EndpointAnnouncement {
                        kind,
                        id: r.u64()?,
                        topic: r.string()?,
                        type_name: r.string()?,
                        type_id: TypeId::from_bytes(r.array::<{ TypeId::LEN }>()?),
                        qos: r.qos()?,
                    });
                }
                Message::Announce(Announce {
                    domain_id,
                    transport,
                    revision,
                    part,
                    parts,
                    endpoints,
                })
            }
            KIND_BYE => Message::Bye,
            KIND_DATA => {
                let topic = r.string()?;
                let writer = r.u64()?;
                let seq = r.u64()?;
                let first_seq = r.u64()?;
                let frag_index = r.u32()?;
                let frag_count = r.u32()?;
                let total_len = r.u32()?;
                if frag_index >= frag_count {
                    return Err(malformed(&format!(
                        "fragment {} of {}",
                        frag_index, frag_count
                    )));
                }
                Message::Data(DataFragment {
                    topic,
                    writer,
                    seq,
                    first_seq,
                    frag_index,
                    frag_count,
                    total_len,
                    chunk: r.rest().to_vec(),
                })
            }
            KIND_ACK => Message::Ack(Ack {
                topic: r.string()?,
                writer: r.u64()?,
                upto: r.u64()?,
            }),
            other => return Err(malformed(&format!("message kind {}", other))),
        };

        Ok(Self { sender, message })
    }
}

fn malformed(what: &str) -> Error {
    Error::BackendError(format!("malformed datagram: {}", what))
}

fn transport_tag(transport: DdsTransportType) -> u8 {
    match transport {
        DdsTransportType::UdpV4 => 1,
        DdsTransportType::UdpV6 => 2,
        DdsTransportType::Shm => 3,
        DdsTransportType::TcpV4 => 4,
        DdsTransportType::TcpV6 => 5,
    }
}

fn transport_from_tag(tag: u8) -> Result<DdsTransportType> {
    Ok(match tag {
        1 => DdsTransportType::UdpV4,
        2 => DdsTransportType::UdpV6,
        3 => DdsTransportType::Shm,
        4 => DdsTransportType::TcpV4,
        5 => DdsTransportType::TcpV6,
        other => return Err(malformed(&format!("transport {}", other))),
    })
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| Error::BackendError(format!("string of {} bytes on the wire", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_qos(buf: &mut Vec<u8>, qos: &EndpointQos) {
    buf.push(match qos.reliability {
        Reliability::BestEffort => 0,
        Reliability::Reliable => 1,
    });
    let (history, depth) = match qos.history {
        History::KeepLast(depth) => (0u8, depth),
        History::KeepAll => (1u8, 0),
    };
    buf.push(history);
    buf.extend_from_slice(&depth.to_le_bytes());
    buf.extend_from_slice(&qos.resource_limits.max_samples.to_le_bytes());
}

/// Bounds-checked little-endian reader.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                malformed(&format!(
                    "{} bytes needed at offset {}, {} available",
                    len,
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = usize::from(self.u16()?);
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| malformed("string is not UTF-8"))
    }

    fn qos(&mut self) -> Result<EndpointQos> {
        let reliability = match self.u8()? {
            0 => Reliability::BestEffort,
            1 => Reliability::Reliable,
            other => return Err(malformed(&format!("reliability {}", other))),
        };
        let history_kind = self.u8()?;
        let depth = self.u32()?;
        let history = match history_kind {
            0 => History::KeepLast(depth),
            1 => History::KeepAll,
            other => return Err(malformed(&format!("history {}", other))),
        };
        Ok(EndpointQos {
            reliability,
            history,
            resource_limits: ResourceLimits {
                max_samples: self.u32()?,
            },
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}
