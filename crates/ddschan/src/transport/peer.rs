// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer state.
//!
//! A peer is a participant of another data space. For every topic where it
//! reads and this participant writes, a remote stand-in reader collects the
//! samples to send; for every writer it announces on a topic read here, a
//! remote stand-in writer injects what arrives.
//!
//! Delivery is go-back-N per (topic, writer): the receiver accepts only the
//! next expected sequence number and acknowledges it, the sender resends
//! everything still unacknowledged once acknowledgements stall.

use super::wire::{Ack, Announce, DataFragment, EndpointAnnouncement, EndpointKind, GuidPrefix};
use crate::config::FRAGMENT_SIZE;
use crate::engine::{
    CachedSample, DataSpaceReader, DataSpaceWriter, DeliveryListener, EndpointId, LinkId, Origin,
    TopicState,
};
use crate::error::Error;
use crate::qos::{EndpointQos, History, Reliability, ResourceLimits};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Enabled endpoint a participant published on its link.
#[derive(Clone)]
pub struct LocalEndpoint {
    pub kind: EndpointKind,
    pub topic: Arc<TopicState>,
    pub id: EndpointId,
    pub qos: EndpointQos,
}

impl LocalEndpoint {
    pub(super) fn announcement(&self) -> EndpointAnnouncement {
        EndpointAnnouncement {
            kind: self.kind,
            id: self.id,
            topic: self.topic.name().to_string(),
            type_name: self.topic.type_name().to_string(),
            type_id: self.topic.type_id(),
            qos: self.qos,
        }
    }
}

impl std::fmt::Debug for LocalEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEndpoint")
            .field("kind", &self.kind)
            .field("topic", &self.topic.name())
            .field("id", &self.id)
            .finish()
    }
}

/// Stricter of two reader policies, so one stand-in serves every reader a
/// peer has on a topic.
fn strictest(a: EndpointQos, b: EndpointQos) -> EndpointQos {
    let reliability = if a.reliability == Reliability::Reliable || b.reliability == Reliability::Reliable
    {
        Reliability::Reliable
    } else {
        Reliability::BestEffort
    };
    let history = match (a.history, b.history) {
        (History::KeepLast(x), History::KeepLast(y)) => History::KeepLast(x.max(y)),
        _ => History::KeepAll,
    };
    EndpointQos {
        reliability,
        history,
        resource_limits: ResourceLimits {
            max_samples: a
                .resource_limits
                .max_samples
                .max(b.resource_limits.max_samples),
        },
    }
}

/// Samples bound for one peer on one topic.
struct Outbound {
    reader: DataSpaceReader,
    /// Highest sequence number sent per local writer.
    sent: HashMap<EndpointId, u64>,
    /// Set while samples await acknowledgement; moved on by progress.
    waiting_since: Option<Instant>,
}

/// Samples arriving from one writer of the peer.
struct Inbound {
    writer: DataSpaceWriter,
    next_expected: Option<u64>,
    partial: Option<Reassembly>,
}

struct Reassembly {
    seq: u64,
    received: Vec<bool>,
    remaining: usize,
    buf: Vec<u8>,
}

impl Inbound {
    /// Collect fragment `frag`; the full sample once every slice is in.
    fn assemble(&mut self, frag: DataFragment) -> Option<Vec<u8>> {
        let total = frag.total_len as usize;
        let count = frag.frag_count as usize;
        let index = frag.frag_index as usize;
        if count != total.div_ceil(FRAGMENT_SIZE).max(1) {
            log::debug!(
                "[wire] {} fragments for {} bytes on '{}', dropped",
                count,
                total,
                frag.topic
            );
            return None;
        }
        let offset = index * FRAGMENT_SIZE;
        let expected = (total - offset.min(total)).min(FRAGMENT_SIZE);
        if frag.chunk.len() != expected {
            log::debug!(
                "[wire] fragment {}/{} of seq {} holds {} bytes, expected {}",
                index,
                count,
                frag.seq,
                frag.chunk.len(),
                expected
            );
            return None;
        }
        if count == 1 {
            self.partial = None;
            return Some(frag.chunk);
        }

        let fresh = !matches!(&self.partial, Some(p) if p.seq == frag.seq && p.buf.len() == total);
        if fresh {
            self.partial = Some(Reassembly {
                seq: frag.seq,
                received: vec![false; count],
                remaining: count,
                buf: vec![0; total],
            });
        }
        let partial = self.partial.as_mut()?;
        if !partial.received[index] {
            partial.buf[offset..offset + expected].copy_from_slice(&frag.chunk);
            partial.received[index] = true;
            partial.remaining -= 1;
        }
        if partial.remaining == 0 {
            self.partial.take().map(|p| p.buf)
        } else {
            None
        }
    }
}

/// Slice one sample into DATA fragments.
fn fragment(topic: &str, sample: &CachedSample, first_seq: u64) -> Option<Vec<DataFragment>> {
    let total = sample.payload.len();
    let total_len = u32::try_from(total).ok()?;
    let count = total.div_ceil(FRAGMENT_SIZE).max(1);
    let frag_count = u32::try_from(count).ok()?;

    Some(
        (0..frag_count)
            .map(|index| {
                let start = index as usize * FRAGMENT_SIZE;
                let end = (start + FRAGMENT_SIZE).min(total);
                DataFragment {
                    topic: topic.to_string(),
                    writer: sample.writer,
                    seq: sample.seq,
                    first_seq,
                    frag_index: index,
                    frag_count,
                    total_len,
                    chunk: sample.payload[start..end].to_vec(),
                }
            })
            .collect(),
    )
}

/// Participant of another data space.
pub(super) struct Peer {
    pub prefix: GuidPrefix,
    /// Where its unicast traffic comes from.
    pub addr: SocketAddr,
    pub last_seen: Instant,
    endpoints: Vec<EndpointAnnouncement>,
    assembling: Option<(u32, Vec<Option<Vec<EndpointAnnouncement>>>)>,
    outbound: HashMap<String, Outbound>,
    inbound: HashMap<(String, EndpointId), Inbound>,
    /// Topics already reported with a type mismatch.
    conflicts: HashSet<String>,
}

impl Peer {
    pub fn new(prefix: GuidPrefix, addr: SocketAddr, now: Instant) -> Self {
        Self {
            prefix,
            addr,
            last_seen: now,
            endpoints: Vec::new(),
            assembling: None,
            outbound: HashMap::new(),
            inbound: HashMap::new(),
            conflicts: HashSet::new(),
        }
    }

    /// Merge one announce datagram. True once a complete endpoint set
    /// replaced the previous one.
    pub fn absorb(&mut self, announce: Announce) -> bool {
        let parts = usize::from(announce.parts);
        let part = usize::from(announce.part);
        if parts == 1 {
            self.endpoints = announce.endpoints;
            self.assembling = None;
            return true;
        }

        let fresh = !matches!(&self.assembling, Some((revision, slots)) if *revision == announce.revision && slots.len() == parts);
        if fresh {
            self.assembling = Some((announce.revision, vec![None; parts]));
        }
        let Some((_, slots)) = self.assembling.as_mut() else {
            return false;
        };
        if let Some(slot) = slots.get_mut(part) {
            *slot = Some(announce.endpoints);
        }
        if slots.iter().any(Option::is_none) {
            return false;
        }

        let slots = std::mem::take(slots);
        self.endpoints = slots.into_iter().flatten().flatten().collect();
        self.assembling = None;
        true
    }

    /// Create the stand-ins the current endpoint sets call for and drop the
    /// ones they no longer do.
    pub fn reconcile(&mut self, local: &[LocalEndpoint], link: LinkId, listener: &DeliveryListener) {
        let mut wanted_out: HashMap<&str, (&Arc<TopicState>, EndpointQos)> = HashMap::new();
        let mut wanted_in: HashMap<(String, EndpointId), (&Arc<TopicState>, EndpointQos)> =
            HashMap::new();
        let mut conflicts = Vec::new();

        for remote in &self.endpoints {
            let wanted_kind = match remote.kind {
                EndpointKind::Reader => EndpointKind::Writer,
                EndpointKind::Writer => EndpointKind::Reader,
            };
            let Some(mine) = local
                .iter()
                .find(|l| l.kind == wanted_kind && l.topic.name() == remote.topic)
            else {
                continue;
            };
            if mine.topic.type_id() != remote.type_id {
                conflicts.push((remote.topic.clone(), remote.type_name.clone()));
                continue;
            }

            match remote.kind {
                EndpointKind::Reader => {
                    wanted_out
                        .entry(remote.topic.as_str())
                        .and_modify(|(_, qos)| *qos = strictest(*qos, remote.qos))
                        .or_insert((&mine.topic, remote.qos));
                }
                EndpointKind::Writer => {
                    wanted_in.insert((remote.topic.clone(), remote.id), (&mine.topic, remote.qos));
                }
            }
        }

        for (topic, type_name) in conflicts {
            if self.conflicts.insert(topic.clone()) {
                log::warn!(
                    "[wire] peer {} uses type '{}' on topic '{}'; not matched",
                    self.prefix,
                    type_name,
                    topic
                );
            }
        }

        self.outbound
            .retain(|topic, _| wanted_out.contains_key(topic.as_str()));
        for (topic, (state, qos)) in wanted_out {
            if self.outbound.contains_key(topic) {
                continue;
            }
            match DataSpaceReader::create_with_origin(
                Arc::clone(state),
                qos,
                Origin::Remote(link),
                Some(Arc::clone(listener)),
            ) {
                Ok(reader) => {
                    log::debug!("[wire] peer {} reads '{}'", self.prefix, topic);
                    self.outbound.insert(
                        topic.to_string(),
                        Outbound {
                            reader,
                            sent: HashMap::new(),
                            waiting_since: None,
                        },
                    );
                }
                Err(e) => log::warn!(
                    "[wire] reader of peer {} on '{}' rejected: {}",
                    self.prefix,
                    topic,
                    e
                ),
            }
        }

        self.inbound.retain(|key, _| wanted_in.contains_key(key));
        for (key, (state, qos)) in wanted_in {
            if self.inbound.contains_key(&key) {
                continue;
            }
            match DataSpaceWriter::create_with_origin(Arc::clone(state), qos, Origin::Remote(link)) {
                Ok(writer) => {
                    log::debug!(
                        "[wire] peer {} writes '{}' (writer #{})",
                        self.prefix,
                        key.0,
                        key.1
                    );
                    self.inbound.insert(
                        key,
                        Inbound {
                            writer,
                            next_expected: None,
                            partial: None,
                        },
                    );
                }
                Err(e) => log::warn!(
                    "[wire] writer of peer {} on '{}' rejected: {}",
                    self.prefix,
                    key.0,
                    e
                ),
            }
        }
    }

    /// Accept one DATA fragment; the acknowledgement to send back, if any.
    pub fn on_data(&mut self, frag: DataFragment) -> Option<Ack> {
        let key = (frag.topic.clone(), frag.writer);
        let Some(inbound) = self.inbound.get_mut(&key) else {
            // Not matched yet; the sender keeps resending.
            return None;
        };

        let mut next = *inbound.next_expected.get_or_insert(frag.first_seq);
        if next < frag.first_seq {
            // The sender no longer holds what we wait for (keep-last eviction).
            next = frag.first_seq;
            inbound.next_expected = Some(next);
            inbound.partial = None;
        }
        let (topic, writer, seq) = (key.0, key.1, frag.seq);
        if seq < next {
            return Some(Ack {
                topic,
                writer,
                upto: next - 1,
            });
        }
        if seq > next {
            return None;
        }

        let payload = inbound.assemble(frag)?;
        match inbound.writer.write(Arc::from(payload), Duration::ZERO) {
            Ok(_) => {
                inbound.next_expected = Some(seq + 1);
                Some(Ack {
                    topic,
                    writer,
                    upto: seq,
                })
            }
            // Local readers are full; the sender resends.
            Err(Error::BackendTimeout(_)) => None,
            Err(e) => {
                log::debug!("[wire] seq {} on '{}' not injected: {}", seq, topic, e);
                None
            }
        }
    }

    /// Release what the peer acknowledged.
    pub fn on_ack(&mut self, ack: &Ack, now: Instant) {
        let Some(outbound) = self.outbound.get_mut(&ack.topic) else {
            return;
        };
        if outbound.reader.acknowledge(ack.writer, ack.upto) > 0 {
            outbound.waiting_since = if outbound.reader.is_empty() {
                None
            } else {
                Some(now)
            };
        }
    }

    /// Fragments to send now: whatever was never sent, plus everything
    /// unacknowledged once `resend_after` passed without progress.
    pub fn collect_outbound(&mut self, now: Instant, resend_after: Duration) -> Vec<DataFragment> {
        let mut out = Vec::new();

        for (topic, outbound) in &mut self.outbound {
            let pending = outbound.reader.pending();
            if pending.is_empty() {
                outbound.waiting_since = None;
                continue;
            }
            if outbound
                .waiting_since
                .is_some_and(|since| now.duration_since(since) >= resend_after)
            {
                log::debug!(
                    "[wire] resending {} sample(s) of '{}' to {}",
                    pending.len(),
                    topic,
                    self.prefix
                );
                outbound.sent.clear();
                outbound.waiting_since = Some(now);
            }

            let mut first_seq: HashMap<EndpointId, u64> = HashMap::new();
            for sample in &pending {
                first_seq.entry(sample.writer).or_insert(sample.seq);
            }

            for sample in &pending {
                let sent = outbound.sent.entry(sample.writer).or_insert(0);
                if sample.seq <= *sent {
                    continue;
                }
                *sent = sample.seq;
                let first = first_seq.get(&sample.writer).copied().unwrap_or(sample.seq);
                match fragment(topic, sample, first) {
                    Some(frags) => {
                        out.extend(frags);
                        outbound.waiting_since.get_or_insert(now);
                    }
                    None => {
                        log::error!(
                            "[wire] sample of {} bytes on '{}' cannot be framed, dropped",
                            sample.payload.len(),
                            topic
                        );
                        outbound.reader.acknowledge(sample.writer, sample.seq);
                    }
                }
            }

            // Nothing to wait for: best-effort samples leave once sent.
            if outbound.reader.qos().reliability == Reliability::BestEffort {
                for (writer, upto) in &outbound.sent {
                    outbound.reader.acknowledge(*writer, *upto);
                }
                outbound.waiting_since = None;
            }
        }

        out
    }

    /// Samples sent and not yet acknowledged.
    pub fn in_flight(&self) -> bool {
        self.outbound.values().any(|o| o.waiting_since.is_some())
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("prefix", &self.prefix)
            .field("addr", &self.addr)
            .field("endpoints", &self.endpoints.len())
            .field("outbound", &self.outbound.len())
            .field("inbound", &self.inbound.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DdsTransportType;
    use crate::config::METADATA_TYPE_NAME;
    use crate::engine::DomainState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LINK: LinkId = 41;
    const SHORT: Duration = Duration::from_millis(50);

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 7410))
    }

    fn announce_of(endpoints: &[LocalEndpoint]) -> Announce {
        Announce {
            domain_id: 0,
            transport: DdsTransportType::UdpV4,
            revision: 1,
            part: 0,
            parts: 1,
            endpoints: endpoints.iter().map(LocalEndpoint::announcement).collect(),
        }
    }

    fn counting_listener() -> (DeliveryListener, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener: DeliveryListener = {
            let calls = Arc::clone(&calls);
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        (listener, calls)
    }

    /// Two data spaces joined by a pair of peers, without sockets.
    struct Pair {
        tx_writer: DataSpaceWriter,
        rx_reader: DataSpaceReader,
        tx_side: Peer,
        rx_side: Peer,
        _domains: (DomainState, DomainState),
    }

    fn pair(topic: &str, depth: u32) -> Pair {
        let tx_domain = DomainState::new(0);
        let rx_domain = DomainState::new(0);
        let tx_topic = tx_domain.register_topic(topic, METADATA_TYPE_NAME).expect("topic");
        let rx_topic = rx_domain.register_topic(topic, METADATA_TYPE_NAME).expect("topic");
        let qos = EndpointQos::channel(depth);

        let tx_writer =
            DataSpaceWriter::create_with_origin(Arc::clone(&tx_topic), qos, Origin::Local(LINK))
                .expect("writer");
        tx_writer.enable().expect("enable");
        let rx_reader = DataSpaceReader::create_with_origin(
            Arc::clone(&rx_topic),
            qos,
            Origin::Local(LINK),
            None,
        )
        .expect("reader");
        rx_reader.enable().expect("enable");

        let tx_local = vec![LocalEndpoint {
            kind: EndpointKind::Writer,
            topic: tx_topic,
            id: tx_writer.id(),
            qos,
        }];
        let rx_local = vec![LocalEndpoint {
            kind: EndpointKind::Reader,
            topic: rx_topic,
            id: rx_reader.id(),
            qos,
        }];
        let (listener, _) = counting_listener();

        // tx_side: how the publisher sees the subscriber, and vice versa.
        let mut tx_side = Peer::new(GuidPrefix::new(2, 0), addr(), Instant::now());
        assert!(tx_side.absorb(announce_of(&rx_local)));
        tx_side.reconcile(&tx_local, LINK, &listener);
        let mut rx_side = Peer::new(GuidPrefix::new(1, 0), addr(), Instant::now());
        assert!(rx_side.absorb(announce_of(&tx_local)));
        rx_side.reconcile(&rx_local, LINK, &listener);

        Pair {
            tx_writer,
            rx_reader,
            tx_side,
            rx_side,
            _domains: (tx_domain, rx_domain),
        }
    }

    #[test]
    fn test_reconcile_creates_stand_ins() {
        let p = pair("rt/peer_match", 4);
        assert_eq!(p.tx_writer.matched_readers(), 1);
        assert_eq!(p.rx_reader.matched_writers(), 1);
    }

    #[test]
    fn test_sample_crosses_and_is_acknowledged() {
        let mut p = pair("rt/peer_cross", 4);
        p.tx_writer.write(Arc::from(vec![1u8, 2]), SHORT).expect("write");
        assert_eq!(p.tx_writer.unacknowledged(), 1);

        let now = Instant::now();
        let frags = p.tx_side.collect_outbound(now, SHORT);
        assert_eq!(frags.len(), 1);
        assert!(p.tx_side.in_flight());
        assert!(p.tx_side.collect_outbound(now, SHORT).is_empty(), "sent once");

        let ack = p.rx_side.on_data(frags[0].clone()).expect("ack");
        assert_eq!(ack.upto, 1);
        let got = p.rx_reader.take(Some(SHORT)).expect("take").expect("sample");
        assert_eq!(&*got.payload, &[1, 2]);

        // A duplicate is acknowledged again, not delivered twice.
        assert_eq!(p.rx_side.on_data(frags[0].clone()).map(|a| a.upto), Some(1));
        assert!(p.rx_reader.take(Some(Duration::ZERO)).expect("poll").is_none());

        p.tx_side.on_ack(&ack, now);
        assert!(!p.tx_side.in_flight());
        p.tx_writer
            .wait_for_acknowledgments(SHORT)
            .expect("acknowledged");
    }

    #[test]
    fn test_lost_datagram_is_resent_in_order() {
        let mut p = pair("rt/peer_resend", 4);
        for v in 1..=3u8 {
            p.tx_writer.write(Arc::from(vec![v]), SHORT).expect("write");
        }
        let start = Instant::now();
        let frags = p.tx_side.collect_outbound(start, SHORT);
        assert_eq!(frags.len(), 3);

        // seq 1 lost: 2 and 3 arrive out of order and are dropped.
        assert!(p.rx_side.on_data(frags[1].clone()).is_none());
        assert!(p.rx_side.on_data(frags[2].clone()).is_none());
        assert!(p.rx_reader.is_empty());

        // Nothing new before the resend period.
        assert!(p.tx_side.collect_outbound(start, SHORT).is_empty());
        let again = p.tx_side.collect_outbound(start + SHORT, SHORT);
        assert_eq!(again.iter().map(|f| f.seq).collect::<Vec<_>>(), vec![1, 2, 3]);

        let mut last = None;
        for frag in again {
            last = p.rx_side.on_data(frag);
        }
        let ack = last.expect("ack");
        assert_eq!(ack.upto, 3);
        p.tx_side.on_ack(&ack, start + SHORT);
        assert_eq!(p.tx_writer.unacknowledged(), 0);

        let values: Vec<u8> = (0..3)
            .map(|_| p.rx_reader.take(Some(SHORT)).expect("take").expect("sample").payload[0])
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_full_reader_withholds_ack() {
        let mut p = pair("rt/peer_full", 1);
        p.tx_writer.write(Arc::from(vec![1u8]), SHORT).expect("write");
        let first = p.tx_side.collect_outbound(Instant::now(), SHORT);
        assert!(p.rx_side.on_data(first[0].clone()).is_some());

        // Reader cache (1) and stand-in history (1) full after the next one.
        p.tx_side.on_ack(
            &Ack {
                topic: "rt/peer_full".into(),
                writer: p.tx_writer.id(),
                upto: 1,
            },
            Instant::now(),
        );
        p.tx_writer.write(Arc::from(vec![2u8]), SHORT).expect("write");
        let second = p.tx_side.collect_outbound(Instant::now(), SHORT);
        assert_eq!(p.rx_side.on_data(second[0].clone()).map(|a| a.upto), Some(2));

        p.tx_side.on_ack(
            &Ack {
                topic: "rt/peer_full".into(),
                writer: p.tx_writer.id(),
                upto: 2,
            },
            Instant::now(),
        );
        p.tx_writer.write(Arc::from(vec![3u8]), SHORT).expect("write");
        let third = p.tx_side.collect_outbound(Instant::now(), SHORT);
        assert!(p.rx_side.on_data(third[0].clone()).is_none(), "no room");

        assert_eq!(p.rx_reader.take(Some(SHORT)).expect("take").expect("sample").payload[0], 1);
        assert_eq!(p.rx_side.on_data(third[0].clone()).map(|a| a.upto), Some(3));
    }

    #[test]
    fn test_large_sample_is_fragmented() {
        let mut p = pair("rt/peer_frag", 2);
        let payload: Vec<u8> = (0..FRAGMENT_SIZE * 2 + 17).map(|i| i as u8).collect();
        p.tx_writer
            .write(Arc::from(payload.clone()), SHORT)
            .expect("write");

        let frags = p.tx_side.collect_outbound(Instant::now(), SHORT);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[2].chunk.len(), 17);

        // Fragments may arrive in any order.
        assert!(p.rx_side.on_data(frags[2].clone()).is_none());
        assert!(p.rx_side.on_data(frags[0].clone()).is_none());
        assert_eq!(p.rx_side.on_data(frags[1].clone()).map(|a| a.upto), Some(1));
        let got = p.rx_reader.take(Some(SHORT)).expect("take").expect("sample");
        assert_eq!(&*got.payload, payload.as_slice());
    }

    #[test]
    fn test_type_mismatch_is_not_matched() {
        let domain = DomainState::new(0);
        let topic = domain.register_topic("rt/peer_types", METADATA_TYPE_NAME).expect("topic");
        let writer = DataSpaceWriter::create_with_origin(
            Arc::clone(&topic),
            EndpointQos::channel(2),
            Origin::Local(LINK),
        )
        .expect("writer");
        writer.enable().expect("enable");
        let local = vec![LocalEndpoint {
            kind: EndpointKind::Writer,
            topic,
            id: writer.id(),
            qos: EndpointQos::channel(2),
        }];

        let other = DomainState::new(0);
        let foreign = other.register_topic("rt/peer_types", "Temperature").expect("topic");
        let remote = LocalEndpoint {
            kind: EndpointKind::Reader,
            topic: foreign,
            id: 1,
            qos: EndpointQos::channel(2),
        };

        let (listener, _) = counting_listener();
        let mut peer = Peer::new(GuidPrefix::new(9, 0), addr(), Instant::now());
        peer.absorb(announce_of(&[remote]));
        peer.reconcile(&local, LINK, &listener);
        assert_eq!(writer.matched_readers(), 0);
    }

    #[test]
    fn test_withdrawn_reader_drops_stand_in() {
        let mut p = pair("rt/peer_withdraw", 2);
        let tx_local = vec![LocalEndpoint {
            kind: EndpointKind::Writer,
            topic: Arc::clone(p.tx_writer.topic()),
            id: p.tx_writer.id(),
            qos: EndpointQos::channel(2),
        }];
        let (listener, _) = counting_listener();

        assert!(p.tx_side.absorb(announce_of(&[])));
        p.tx_side.reconcile(&tx_local, LINK, &listener);
        assert_eq!(p.tx_writer.matched_readers(), 0);
    }

    #[test]
    fn test_split_announce_waits_for_every_part() {
        let mut peer = Peer::new(GuidPrefix::new(3, 0), addr(), Instant::now());
        let part = |index: u16, revision: u32| Announce {
            domain_id: 0,
            transport: DdsTransportType::UdpV4,
            revision,
            part: index,
            parts: 2,
            endpoints: Vec::new(),
        };
        assert!(!peer.absorb(part(1, 5)));
        assert!(!peer.absorb(part(0, 6)), "new revision restarts");
        assert!(peer.absorb(part(1, 6)));
    }

    #[test]
    fn test_strictest_policy() {
        let q = strictest(
            EndpointQos::best_effort().keep_last(3).max_samples(4),
            EndpointQos::channel(8),
        );
        assert_eq!(q.reliability, Reliability::Reliable);
        assert_eq!(q.history, History::KeepAll);
        assert_eq!(q.capacity(), 8);
    }
}
