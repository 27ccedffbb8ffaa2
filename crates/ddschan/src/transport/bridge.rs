// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire bridge of one participant.
//!
//! # Architecture
//!
//! ```text
//! CycloneWriter/Reader --publish/withdraw--> WireLink --dirty + wake--+
//!                                                                     v
//! remote stand-in reader --DeliveryListener (wake)--> [ddschan-wire] mio::poll
//!                                                        |  recv: ANNOUNCE/BYE/DATA/ACK
//!                                                        |  send: ANNOUNCE, DATA, ACK
//!                                                        v
//!                                                     Peer (per remote participant)
//! ```
//!
//! One IO thread per participant owns the sockets and every [`Peer`]. Other
//! threads only touch the shared endpoint table and wake the poll.

use super::peer::{LocalEndpoint, Peer};
use super::socket::{self, Sockets};
use super::wire::{Announce, Datagram, EndpointAnnouncement, EndpointKind, GuidPrefix, Message};
use crate::backend::DdsTransportType;
use crate::config::{
    ANNOUNCE_PERIOD_MS, FRAGMENT_SIZE, LEASE_DURATION_MS, MAX_PACKET_SIZE, RESEND_PERIOD_MS,
};
use crate::engine::{DeliveryListener, EndpointId, LinkId};
use mio::{Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const UNICAST: Token = Token(0);
const MULTICAST: Token = Token(1);
const WAKE: Token = Token(2);

/// Encoded size budgeted per announced endpoint beyond its two names.
const ENDPOINT_OVERHEAD: usize = 64;

type EndpointKey = (String, EndpointKind, EndpointId);

struct BridgeShared {
    prefix: GuidPrefix,
    link: LinkId,
    domain_id: u32,
    transport: DdsTransportType,
    running: AtomicBool,
    /// Endpoint table changed since the IO thread last looked.
    dirty: AtomicBool,
    peers: AtomicUsize,
    waker: Arc<Waker>,
    local: Mutex<BTreeMap<EndpointKey, LocalEndpoint>>,
}

impl BridgeShared {
    fn wake(&self) {
        if let Err(e) = self.waker.wake() {
            log::debug!("[wire] wake failed: {}", e);
        }
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
        self.wake();
    }
}

/// Handle endpoints use to appear on, and leave, the wire.
#[derive(Clone)]
pub struct WireLink {
    id: LinkId,
    shared: Weak<BridgeShared>,
}

impl WireLink {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Announce an enabled endpoint to peers.
    pub fn publish(&self, endpoint: LocalEndpoint) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let key = (endpoint.topic.name().to_string(), endpoint.kind, endpoint.id);
        shared.local.lock().insert(key, endpoint);
        shared.touch();
    }

    /// Stop announcing an endpoint. No-op if it was never published.
    pub fn withdraw(&self, kind: EndpointKind, topic: &str, id: EndpointId) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let removed = shared
            .local
            .lock()
            .remove(&(topic.to_string(), kind, id))
            .is_some();
        if removed {
            shared.touch();
        }
    }
}

impl std::fmt::Debug for WireLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireLink")
            .field("id", &self.id)
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Sockets plus IO thread of one participant. Dropping it says goodbye to
/// peers and joins the thread.
pub struct WireBridge {
    shared: Arc<BridgeShared>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl WireBridge {
    /// Open sockets for `domain_id` on `transport` and start the IO thread.
    pub fn start(
        domain_id: u32,
        transport: DdsTransportType,
        prefix: GuidPrefix,
    ) -> io::Result<Self> {
        let Sockets {
            unicast,
            multicast,
            announce_targets,
        } = socket::open(domain_id, transport)?;
        let local_addr = unicast.local_addr()?;

        // mio requires non-blocking sockets
        unicast.set_nonblocking(true)?;
        let mut unicast = mio::net::UdpSocket::from_std(unicast);
        let mut multicast = match multicast {
            Some(socket) => {
                socket.set_nonblocking(true)?;
                Some(mio::net::UdpSocket::from_std(socket))
            }
            None => None,
        };

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut unicast, UNICAST, Interest::READABLE)?;
        if let Some(socket) = multicast.as_mut() {
            poll.registry()
                .register(socket, MULTICAST, Interest::READABLE)?;
        }
        let waker = Arc::new(Waker::new(poll.registry(), WAKE)?);

        let shared = Arc::new(BridgeShared {
            prefix,
            link: super::next_link_id(),
            domain_id,
            transport,
            running: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            peers: AtomicUsize::new(0),
            waker: Arc::clone(&waker),
            local: Mutex::new(BTreeMap::new()),
        });

        let listener: DeliveryListener = Arc::new(move || {
            if let Err(e) = waker.wake() {
                log::debug!("[wire] wake failed: {}", e);
            }
        });

        let session = Session {
            shared: Arc::clone(&shared),
            poll,
            unicast,
            multicast,
            announce_targets,
            peers: HashMap::new(),
            local: Vec::new(),
            listener,
            revision: 0,
            buf: vec![0u8; MAX_PACKET_SIZE],
        };

        let handle = std::thread::Builder::new()
            .name("ddschan-wire".to_string())
            .spawn(move || session.run())?;

        log::debug!(
            "[wire] bridge {} on {} (domain={} transport={})",
            prefix,
            local_addr,
            domain_id,
            transport
        );

        Ok(Self {
            shared,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn link(&self) -> WireLink {
        WireLink {
            id: self.shared.link,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn prefix(&self) -> GuidPrefix {
        self.shared.prefix
    }

    /// Participants of other data spaces currently known.
    pub fn peer_count(&self) -> usize {
        self.shared.peers.load(Ordering::Acquire)
    }
}

impl Drop for WireBridge {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.wake();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[wire] IO thread of {} panicked", self.shared.prefix);
            }
        }
    }
}

impl std::fmt::Debug for WireBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireBridge")
            .field("prefix", &self.shared.prefix)
            .field("local_addr", &self.local_addr)
            .field("peers", &self.peer_count())
            .finish()
    }
}

/// State owned by the IO thread.
struct Session {
    shared: Arc<BridgeShared>,
    poll: Poll,
    unicast: mio::net::UdpSocket,
    multicast: Option<mio::net::UdpSocket>,
    announce_targets: Vec<SocketAddr>,
    peers: HashMap<GuidPrefix, Peer>,
    /// Snapshot of the shared endpoint table.
    local: Vec<LocalEndpoint>,
    listener: DeliveryListener,
    revision: u32,
    buf: Vec<u8>,
}

impl Session {
    fn run(mut self) {
        let announce_period = Duration::from_millis(ANNOUNCE_PERIOD_MS);
        let resend = Duration::from_millis(RESEND_PERIOD_MS);
        let lease = Duration::from_millis(LEASE_DURATION_MS);
        let mut events = Events::with_capacity(16);
        let mut next_announce = Instant::now();

        while self.shared.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= next_announce {
                self.expire_peers(now, lease);
                self.announce(None);
                next_announce = now + announce_period;
            }

            let mut timeout = next_announce.saturating_duration_since(now);
            if self.peers.values().any(Peer::in_flight) {
                timeout = timeout.min(resend);
            }
            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::debug!("[wire] poll error: {:?}", e);
                }
                continue;
            }

            for event in events.iter() {
                match event.token() {
                    UNICAST | MULTICAST => self.drain(event.token()),
                    _ => {}
                }
            }

            if self.shared.dirty.swap(false, Ordering::AcqRel) {
                self.local = self.shared.local.lock().values().cloned().collect();
                for peer in self.peers.values_mut() {
                    peer.reconcile(&self.local, self.shared.link, &self.listener);
                }
                self.announce(None);
            }

            self.flush(Instant::now(), resend);
        }

        self.say_goodbye();
    }

    /// Receive until the socket would block.
    fn drain(&mut self, token: Token) {
        loop {
            let socket = match (token, &self.multicast) {
                (MULTICAST, Some(socket)) => socket,
                (MULTICAST, None) => return,
                _ => &self.unicast,
            };
            let (len, src) = match socket.recv_from(&mut self.buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::debug!("[wire] recv_from error: {:?}", e);
                    return;
                }
            };
            match Datagram::decode(&self.buf[..len]) {
                Ok(datagram) => self.handle(datagram, src),
                Err(e) => log::debug!("[wire] {} bytes from {} dropped: {}", len, src, e),
            }
        }
    }

    fn handle(&mut self, datagram: Datagram, src: SocketAddr) {
        let sender = datagram.sender;
        // Same data space: the in-process path already connects us.
        if sender.same_space(&self.shared.prefix) {
            return;
        }
        let now = Instant::now();

        match datagram.message {
            Message::Announce(announce) => {
                if announce.domain_id != self.shared.domain_id
                    || announce.transport != self.shared.transport
                {
                    return;
                }
                let known = self.peers.contains_key(&sender);
                let peer = self
                    .peers
                    .entry(sender)
                    .or_insert_with(|| Peer::new(sender, src, now));
                peer.addr = src;
                peer.last_seen = now;
                if peer.absorb(announce) {
                    peer.reconcile(&self.local, self.shared.link, &self.listener);
                }
                if !known {
                    log::debug!("[wire] {} discovered {} at {}", self.shared.prefix, sender, src);
                    self.shared.peers.store(self.peers.len(), Ordering::Release);
                    // Answer at once instead of waiting for the next period.
                    self.announce(Some(src));
                }
            }
            Message::Bye => {
                if self.peers.remove(&sender).is_some() {
                    log::debug!("[wire] {} left", sender);
                    self.shared.peers.store(self.peers.len(), Ordering::Release);
                }
            }
            Message::Data(fragment) => {
                let Some(peer) = self.peers.get_mut(&sender) else {
                    return;
                };
                peer.last_seen = now;
                let addr = peer.addr;
                if let Some(ack) = peer.on_data(fragment) {
                    self.send(Message::Ack(ack), addr);
                }
            }
            Message::Ack(ack) => {
                if let Some(peer) = self.peers.get_mut(&sender) {
                    peer.last_seen = now;
                    peer.on_ack(&ack, now);
                }
            }
        }
    }

    /// Drop peers silent for longer than the lease.
    fn expire_peers(&mut self, now: Instant, lease: Duration) {
        let before = self.peers.len();
        self.peers.retain(|prefix, peer| {
            let alive = now.duration_since(peer.last_seen) <= lease;
            if !alive {
                log::debug!("[wire] lease of {} expired", prefix);
            }
            alive
        });
        if self.peers.len() != before {
            self.shared.peers.store(self.peers.len(), Ordering::Release);
        }
    }

    /// Announce the endpoint table to `to`, or to every announce target.
    fn announce(&mut self, to: Option<SocketAddr>) {
        self.revision = self.revision.wrapping_add(1);
        let endpoints: Vec<EndpointAnnouncement> =
            self.local.iter().map(LocalEndpoint::announcement).collect();

        let mut chunks: Vec<Vec<EndpointAnnouncement>> = vec![Vec::new()];
        let mut used = 0;
        for endpoint in endpoints {
            let size = endpoint.topic.len() + endpoint.type_name.len() + ENDPOINT_OVERHEAD;
            if used + size > FRAGMENT_SIZE && chunks.last().is_some_and(|c| !c.is_empty()) {
                chunks.push(Vec::new());
                used = 0;
            }
            used += size;
            if let Some(chunk) = chunks.last_mut() {
                chunk.push(endpoint);
            }
        }
        let Ok(parts) = u16::try_from(chunks.len()) else {
            log::error!(
                "[wire] {} announce parts exceed the wire limit, not announced",
                chunks.len()
            );
            return;
        };

        for (part, endpoints) in (0..parts).zip(chunks) {
            let message = Message::Announce(Announce {
                domain_id: self.shared.domain_id,
                transport: self.shared.transport,
                revision: self.revision,
                part,
                parts,
                endpoints,
            });
            match to {
                Some(addr) => self.send(message, addr),
                None => {
                    for addr in self.announce_targets.clone() {
                        self.send(message.clone(), addr);
                    }
                }
            }
        }
    }

    /// Send whatever peers have due.
    fn flush(&mut self, now: Instant, resend: Duration) {
        let due: Vec<_> = self
            .peers
            .values_mut()
            .map(|peer| (peer.addr, peer.collect_outbound(now, resend)))
            .filter(|(_, fragments)| !fragments.is_empty())
            .collect();
        for (addr, fragments) in due {
            for fragment in fragments {
                self.send(Message::Data(fragment), addr);
            }
        }
    }

    fn send(&self, message: Message, addr: SocketAddr) {
        let bytes = match Datagram::new(self.shared.prefix, message).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("[wire] datagram to {} not encoded: {}", addr, e);
                return;
            }
        };
        match self.unicast.send_to(&bytes, addr) {
            Ok(_) => {}
            // Lost like any datagram; resent or re-announced later.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                log::debug!("[wire] send buffer full, {} bytes to {} dropped", bytes.len(), addr);
            }
            Err(e) => log::debug!("[wire] send_to {} failed: {}", addr, e),
        }
    }

    fn say_goodbye(&mut self) {
        let mut targets = self.announce_targets.clone();
        targets.extend(self.peers.values().map(|peer| peer.addr));
        for addr in targets {
            self.send(Message::Bye, addr);
        }
        self.peers.clear();
        self.shared.peers.store(0, Ordering::Release);
        log::debug!("[wire] bridge {} stopped", self.shared.prefix);
    }
}
