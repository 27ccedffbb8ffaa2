// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic endpoint table, histories and reader caches.

use super::{DomainId, TypeId};
use crate::error::{Error, Result};
use crate::qos::{EndpointQos, Reliability};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier of a writer or reader within one topic.
pub type EndpointId = u64;

/// Wire link an endpoint is carried on.
pub type LinkId = u64;

/// Link of endpoints whose participant has no wire link.
pub const NO_LINK: LinkId = 0;

/// Called after samples land in a remote reader's cache.
///
/// Runs outside the topic lock, on whichever thread pumped.
pub type DeliveryListener = Arc<dyn Fn() + Send + Sync>;

/// Where an endpoint lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Created by a participant of this data space, published on a link.
    Local(LinkId),
    /// Stands in for an endpoint of another data space reached over a link.
    Remote(LinkId),
}

impl Origin {
    pub fn link(self) -> LinkId {
        match self {
            Origin::Local(link) | Origin::Remote(link) => link,
        }
    }

    pub fn is_remote(self) -> bool {
        matches!(self, Origin::Remote(_))
    }
}

/// Local endpoints always reach each other. A remote stand-in only reaches
/// local endpoints published on its own link, so nothing relays between
/// links or back onto the wire.
fn reachable(writer: Origin, reader: Origin) -> bool {
    match (writer, reader) {
        (Origin::Local(_), Origin::Local(_)) => true,
        (Origin::Remote(_), Origin::Remote(_)) => false,
        (Origin::Local(a), Origin::Remote(b)) | (Origin::Remote(a), Origin::Local(b)) => a == b,
    }
}

/// Sample sitting in a reader cache.
#[derive(Clone, Debug)]
pub struct CachedSample {
    /// Writer that produced the sample.
    pub writer: EndpointId,
    /// Writer sequence number, strictly increasing per writer.
    pub seq: u64,
    pub payload: Arc<[u8]>,
}

struct HistorySample {
    seq: u64,
    payload: Arc<[u8]>,
}

struct WriterSlot {
    qos: EndpointQos,
    origin: Origin,
    enabled: bool,
    next_seq: u64,
    history: VecDeque<HistorySample>,
}

impl WriterSlot {
    fn has_room(&self) -> bool {
        self.qos.reliability == Reliability::BestEffort
            || self.qos.evicts_oldest()
            || self.history.len() < self.qos.capacity()
    }

    fn first_retained_seq(&self) -> u64 {
        self.history.front().map_or(self.next_seq, |s| s.seq)
    }
}

struct ReaderSlot {
    qos: EndpointQos,
    origin: Origin,
    enabled: bool,
    cache: VecDeque<CachedSample>,
    /// Next sequence number owed by each matched writer.
    cursors: HashMap<EndpointId, u64>,
    listener: Option<DeliveryListener>,
}

impl ReaderSlot {
    /// Cached samples of `writer`; a remote reader holds them until acknowledged.
    fn held_from(&self, writer: EndpointId) -> usize {
        self.cache.iter().filter(|s| s.writer == writer).count()
    }
}

fn matched(writer: &WriterSlot, reader: &ReaderSlot) -> bool {
    writer.enabled
        && reader.enabled
        && reachable(writer.origin, reader.origin)
        && writer.qos.compatible_with_reader(&reader.qos)
}

#[derive(Default)]
struct PumpOutcome {
    delivered: bool,
    released: bool,
    listeners: Vec<DeliveryListener>,
}

#[derive(Default)]
struct TopicInner {
    next_id: EndpointId,
    writers: BTreeMap<EndpointId, WriterSlot>,
    readers: BTreeMap<EndpointId, ReaderSlot>,
}

impl TopicInner {
    fn allocate_id(&mut self) -> EndpointId {
        self.next_id += 1;
        self.next_id
    }

    /// History of writer `id` plus what remote readers hold unacknowledged.
    fn outstanding(&self, id: EndpointId) -> Option<usize> {
        let writer = self.writers.get(&id)?;
        let held: usize = self
            .readers
            .values()
            .filter(|r| r.origin.is_remote())
            .map(|r| r.held_from(id))
            .sum();
        Some(writer.history.len() + held)
    }

    /// Move history into matched reader caches, then drop history every
    /// matched reader already holds.
    fn pump(&mut self) -> PumpOutcome {
        let mut outcome = PumpOutcome::default();
        let TopicInner {
            writers, readers, ..
        } = self;

        for (wid, writer) in writers.iter_mut() {
            if !writer.enabled {
                continue;
            }

            for reader in readers.values_mut() {
                if !matched(writer, reader) {
                    continue;
                }
                let mut delivered = false;
                let cursor = reader
                    .cursors
                    .entry(*wid)
                    .or_insert_with(|| writer.first_retained_seq());
                let capacity = reader.qos.capacity();
                let start = *cursor;

                for sample in writer.history.iter().filter(|s| s.seq >= start) {
                    if reader.cache.len() >= capacity {
                        if reader.qos.evicts_oldest() {
                            reader.cache.pop_front();
                        } else {
                            break;
                        }
                    }
                    reader.cache.push_back(CachedSample {
                        writer: *wid,
                        seq: sample.seq,
                        payload: Arc::clone(&sample.payload),
                    });
                    *cursor = sample.seq + 1;
                    delivered = true;
                }
                outcome.delivered |= delivered;

                if let Some(listener) = &reader.listener {
                    if delivered && !outcome.listeners.iter().any(|l| Arc::ptr_eq(l, listener))
                    {
                        outcome.listeners.push(Arc::clone(listener));
                    }
                }
            }

            let before = writer.history.len();
            match writer.qos.reliability {
                Reliability::BestEffort => writer.history.clear(),
                Reliability::Reliable => {
                    // With nobody matched the history is kept for late joiners.
                    let acked = readers
                        .values()
                        .filter(|r| matched(writer, r))
                        .map(|r| r.cursors.get(wid).copied().unwrap_or(0))
                        .min();
                    if let Some(acked) = acked {
                        while writer.history.front().is_some_and(|s| s.seq < acked) {
                            writer.history.pop_front();
                        }
                    }
                }
            }
            if writer.history.len() < before {
                outcome.released = true;
            }
        }

        outcome
    }
}

/// Shared state of one topic in one domain.
pub struct TopicState {
    name: Arc<str>,
    type_name: Arc<str>,
    type_id: TypeId,
    domain_id: DomainId,
    inner: Mutex<TopicInner>,
    /// History released, acknowledgements progressed or an endpoint closed.
    space: Condvar,
    /// Sample cached or an endpoint closed.
    data: Condvar,
}

impl TopicState {
    pub(super) fn new(
        domain_id: DomainId,
        name: Arc<str>,
        type_name: Arc<str>,
        type_id: TypeId,
    ) -> Self {
        Self {
            name,
            type_name,
            type_id,
            domain_id,
            inner: Mutex::new(TopicInner::default()),
            space: Condvar::new(),
            data: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// Number of writers (enabled or not).
    pub fn writer_count(&self) -> usize {
        self.inner.lock().writers.len()
    }

    /// Number of readers (enabled or not).
    pub fn reader_count(&self) -> usize {
        self.inner.lock().readers.len()
    }

    pub(super) fn add_writer(&self, qos: EndpointQos, origin: Origin) -> EndpointId {
        let mut inner = self.inner.lock();
        let id = inner.allocate_id();
        inner.writers.insert(
            id,
            WriterSlot {
                qos,
                origin,
                enabled: false,
                next_seq: 1,
                history: VecDeque::new(),
            },
        );
        id
    }

    pub(super) fn add_reader(
        &self,
        qos: EndpointQos,
        origin: Origin,
        listener: Option<DeliveryListener>,
    ) -> EndpointId {
        let mut inner = self.inner.lock();
        let id = inner.allocate_id();
        inner.readers.insert(
            id,
            ReaderSlot {
                qos,
                origin,
                enabled: false,
                cache: VecDeque::new(),
                cursors: HashMap::new(),
                listener,
            },
        );
        id
    }

    pub(super) fn enable_writer(&self, id: EndpointId) -> Result<()> {
        let mut inner = self.inner.lock();
        let writer = inner.writers.get_mut(&id).ok_or(Error::Closed)?;
        writer.enabled = true;
        Ok(())
    }

    /// Enabling a reader replays whatever matched writers still retain.
    pub(super) fn enable_reader(&self, id: EndpointId) -> Result<()> {
        let mut inner = self.inner.lock();
        let reader = inner.readers.get_mut(&id).ok_or(Error::Closed)?;
        reader.enabled = true;
        let outcome = inner.pump();
        drop(inner);
        self.notify(outcome);
        Ok(())
    }

    /// Append one sample to the writer history.
    ///
    /// Waits up to `max_blocking` while a reliable keep-all history is full.
    pub(super) fn write(
        &self,
        id: EndpointId,
        payload: Arc<[u8]>,
        max_blocking: Duration,
    ) -> Result<u64> {
        let deadline = Instant::now() + max_blocking;
        let mut inner = self.inner.lock();

        loop {
            let writer = inner.writers.get(&id).ok_or(Error::Closed)?;
            if !writer.enabled {
                return Err(Error::BackendError(format!(
                    "writer on '{}' is not enabled",
                    self.name
                )));
            }
            if writer.has_room() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::BackendTimeout(format!(
                    "history of '{}' full ({} samples) for {:?}",
                    self.name,
                    writer.history.len(),
                    max_blocking
                )));
            }
            self.space.wait_until(&mut inner, deadline);
        }

        let writer = inner.writers.get_mut(&id).ok_or(Error::Closed)?;
        let seq = writer.next_seq;
        writer.next_seq += 1;
        if writer.qos.evicts_oldest() && writer.history.len() >= writer.qos.capacity() {
            writer.history.pop_front();
        }
        writer.history.push_back(HistorySample { seq, payload });

        let outcome = inner.pump();
        drop(inner);
        self.notify(outcome);
        Ok(seq)
    }

    /// Pop the oldest cached sample.
    ///
    /// `timeout = None` waits until a sample arrives or the reader closes;
    /// `Some(t)` returns `Ok(None)` once `t` elapses.
    pub(super) fn take(
        &self,
        id: EndpointId,
        timeout: Option<Duration>,
    ) -> Result<Option<CachedSample>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock();

        loop {
            let reader = inner.readers.get_mut(&id).ok_or(Error::Closed)?;
            if !reader.enabled {
                return Err(Error::BackendError(format!(
                    "reader on '{}' is not enabled",
                    self.name
                )));
            }
            if let Some(sample) = reader.cache.pop_front() {
                let outcome = inner.pump();
                drop(inner);
                self.notify(outcome);
                return Ok(Some(sample));
            }

            match deadline {
                None => self.data.wait(&mut inner),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    self.data.wait_until(&mut inner, deadline);
                }
            }
        }
    }

    /// Wait until the writer history is empty and no remote reader still
    /// holds one of its samples unacknowledged.
    pub(super) fn wait_for_acknowledgments(&self, id: EndpointId, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        loop {
            let outstanding = inner.outstanding(id).ok_or(Error::Closed)?;
            if outstanding == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::BackendTimeout(format!(
                    "{} sample(s) on '{}' unacknowledged after {:?}",
                    outstanding, self.name, timeout
                )));
            }
            self.space.wait_until(&mut inner, deadline);
        }
    }

    /// Enabled, compatible readers currently matched with writer `id`.
    pub(super) fn matched_readers(&self, id: EndpointId) -> usize {
        let inner = self.inner.lock();
        inner.writers.get(&id).map_or(0, |writer| {
            inner.readers.values().filter(|r| matched(writer, r)).count()
        })
    }

    /// Enabled, compatible writers currently matched with reader `id`.
    pub(super) fn matched_writers(&self, id: EndpointId) -> usize {
        let inner = self.inner.lock();
        inner.readers.get(&id).map_or(0, |reader| {
            inner.writers.values().filter(|w| matched(w, reader)).count()
        })
    }

    /// Samples of writer `id` not yet acknowledged by every matched reader.
    pub(super) fn unacknowledged(&self, id: EndpointId) -> usize {
        self.inner.lock().outstanding(id).unwrap_or(0)
    }

    /// Snapshot of a reader cache, oldest first, without taking anything.
    pub(super) fn pending(&self, id: EndpointId) -> Vec<CachedSample> {
        self.inner
            .lock()
            .readers
            .get(&id)
            .map_or_else(Vec::new, |r| r.cache.iter().cloned().collect())
    }

    /// Drop samples of `writer` up to and including `upto` from a reader
    /// cache, as if taken. Returns how many were dropped.
    pub(super) fn acknowledge(&self, id: EndpointId, writer: EndpointId, upto: u64) -> usize {
        let mut inner = self.inner.lock();
        let Some(reader) = inner.readers.get_mut(&id) else {
            return 0;
        };
        let before = reader.cache.len();
        reader
            .cache
            .retain(|s| s.writer != writer || s.seq > upto);
        let dropped = before - reader.cache.len();
        if dropped == 0 {
            return 0;
        }

        let outcome = inner.pump();
        drop(inner);
        self.notify(outcome);
        self.space.notify_all();
        dropped
    }

    /// Samples waiting in reader `id` cache.
    pub(super) fn cached(&self, id: EndpointId) -> usize {
        self.inner
            .lock()
            .readers
            .get(&id)
            .map_or(0, |r| r.cache.len())
    }

    /// Remove a writer; anything still in its history is discarded.
    pub(super) fn remove_writer(&self, id: EndpointId) {
        let mut inner = self.inner.lock();
        if inner.writers.remove(&id).is_some() {
            for reader in inner.readers.values_mut() {
                reader.cursors.remove(&id);
            }
        }
        drop(inner);
        self.space.notify_all();
        self.data.notify_all();
    }

    /// Remove a reader, waking any blocked `take()` on it.
    pub(super) fn remove_reader(&self, id: EndpointId) {
        let mut inner = self.inner.lock();
        let outcome = if inner.readers.remove(&id).is_some() {
            inner.pump()
        } else {
            PumpOutcome::default()
        };
        drop(inner);
        self.notify(outcome);
        self.space.notify_all();
        self.data.notify_all();
    }

    fn notify(&self, outcome: PumpOutcome) {
        if outcome.delivered {
            self.data.notify_all();
        }
        if outcome.released {
            self.space.notify_all();
        }
        for listener in outcome.listeners {
            listener();
        }
    }
}

impl std::fmt::Debug for TopicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicState")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("domain_id", &self.domain_id)
            .finish_non_exhaustive()
    }
}
