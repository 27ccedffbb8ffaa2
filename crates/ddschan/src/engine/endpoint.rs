// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer and reader handles.
//!
//! A handle owns one slot in a [`TopicState`] and removes it on drop.
//! Remote stand-ins are ordinary handles created with an
//! [`Origin::Remote`] and enabled at once.

use super::topic::{CachedSample, DeliveryListener, EndpointId, Origin, TopicState, NO_LINK};
use crate::error::Result;
use crate::qos::EndpointQos;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Writer endpoint in the data space.
pub struct DataSpaceWriter {
    topic: Arc<TopicState>,
    id: EndpointId,
    qos: EndpointQos,
    origin: Origin,
    closed: AtomicBool,
}

impl DataSpaceWriter {
    /// Create a disabled local writer on `topic`.
    pub fn create(topic: Arc<TopicState>, qos: EndpointQos) -> Result<Self> {
        Self::create_with_origin(topic, qos, Origin::Local(NO_LINK))
    }

    /// Create a writer with an explicit origin.
    ///
    /// Local writers start disabled; remote stand-ins are enabled at once.
    pub fn create_with_origin(
        topic: Arc<TopicState>,
        qos: EndpointQos,
        origin: Origin,
    ) -> Result<Self> {
        qos.validate()?;
        let id = topic.add_writer(qos, origin);
        log::debug!(
            "[data-space] writer #{} on '{}' {:?} ({:?})",
            id,
            topic.name(),
            origin,
            qos
        );
        let writer = Self {
            topic,
            id,
            qos,
            origin,
            closed: AtomicBool::new(false),
        };
        if origin.is_remote() {
            writer.enable()?;
        }
        Ok(writer)
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn qos(&self) -> &EndpointQos {
        &self.qos
    }

    pub fn topic(&self) -> &Arc<TopicState> {
        &self.topic
    }

    /// Make the writer visible to readers.
    pub fn enable(&self) -> Result<()> {
        self.topic.enable_writer(self.id)
    }

    /// Publish one sample, returning its sequence number.
    pub fn write(&self, payload: Arc<[u8]>, max_blocking: Duration) -> Result<u64> {
        self.topic.write(self.id, payload, max_blocking)
    }

    pub fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.topic.wait_for_acknowledgments(self.id, timeout)
    }

    pub fn matched_readers(&self) -> usize {
        self.topic.matched_readers(self.id)
    }

    /// Samples not yet held by every matched reader, counting those a
    /// remote reader has not acknowledged.
    pub fn unacknowledged(&self) -> usize {
        self.topic.unacknowledged(self.id)
    }

    /// Remove the writer from its topic. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.topic.remove_writer(self.id);
            log::debug!("[data-space] writer #{} on '{}' closed", self.id, self.topic.name());
        }
    }
}

impl Drop for DataSpaceWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DataSpaceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSpaceWriter")
            .field("id", &self.id)
            .field("topic", &self.topic.name())
            .field("origin", &self.origin)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Reader endpoint in the data space.
pub struct DataSpaceReader {
    topic: Arc<TopicState>,
    id: EndpointId,
    qos: EndpointQos,
    origin: Origin,
    closed: AtomicBool,
}

impl DataSpaceReader {
    /// Create a disabled local reader on `topic`.
    pub fn create(topic: Arc<TopicState>, qos: EndpointQos) -> Result<Self> {
        Self::create_with_origin(topic, qos, Origin::Local(NO_LINK), None)
    }

    /// Create a reader with an explicit origin.
    ///
    /// Remote stand-ins are enabled at once; `listener` runs whenever
    /// samples reach the cache.
    pub fn create_with_origin(
        topic: Arc<TopicState>,
        qos: EndpointQos,
        origin: Origin,
        listener: Option<DeliveryListener>,
    ) -> Result<Self> {
        qos.validate()?;
        let id = topic.add_reader(qos, origin, listener);
        log::debug!(
            "[data-space] reader #{} on '{}' {:?} ({:?})",
            id,
            topic.name(),
            origin,
            qos
        );
        let reader = Self {
            topic,
            id,
            qos,
            origin,
            closed: AtomicBool::new(false),
        };
        if origin.is_remote() {
            reader.enable()?;
        }
        Ok(reader)
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn qos(&self) -> &EndpointQos {
        &self.qos
    }

    pub fn topic(&self) -> &Arc<TopicState> {
        &self.topic
    }

    /// Start matching writers; retained history is replayed.
    pub fn enable(&self) -> Result<()> {
        self.topic.enable_reader(self.id)
    }

    /// Take the oldest sample, waiting up to `timeout` (`None` = forever).
    pub fn take(&self, timeout: Option<Duration>) -> Result<Option<CachedSample>> {
        self.topic.take(self.id, timeout)
    }

    pub fn matched_writers(&self) -> usize {
        self.topic.matched_writers(self.id)
    }

    /// Samples waiting to be taken.
    pub fn len(&self) -> usize {
        self.topic.cached(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached samples, oldest first, left in place.
    pub fn pending(&self) -> Vec<CachedSample> {
        self.topic.pending(self.id)
    }

    /// Release cached samples of `writer` up to `upto` once a peer holds them.
    pub fn acknowledge(&self, writer: EndpointId, upto: u64) -> usize {
        self.topic.acknowledge(self.id, writer, upto)
    }

    /// Remove the reader from its topic, waking blocked takers. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.topic.remove_reader(self.id);
            log::debug!("[data-space] reader #{} on '{}' closed", self.id, self.topic.name());
        }
    }
}

impl Drop for DataSpaceReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DataSpaceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSpaceReader")
            .field("id", &self.id)
            .field("topic", &self.topic.name())
            .field("origin", &self.origin)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
