// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiving half of a DDS channel.

use super::{PortState, PortStats, RecvPort};
use crate::backend::BackendReader;
use crate::error::{Error, Result};
use crate::metadata::{codec, MetaData};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `RecvPort` over a backend reader.
pub struct DdsRecvPort {
    name: String,
    topic: String,
    state: Mutex<PortState>,
    reader: Mutex<Option<Arc<dyn BackendReader>>>,
    samples: AtomicU64,
    bytes: AtomicU64,
    decode_failures: AtomicU64,
}

impl DdsRecvPort {
    pub(crate) fn new(name: String, topic: String, reader: Arc<dyn BackendReader>) -> Self {
        Self {
            name,
            topic,
            state: Mutex::new(PortState::Created),
            reader: Mutex::new(Some(reader)),
            samples: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PortState {
        *self.state.lock()
    }

    pub fn stats(&self) -> PortStats {
        PortStats {
            samples: self.samples.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }

    /// Wait at most `timeout` for the next descriptor.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<MetaData>> {
        self.receive(Some(timeout))
    }

    fn active_reader(&self) -> Result<Arc<dyn BackendReader>> {
        match *self.state.lock() {
            PortState::Created => Err(Error::NotStarted),
            PortState::Joined => Err(Error::Closed),
            PortState::Started => self.reader.lock().clone().ok_or(Error::Closed),
        }
    }

    fn receive(&self, timeout: Option<Duration>) -> Result<Option<MetaData>> {
        // Cloned out so `join` can close the reader while we wait.
        let reader = self.active_reader()?;
        let Some(sample) = reader.take(timeout)? else {
            return Ok(None);
        };

        match codec::decode(&sample) {
            Ok(metadata) => {
                self.samples.fetch_add(1, Ordering::Relaxed);
                self.bytes.fetch_add(sample.len() as u64, Ordering::Relaxed);
                log::debug!(
                    "[recv-port] '{}' received {} bytes on '{}'",
                    self.name,
                    sample.len(),
                    self.topic
                );
                Ok(Some(metadata))
            }
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("[recv-port] '{}' dropped undecodable sample: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Stop reception and release the reader, whatever the state.
    pub(crate) fn shutdown(&self) {
        let was = std::mem::replace(&mut *self.state.lock(), PortState::Joined);
        if was == PortState::Joined {
            return;
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.close();
        }

        log::info!(
            "[recv-port] '{}' joined after {} sample(s) on '{}'",
            self.name,
            self.samples.load(Ordering::Relaxed),
            self.topic
        );
    }
}

impl RecvPort for DdsRecvPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            PortState::Created => {}
            PortState::Started => return Err(Error::AlreadyStarted),
            PortState::Joined => return Err(Error::AlreadyJoined),
        }

        let reader = self.reader.lock().clone().ok_or(Error::AlreadyJoined)?;
        reader.enable()?;
        *state = PortState::Started;

        log::info!("[recv-port] '{}' started on '{}'", self.name, self.topic);
        Ok(())
    }

    fn recv(&self) -> Result<MetaData> {
        loop {
            if let Some(metadata) = self.receive(None)? {
                return Ok(metadata);
            }
        }
    }

    fn try_recv(&self) -> Result<Option<MetaData>> {
        self.receive(Some(Duration::ZERO))
    }

    fn join(&self) -> Result<()> {
        match self.state() {
            PortState::Created => Err(Error::NotStarted),
            PortState::Joined => Ok(()),
            PortState::Started => {
                self.shutdown();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for DdsRecvPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdsRecvPort")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}
