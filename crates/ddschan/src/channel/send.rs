// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sending half of a DDS channel.

use super::{PortState, PortStats, SendPort};
use crate::backend::BackendWriter;
use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::metadata::{codec, MetaData};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// `SendPort` over a backend writer.
pub struct DdsSendPort {
    name: String,
    topic: String,
    config: ChannelConfig,
    state: Mutex<PortState>,
    /// Held for the whole of a `send`; `join` takes it to wait out in-flight sends.
    send_lock: Mutex<()>,
    writer: Mutex<Option<Arc<dyn BackendWriter>>>,
    samples: AtomicU64,
    bytes: AtomicU64,
}

impl DdsSendPort {
    pub(crate) fn new(
        name: String,
        topic: String,
        writer: Arc<dyn BackendWriter>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            name,
            topic,
            config,
            state: Mutex::new(PortState::Created),
            send_lock: Mutex::new(()),
            writer: Mutex::new(Some(writer)),
            samples: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PortState {
        *self.state.lock()
    }

    pub fn stats(&self) -> PortStats {
        PortStats {
            samples: self.samples.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            decode_failures: 0,
        }
    }

    /// Readers currently matched with this port's writer.
    pub fn matched_readers(&self) -> usize {
        self.writer
            .lock()
            .as_ref()
            .map_or(0, |writer| writer.matched_readers())
    }

    fn active_writer(&self) -> Result<Arc<dyn BackendWriter>> {
        match *self.state.lock() {
            PortState::Created => Err(Error::NotStarted),
            PortState::Joined => Err(Error::AlreadyJoined),
            PortState::Started => self.writer.lock().clone().ok_or(Error::AlreadyJoined),
        }
    }

    /// Stop accepting sends and release the writer, whatever the state.
    pub(crate) fn shutdown(&self) {
        let was = std::mem::replace(&mut *self.state.lock(), PortState::Joined);
        if was == PortState::Joined {
            return;
        }

        // Wait out an in-flight send.
        let _in_flight = self.send_lock.lock();
        let Some(writer) = self.writer.lock().take() else {
            return;
        };

        if was == PortState::Started && writer.matched_readers() > 0 {
            if let Err(e) = writer.wait_for_acknowledgments(self.config.join_linger) {
                log::warn!("[send-port] '{}' drain on join incomplete: {}", self.name, e);
            }
        }
        writer.close();

        log::info!(
            "[send-port] '{}' joined after {} sample(s) on '{}'",
            self.name,
            self.samples.load(Ordering::Relaxed),
            self.topic
        );
    }
}

impl SendPort for DdsSendPort {
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

        let writer = self.writer.lock().clone().ok_or(Error::AlreadyJoined)?;
        writer.enable()?;
        *state = PortState::Started;

        log::info!("[send-port] '{}' started on '{}'", self.name, self.topic);
        Ok(())
    }

    fn send(&self, metadata: &MetaData) -> Result<()> {
        let _linearized = self.send_lock.lock();
        let writer = self.active_writer()?;

        let sample = codec::encode(metadata)?;
        let len = sample.len() as u64;
        writer
            .write(sample, self.config.max_blocking_time)
            .map_err(|e| match e {
                Error::Closed => Error::AlreadyJoined,
                other => other,
            })?;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
        log::debug!(
            "[send-port] '{}' sent {} bytes on '{}'",
            self.name,
            len,
            self.topic
        );
        Ok(())
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

impl std::fmt::Debug for DdsSendPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdsSendPort")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}
