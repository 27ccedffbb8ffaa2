// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant sharing.
//!
//! Channels on the same `(transport, backend)` pair share one participant.
//! The pool only keeps `Weak` references: the participant lives as long as
//! at least one channel holds its `Arc<SharedParticipant>`.

use super::{BackendParticipant, DdsBackend, DdsBackendType, DdsTransportType};
use crate::config::ChannelConfig;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Pool key.
pub type ParticipantKey = (DdsTransportType, DdsBackendType);

/// A pooled participant.
pub struct SharedParticipant {
    key: ParticipantKey,
    inner: Box<dyn BackendParticipant>,
}

impl SharedParticipant {
    pub fn transport(&self) -> DdsTransportType {
        self.key.0
    }

    pub fn backend(&self) -> DdsBackendType {
        self.key.1
    }
}

impl std::ops::Deref for SharedParticipant {
    type Target = dyn BackendParticipant;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for SharedParticipant {
    fn drop(&mut self) {
        log::info!(
            "[pool] Released participant backend={} transport={} domain={}",
            self.key.1,
            self.key.0,
            self.inner.domain_id()
        );
    }
}

impl std::fmt::Debug for SharedParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedParticipant")
            .field("backend", &self.key.1)
            .field("transport", &self.key.0)
            .field("domain_id", &self.inner.domain_id())
            .finish()
    }
}

/// Weak map of live participants.
#[derive(Default)]
pub struct ParticipantPool {
    participants: Mutex<HashMap<ParticipantKey, Weak<SharedParticipant>>>,
}

impl ParticipantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live participant for `(transport, backend)`, or create one.
    ///
    /// `config` only applies when a new participant is created.
    pub fn acquire(
        &self,
        backend: &dyn DdsBackend,
        transport: DdsTransportType,
        config: &ChannelConfig,
    ) -> Result<Arc<SharedParticipant>> {
        let key = (transport, backend.backend_type());
        let mut participants = self.participants.lock();

        if let Some(live) = participants.get(&key).and_then(Weak::upgrade) {
            log::debug!("[pool] Reusing participant backend={} transport={}", key.1, key.0);
            return Ok(live);
        }

        let inner = backend.create_participant(transport, config)?;
        let shared = Arc::new(SharedParticipant { key, inner });
        participants.retain(|_, weak| weak.strong_count() > 0);
        participants.insert(key, Arc::downgrade(&shared));

        log::info!(
            "[pool] New participant backend={} transport={} domain={}",
            key.1,
            key.0,
            shared.domain_id()
        );

        Ok(shared)
    }

    /// Participants currently alive.
    pub fn live_count(&self) -> usize {
        self.participants
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CycloneBackend;

    #[test]
    fn test_acquire_shares_per_transport() {
        let backend = CycloneBackend::new();
        let pool = ParticipantPool::new();
        let config = ChannelConfig::default();

        let a = pool
            .acquire(&backend, DdsTransportType::UdpV4, &config)
            .expect("udp");
        let b = pool
            .acquire(&backend, DdsTransportType::UdpV4, &config)
            .expect("udp");
        let c = pool
            .acquire(&backend, DdsTransportType::Shm, &config)
            .expect("shm");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.live_count(), 2);
        assert_eq!(c.transport(), DdsTransportType::Shm);
        assert_eq!(c.backend(), DdsBackendType::CycloneDds);
    }

    #[test]
    fn test_released_when_last_user_drops() {
        let backend = CycloneBackend::new();
        let pool = ParticipantPool::new();
        let config = ChannelConfig::default();

        let a = pool
            .acquire(&backend, DdsTransportType::UdpV6, &config)
            .expect("udp6");
        let b = Arc::clone(&a);
        drop(a);
        assert_eq!(pool.live_count(), 1);
        drop(b);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_failed_creation_not_pooled() {
        let backend = CycloneBackend::new();
        let pool = ParticipantPool::new();
        assert!(pool
            .acquire(&backend, DdsTransportType::TcpV4, &ChannelConfig::default())
            .is_err());
        assert_eq!(pool.live_count(), 0);
    }
}
