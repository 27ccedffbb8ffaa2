// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel factory.
//!
//! The factory is the only place channels are created. It memoizes them by
//! [`ChannelIdentity`], so every caller asking for the same identity shares
//! one channel (and one writer/reader pair on the topic).
//!
//! # Structure
//!
//! - **Backends**: `DashMap<DdsBackendType, Arc<dyn DdsBackend>>`, Cyclone
//!   registered at construction
//! - **Config**: `ArcSwap<ChannelConfig>`, read once per channel creation
//! - **Participants**: [`ParticipantPool`], one per `(transport, backend)`
//! - **Channels**: one `Mutex<HashMap>` covering lookup + insert
//!
//! # Examples
//!
//! ```
//! use ddschan::{ChannelFactory, DdsBackendType, DdsTransportType};
//! use std::sync::Arc;
//!
//! let factory = ChannelFactory::new();
//! let a = factory
//!     .get_dds_channel("src", "dst", "rt/doc_factory", 10, 1,
//!                      DdsTransportType::UdpV4, DdsBackendType::CycloneDds)
//!     .unwrap();
//! let b = factory
//!     .get_dds_channel("src", "dst", "rt/doc_factory", 10, 1,
//!                      DdsTransportType::UdpV4, DdsBackendType::CycloneDds)
//!     .unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(factory.participant_count(), 1);
//! ```

use crate::backend::{CycloneBackend, DdsBackend, DdsBackendType, DdsTransportType, ParticipantPool};
use crate::channel::{ChannelIdentity, DdsChannel};
use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Process-wide factory, created on first use from the environment.
///
/// The factory lives in a static and is never dropped, so its `Drop` does
/// not run at process exit. Call [`ChannelFactory::close_all`] during
/// teardown: it joins every channel, and releasing the last channel of a
/// participant stops its wire bridge, which tells peers it left instead of
/// letting them wait out the lease.
pub fn get_channel_factory() -> &'static ChannelFactory {
    static FACTORY: OnceLock<ChannelFactory> = OnceLock::new();
    FACTORY.get_or_init(|| ChannelFactory::with_config(ChannelConfig::from_env()))
}

/// Registry of live channels.
pub struct ChannelFactory {
    backends: DashMap<DdsBackendType, Arc<dyn DdsBackend>>,
    config: ArcSwap<ChannelConfig>,
    channels: Mutex<HashMap<ChannelIdentity, Arc<DdsChannel>>>,
    // Declared after `channels`: participants outlive the channels using them.
    pool: ParticipantPool,
}

impl ChannelFactory {
    /// Independent factory with default config and the Cyclone adapter.
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Independent factory with `config` and the Cyclone adapter.
    ///
    /// An invalid `config` is logged and replaced by the defaults.
    pub fn with_config(config: ChannelConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::error!("[factory] {}; using defaults", e);
                ChannelConfig::default()
            }
        };

        let backends: DashMap<DdsBackendType, Arc<dyn DdsBackend>> = DashMap::new();
        backends.insert(DdsBackendType::CycloneDds, Arc::new(CycloneBackend::new()));

        Self {
            backends,
            config: ArcSwap::from_pointee(config),
            channels: Mutex::new(HashMap::new()),
            pool: ParticipantPool::new(),
        }
    }

    // ===================================================================
    // Backends & configuration
    // ===================================================================

    /// Register a vendor adapter, returning the one it replaces.
    pub fn register_backend(&self, backend: Arc<dyn DdsBackend>) -> Option<Arc<dyn DdsBackend>> {
        let kind = backend.backend_type();
        log::info!("[factory] Registered backend {}", kind);
        self.backends.insert(kind, backend)
    }

    /// Registered backends, sorted.
    pub fn backends(&self) -> Vec<DdsBackendType> {
        let mut kinds: Vec<_> = self.backends.iter().map(|entry| *entry.key()).collect();
        kinds.sort();
        kinds
    }

    /// Current channel defaults.
    pub fn config(&self) -> Arc<ChannelConfig> {
        self.config.load_full()
    }

    /// Swap the channel defaults.
    ///
    /// Applies to channels created afterwards; the domain of an already
    /// pooled participant does not change while channels still use it.
    pub fn set_config(&self, config: ChannelConfig) -> Result<()> {
        config.validate()?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    // ===================================================================
    // Channels
    // ===================================================================

    /// Get or create the channel for this identity.
    #[allow(clippy::too_many_arguments)]
    pub fn get_dds_channel(
        &self,
        src_name: &str,
        dst_name: &str,
        topic: &str,
        depth: usize,
        element_size: usize,
        transport: DdsTransportType,
        backend: DdsBackendType,
    ) -> Result<Arc<DdsChannel>> {
        self.get_channel(ChannelIdentity::new(
            src_name,
            dst_name,
            topic,
            depth,
            element_size,
            transport,
            backend,
        ))
    }

    /// Get or create the channel for `identity`.
    ///
    /// # Errors
    ///
    /// - `InvalidDepth` / `InvalidConfig` for a bad identity
    /// - `UnknownBackend` when no adapter serves `(backend, transport)`
    /// - whatever the adapter reports while building the channel
    pub fn get_channel(&self, identity: ChannelIdentity) -> Result<Arc<DdsChannel>> {
        identity.validate()?;

        let mut channels = self.channels.lock();
        if let Some(existing) = channels.get(&identity) {
            log::debug!("[factory] Reusing channel {}", identity);
            return Ok(Arc::clone(existing));
        }

        let backend = self
            .backends
            .get(&identity.backend)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|backend| backend.supports_transport(identity.transport))
            .ok_or(Error::UnknownBackend {
                backend: identity.backend,
                transport: identity.transport,
            })?;

        let config = self.config.load_full();
        let participant = self
            .pool
            .acquire(backend.as_ref(), identity.transport, &config)?;
        let channel = Arc::new(DdsChannel::open(identity.clone(), participant, &config)?);

        channels.insert(identity, Arc::clone(&channel));
        Ok(channel)
    }

    /// Join and forget one channel. Returns whether it existed.
    ///
    /// Callers still holding the channel keep their `Arc`, but both ports
    /// are joined.
    pub fn close_channel(&self, identity: &ChannelIdentity) -> bool {
        let removed = self.channels.lock().remove(identity);
        match removed {
            Some(channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Join and forget every channel.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.channels.lock().drain().map(|(_, c)| c).collect();
        if !drained.is_empty() {
            log::info!("[factory] Closing {} channel(s)", drained.len());
        }
        for channel in drained {
            channel.close();
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Live shared participants.
    pub fn participant_count(&self) -> usize {
        self.pool.live_count()
    }
}

impl Default for ChannelFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelFactory {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("backends", &self.backends())
            .field("channels", &self.channel_count())
            .field("participants", &self.participant_count())
            .field("config", &*self.config.load())
            .finish()
    }
}
