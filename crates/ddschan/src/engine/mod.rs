// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS data space.
//!
//! Backend adapters run their participants over a data space: the set of
//! domains, topics, writers and readers reachable without a network hop.
//! Writers and readers that share a topic are matched automatically
//! once enabled. Endpoints of other processes appear as remote stand-ins
//! (see [`Origin`]) created by the wire transport.
//!
//! # Architecture
//!
//! ```text
//! DomainRegistry (one per backend adapter instance)
//! +-- domains: Mutex<HashMap<DomainId, Weak<DomainState>>>
//!
//! DomainState (one per domain)
//! +-- topics: Mutex<HashMap<topic name, Weak<TopicState>>>
//!
//! TopicState (one per topic, held by every endpoint on it)
//! +-- inner: Mutex<TopicInner>
//! |   +-- writers: EndpointId -> history (seq, payload)
//! |   +-- readers: EndpointId -> cache + per-writer cursor
//! +-- space: Condvar   (history released / endpoint closed)
//! +-- data:  Condvar   (sample cached / endpoint closed)
//! ```
//!
//! # Delivery Flow
//!
//! 1. `write()` appends to the writer history (waits while a reliable
//!    keep-all history is full)
//! 2. The topic pumps history into every matched reader cache, in sequence
//!    order per writer, until a keep-all cache is full
//! 3. A reliable sample leaves the history once every matched reader has it
//! 4. `take()` pops the reader cache and pumps again, which may release
//!    history and wake blocked writers
//!
//! # Thread Safety
//!
//! - DomainRegistry / DomainState: Mutex around the lookup maps only
//! - TopicState: one Mutex per topic; waits use the topic condvars
//! - Delivery listeners of remote readers run after the topic lock is released

mod domain;
mod endpoint;
mod topic;

pub use domain::{DomainId, DomainRegistry, DomainState};
pub use endpoint::{DataSpaceReader, DataSpaceWriter};
pub use topic::{CachedSample, DeliveryListener, EndpointId, LinkId, Origin, TopicState, NO_LINK};

/// Identity of a registered sample type.
///
/// First 14 bytes of the MD5 digest of the type name. Topics agree on
/// their type exactly when their ids are equal, both inside one data space
/// and across the wire where peers announce the id instead of the name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId([u8; TypeId::LEN]);

impl TypeId {
    /// Encoded size.
    pub const LEN: usize = 14;

    /// Identity of `type_name`.
    pub fn of(type_name: &str) -> Self {
        use md5::{Digest, Md5};
        let digest = Md5::digest(type_name.as_bytes());
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest[..Self::LEN]);
        Self(bytes)
    }

    /// Rebuild an id received from a peer.
    pub const fn from_bytes(bytes: [u8; TypeId::LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; TypeId::LEN] {
        &self.0
    }
}

impl std::fmt::Debug for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TypeId(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::METADATA_TYPE_NAME;

    #[test]
    fn test_type_id_depends_only_on_name() {
        let a = TypeId::of(METADATA_TYPE_NAME);
        assert_eq!(a, TypeId::of(METADATA_TYPE_NAME));
        assert_ne!(a, TypeId::of("DDSMetaData2"));
        assert_eq!(TypeId::from_bytes(*a.as_bytes()), a);
    }

    #[test]
    fn test_type_id_debug_is_full_hex() {
        let text = format!("{:?}", TypeId::from_bytes([0xAB; TypeId::LEN]));
        assert_eq!(text, format!("TypeId({})", "ab".repeat(TypeId::LEN)));
    }
}
