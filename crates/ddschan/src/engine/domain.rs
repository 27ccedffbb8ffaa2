// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain and topic lookup.

use super::topic::TopicState;
use super::TypeId;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Domain ID type (0-232)
pub type DomainId = u32;

/// Domain state - holds the live topics of a single domain
pub struct DomainState {
    /// Domain ID
    pub domain_id: DomainId,
    topics: Mutex<HashMap<Arc<str>, Weak<TopicState>>>,
}

impl DomainState {
    /// Create new domain state
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Find or create a topic.
    ///
    /// A live topic with the same name but another [`TypeId`] is an error;
    /// the caller must hold the returned Arc to keep the topic alive.
    pub fn register_topic(&self, name: &str, type_name: &str) -> Result<Arc<TopicState>> {
        let type_id = TypeId::of(type_name);
        let mut topics = self.topics.lock();

        if let Some(existing) = topics.get(name).and_then(Weak::upgrade) {
            if existing.type_id() != type_id {
                return Err(Error::BackendError(format!(
                    "topic '{}' already registered with type '{}' {:?}, not '{}' {:?}",
                    name,
                    existing.type_name(),
                    existing.type_id(),
                    type_name,
                    type_id
                )));
            }
            return Ok(existing);
        }

        let name: Arc<str> = Arc::from(name);
        let topic = Arc::new(TopicState::new(
            self.domain_id,
            Arc::clone(&name),
            Arc::from(type_name),
            type_id,
        ));
        topics.retain(|_, weak| weak.strong_count() > 0);
        topics.insert(name, Arc::downgrade(&topic));

        log::debug!(
            "[data-space] Created topic '{}' type={} in domain {}",
            topic.name(),
            type_name,
            self.domain_id
        );

        Ok(topic)
    }

    /// Live topic by name, if any
    pub fn find_topic(&self, name: &str) -> Option<Arc<TopicState>> {
        self.topics.lock().get(name).and_then(Weak::upgrade)
    }

    /// Get count of live topics
    pub fn topic_count(&self) -> usize {
        self.topics
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainState")
            .field("domain_id", &self.domain_id)
            .field("topic_count", &self.topic_count())
            .finish()
    }
}

/// Domain registry
///
/// Each backend adapter owns one; participants hold the returned
/// `Arc<DomainState>` to keep their domain alive.
#[derive(Default)]
pub struct DomainRegistry {
    domains: Mutex<HashMap<DomainId, Weak<DomainState>>>,
}

impl DomainRegistry {
    /// Create new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create domain state for a domain ID
    pub fn get_or_create(&self, domain_id: DomainId) -> Arc<DomainState> {
        let mut domains = self.domains.lock();

        if let Some(strong) = domains.get(&domain_id).and_then(Weak::upgrade) {
            return strong;
        }

        let state = Arc::new(DomainState::new(domain_id));
        domains.insert(domain_id, Arc::downgrade(&state));

        log::info!("[data-space] Created domain state for domain_id={}", domain_id);

        state
    }

    /// Try to get existing domain state
    pub fn get(&self, domain_id: DomainId) -> Option<Arc<DomainState>> {
        self.domains.lock().get(&domain_id).and_then(Weak::upgrade)
    }

    /// Clean up expired domain references
    pub fn cleanup_expired(&self) {
        self.domains.lock().retain(|_, weak| weak.strong_count() > 0);
    }

    /// Get count of active domains
    pub fn active_domain_count(&self) -> usize {
        self.domains
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}
