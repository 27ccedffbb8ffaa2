// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS policies for data space writers and readers.
//!
//! Only the policies a channel needs are modelled:
//!
//! - **Reliability**: BestEffort (fire-and-forget) or Reliable (acknowledged)
//! - **History**: KeepLast(n) bounded queue, KeepAll within `ResourceLimits`
//! - **ResourceLimits**: `max_samples`
//!
//! # Examples
//!
//! ```
//! use ddschan::qos::{EndpointQos, History, Reliability};
//!
//! // What every channel endpoint uses: reliable, keep-all, bounded by depth
//! let qos = EndpointQos::channel(10);
//! assert_eq!(qos.reliability, Reliability::Reliable);
//! assert_eq!(qos.history, History::KeepAll);
//! assert_eq!(qos.capacity(), 10);
//! ```

use crate::error::{Error, Result};

/// Reliability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Offered once to currently matched readers, never retained.
    #[default]
    BestEffort,
    /// Retained until every matched reader holds the sample.
    Reliable,
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N samples (bounded queue, drops oldest)
    KeepLast(u32),
    /// Keep all samples within resource limits.
    ///
    /// Inserts wait (writer) or are held back (reader) once the limit is reached.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepLast(10)
    }
}

/// Resource limits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Samples an endpoint may hold at once (KeepAll bound).
    pub max_samples: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { max_samples: 1024 }
    }
}

/// Collection of policies for one writer or reader.
///
/// Validated at endpoint creation (fail-fast on invalid config).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EndpointQos {
    pub reliability: Reliability,
    pub history: History,
    pub resource_limits: ResourceLimits,
}

impl EndpointQos {
    /// Reliable, keep-all, bounded to `depth` samples.
    pub fn channel(depth: u32) -> Self {
        Self::reliable().keep_all().max_samples(depth)
    }

    /// Reliable delivery with default history.
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            ..Self::default()
        }
    }

    /// Best-effort delivery with default history.
    pub fn best_effort() -> Self {
        Self::default()
    }

    /// Set KEEP_LAST history depth.
    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    /// Set KEEP_ALL history policy.
    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    /// Set the resource limit.
    pub fn max_samples(mut self, max_samples: u32) -> Self {
        self.resource_limits.max_samples = max_samples;
        self
    }

    /// Samples the endpoint may hold.
    pub fn capacity(&self) -> usize {
        match self.history {
            History::KeepLast(depth) => depth as usize,
            History::KeepAll => self.resource_limits.max_samples as usize,
        }
    }

    /// Whether a full endpoint evicts its oldest sample instead of pushing back.
    pub fn evicts_oldest(&self) -> bool {
        matches!(self.history, History::KeepLast(_))
    }

    /// Validate the policy set.
    ///
    /// - History::KeepLast(n) where n > 0
    /// - History::KeepAll requires ResourceLimits.max_samples > 0
    pub fn validate(&self) -> Result<()> {
        match self.history {
            History::KeepLast(0) => Err(Error::InvalidDepth),
            History::KeepAll if self.resource_limits.max_samples == 0 => Err(Error::InvalidDepth),
            _ => Ok(()),
        }
    }

    /// Whether a writer with `self` may deliver to a reader with `reader`.
    ///
    /// - Reliable writer -> any reader: compatible
    /// - BestEffort writer + BestEffort reader: compatible
    /// - BestEffort writer + Reliable reader: INCOMPATIBLE
    pub fn compatible_with_reader(&self, reader: &EndpointQos) -> bool {
        match (self.reliability, reader.reliability) {
            (Reliability::Reliable, _) => true,
            (Reliability::BestEffort, Reliability::BestEffort) => true,
            (Reliability::BestEffort, Reliability::Reliable) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_qos() {
        let qos = EndpointQos::channel(2);
        assert!(matches!(qos.history, History::KeepAll));
        assert_eq!(qos.capacity(), 2);
        assert!(!qos.evicts_oldest());
        assert!(qos.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert_eq!(EndpointQos::channel(0).validate(), Err(Error::InvalidDepth));
        assert_eq!(
            EndpointQos::best_effort().keep_last(0).validate(),
            Err(Error::InvalidDepth)
        );
    }

    #[test]
    fn test_keep_last_capacity() {
        let qos = EndpointQos::best_effort().keep_last(3).max_samples(100);
        assert_eq!(qos.capacity(), 3);
        assert!(qos.evicts_oldest());
    }

    #[test]
    fn test_reliability_compatibility() {
        let reliable = EndpointQos::reliable();
        let best_effort = EndpointQos::best_effort();
        assert!(reliable.compatible_with_reader(&best_effort));
        assert!(reliable.compatible_with_reader(&reliable));
        assert!(best_effort.compatible_with_reader(&best_effort));
        assert!(!best_effort.compatible_with_reader(&reliable));
    }
}
