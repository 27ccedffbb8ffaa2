// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ddschan - DDS channels for actor runtimes
//!
//! Named, typed, bounded pub/sub channels over a DDS backend, exposed as a
//! uniform `(SendPort, RecvPort)` pair. Every message is a [`MetaData`]
//! descriptor: an n-dimensional array header plus its raw bytes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ddschan::{get_channel_factory, DdsBackendType, DdsTransportType, MetaData, SendPort, Result};
//!
//! fn main() -> Result<()> {
//!     let channel = get_channel_factory().get_dds_channel(
//!         "producer", "consumer", "rt/dds_topic", 10, 1,
//!         DdsTransportType::UdpV4, DdsBackendType::CycloneDds,
//!     )?;
//!
//!     let tx = channel.send_port();
//!     tx.start()?;
//!     tx.send(&MetaData::from_bytes(vec![42]))?;
//!     tx.join()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |   ChannelFactory  (memoizes channels by ChannelIdentity)            |
//! +---------------------------------------------------------------------+
//! |   DdsChannel -> DdsSendPort / DdsRecvPort   (lifecycle, codec)      |
//! +---------------------------------------------------------------------+
//! |   Backend adapters (CycloneDDS built in)  + ParticipantPool         |
//! +---------------------------------------------------------------------+
//! |   Data space: domains, topics, writer histories, reader caches      |
//! +---------------------------------------------------------------------+
//! |   Wire transport: announce, DATA/ACK between data spaces (mio)      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChannelFactory`] | Creates and memoizes channels, owns participants |
//! | [`DdsChannel`] | One topic bound to a send/recv port pair |
//! | [`SendPort`] / [`RecvPort`] | Runtime-facing port contracts |
//! | [`MetaData`] | Array descriptor carried by every sample |
//! | [`ChannelConfig`] | Domain, blocking bound and join drain defaults |
//!
//! ## Modules Overview
//!
//! - [`factory`] - channel registry (start here)
//! - [`channel`] - ports and their lifecycle
//! - [`metadata`] - descriptor and wire codec
//! - [`backend`] - vendor adapter traits, Cyclone adapter, participant pool
//! - [`engine`] - process-local data space
//! - [`transport`] - UDP bridge between processes
//! - [`qos`] - reliability / history policies

pub mod backend;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod metadata;
pub mod qos;
pub mod transport;

pub use backend::{DdsBackend, DdsBackendType, DdsTransportType};
pub use channel::{
    ChannelIdentity, DdsChannel, DdsRecvPort, DdsSendPort, PortState, PortStats, RecvPort,
    SendPort,
};
pub use config::ChannelConfig;
pub use error::{Error, ErrorCode, Result};
pub use factory::{get_channel_factory, ChannelFactory};
pub use metadata::{MetaData, ScalarType};
