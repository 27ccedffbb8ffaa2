// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by channel, port, codec and backend operations.
//!
//! Every error maps to a stable [`ErrorCode`] that peers and callers can
//! switch on, plus a free-form detail string (vendor detail where present).
//!
//! # Example
//!
//! ```
//! use ddschan::{ChannelFactory, DdsBackendType, DdsTransportType, Error, ErrorCode};
//!
//! let factory = ChannelFactory::new();
//! let result = factory.get_dds_channel(
//!     "src", "dst", "rt/doc", 0, 1, DdsTransportType::UdpV4, DdsBackendType::CycloneDds,
//! );
//! match result {
//!     Err(e) => assert_eq!(e.code(), ErrorCode::InvalidDepth),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use crate::backend::{DdsBackendType, DdsTransportType};

/// Errors returned by ddschan operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// No adapter registered for this backend, or it does not offer the transport.
    UnknownBackend {
        backend: DdsBackendType,
        transport: DdsTransportType,
    },
    /// Channel depth must be at least one sample.
    InvalidDepth,
    /// Configuration value out of range (domain id, empty topic name, ...).
    InvalidConfig(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Descriptor fails a layout invariant (rank, element size, total size, payload).
    DescriptorInvalid(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Port used before `start()`.
    NotStarted,
    /// `start()` called twice.
    AlreadyStarted,
    /// Port used after `join()`.
    AlreadyJoined,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Opaque backend failure carrying vendor detail.
    BackendError(String),
    /// Backend operation exceeded its blocking bound.
    BackendTimeout(String),

    // ========================================================================
    // Termination
    // ========================================================================
    /// Port was joined; no more samples will arrive.
    Closed,
}

/// Stable error code, one per [`Error`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownBackend,
    InvalidDepth,
    InvalidConfig,
    DescriptorInvalid,
    NotStarted,
    AlreadyStarted,
    AlreadyJoined,
    BackendError,
    BackendTimeout,
    Closed,
}

impl ErrorCode {
    /// Numeric code (stable across releases).
    pub const fn as_u32(self) -> u32 {
        match self {
            ErrorCode::UnknownBackend => 1,
            ErrorCode::InvalidDepth => 2,
            ErrorCode::InvalidConfig => 3,
            ErrorCode::DescriptorInvalid => 10,
            ErrorCode::NotStarted => 20,
            ErrorCode::AlreadyStarted => 21,
            ErrorCode::AlreadyJoined => 22,
            ErrorCode::BackendError => 30,
            ErrorCode::BackendTimeout => 31,
            ErrorCode::Closed => 40,
        }
    }

    /// Symbolic code (stable across releases).
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownBackend => "UNKNOWN_BACKEND",
            ErrorCode::InvalidDepth => "INVALID_DEPTH",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::DescriptorInvalid => "DESCRIPTOR_INVALID",
            ErrorCode::NotStarted => "NOT_STARTED",
            ErrorCode::AlreadyStarted => "ALREADY_STARTED",
            ErrorCode::AlreadyJoined => "ALREADY_JOINED",
            ErrorCode::BackendError => "BACKEND_ERROR",
            ErrorCode::BackendTimeout => "BACKEND_TIMEOUT",
            ErrorCode::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::UnknownBackend { .. } => ErrorCode::UnknownBackend,
            Error::InvalidDepth => ErrorCode::InvalidDepth,
            Error::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Error::DescriptorInvalid(_) => ErrorCode::DescriptorInvalid,
            Error::NotStarted => ErrorCode::NotStarted,
            Error::AlreadyStarted => ErrorCode::AlreadyStarted,
            Error::AlreadyJoined => ErrorCode::AlreadyJoined,
            Error::BackendError(_) => ErrorCode::BackendError,
            Error::BackendTimeout(_) => ErrorCode::BackendTimeout,
            Error::Closed => ErrorCode::Closed,
        }
    }

    /// Detail string (empty for variants without one).
    pub fn detail(&self) -> String {
        match self {
            Error::UnknownBackend { backend, transport } => {
                format!("backend={} transport={}", backend, transport)
            }
            Error::InvalidConfig(msg)
            | Error::DescriptorInvalid(msg)
            | Error::BackendError(msg)
            | Error::BackendTimeout(msg) => msg.clone(),
            Error::InvalidDepth
            | Error::NotStarted
            | Error::AlreadyStarted
            | Error::AlreadyJoined
            | Error::Closed => String::new(),
        }
    }

    /// Lifecycle misuse (programming error on the caller's side).
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Error::NotStarted | Error::AlreadyStarted | Error::AlreadyJoined
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownBackend { backend, transport } => write!(
                f,
                "No adapter registered for backend {} with transport {}",
                backend, transport
            ),
            Error::InvalidDepth => write!(f, "Invalid depth: must be at least 1"),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::DescriptorInvalid(msg) => write!(f, "Invalid descriptor: {}", msg),
            Error::NotStarted => write!(f, "Port not started"),
            Error::AlreadyStarted => write!(f, "Port already started"),
            Error::AlreadyJoined => write!(f, "Port already joined"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::BackendTimeout(msg) => write!(f, "Backend timeout: {}", msg),
            Error::Closed => write!(f, "Port closed"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
