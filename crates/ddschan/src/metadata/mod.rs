// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # MetaData descriptor
//!
//! One channel message: an n-dimensional array header plus the raw,
//! C-contiguous payload bytes.
//!
//! ```text
//! MetaData
//! +-- nd          rank, 1..=MAX_RANK
//! +-- dtype       scalar type code (see ScalarType)
//! +-- elsize      element byte size, agrees with dtype
//! +-- total_size  element count = prod(dims[..nd])
//! +-- dims[5]     first nd significant, rest zero
//! +-- strides[5]  byte strides, first nd significant, rest zero
//! +-- mdata       total_size * elsize bytes
//! ```
//!
//! Fields are public so descriptors can be filled in the way peers lay them
//! out; [`MetaData::validate`] checks the invariants before a send and after
//! a decode.

pub mod codec;
mod scalar;

pub use scalar::ScalarType;

use crate::config::MAX_RANK;
use crate::error::{Error, Result};

/// Array descriptor plus payload.
#[derive(Clone, PartialEq, Eq)]
pub struct MetaData {
    /// Rank.
    pub nd: u32,
    /// Scalar type code.
    pub dtype: u32,
    /// Element byte size.
    pub elsize: u32,
    /// Element count.
    pub total_size: u64,
    /// Dimensions; entries past `nd` are zero.
    pub dims: [u64; MAX_RANK],
    /// Byte strides; entries past `nd` are zero.
    pub strides: [u64; MAX_RANK],
    /// Payload, `total_size * elsize` bytes.
    pub mdata: Vec<u8>,
}

impl MetaData {
    /// Build a C-contiguous descriptor for `shape`.
    ///
    /// `total_size` and byte strides are derived from the shape; the payload
    /// length must match.
    pub fn new(scalar: ScalarType, shape: &[u64], mdata: Vec<u8>) -> Result<Self> {
        if shape.is_empty() || shape.len() > MAX_RANK {
            return Err(Error::DescriptorInvalid(format!(
                "rank {} outside 1..={}",
                shape.len(),
                MAX_RANK
            )));
        }

        let elsize = scalar.elsize();
        let mut dims = [0u64; MAX_RANK];
        let mut strides = [0u64; MAX_RANK];
        dims[..shape.len()].copy_from_slice(shape);

        let mut stride = u64::from(elsize);
        for axis in (0..shape.len()).rev() {
            strides[axis] = stride;
            stride = stride.saturating_mul(shape[axis]);
        }

        let total_size = shape_product(shape).ok_or_else(|| {
            Error::DescriptorInvalid(format!("shape {:?} overflows element count", shape))
        })?;

        let md = Self {
            nd: shape.len() as u32,
            dtype: scalar.code(),
            elsize,
            total_size,
            dims,
            strides,
            mdata,
        };
        md.validate()?;
        Ok(md)
    }

    /// One-dimensional byte array (type code 7).
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        let mut dims = [0u64; MAX_RANK];
        let mut strides = [0u64; MAX_RANK];
        dims[0] = len;
        strides[0] = 1;
        Self {
            nd: 1,
            dtype: ScalarType::Byte.code(),
            elsize: 1,
            total_size: len,
            dims,
            strides,
            mdata: data,
        }
    }

    /// Check every layout invariant.
    ///
    /// # Errors
    ///
    /// `DescriptorInvalid` naming the first broken invariant.
    pub fn validate(&self) -> Result<()> {
        let nd = self.nd as usize;
        if nd == 0 || nd > MAX_RANK {
            return Err(Error::DescriptorInvalid(format!(
                "nd={} outside 1..={}",
                self.nd, MAX_RANK
            )));
        }

        let scalar = ScalarType::from_code(self.dtype).ok_or_else(|| {
            Error::DescriptorInvalid(format!("unknown type code {}", self.dtype))
        })?;
        if scalar.elsize() != self.elsize {
            return Err(Error::DescriptorInvalid(format!(
                "elsize={} does not match type {} ({} bytes)",
                self.elsize,
                scalar,
                scalar.elsize()
            )));
        }

        let product = shape_product(&self.dims[..nd]).ok_or_else(|| {
            Error::DescriptorInvalid(format!("dims {:?} overflow", &self.dims[..nd]))
        })?;
        if product != self.total_size {
            return Err(Error::DescriptorInvalid(format!(
                "total_size={} but dims {:?} hold {} elements",
                self.total_size,
                &self.dims[..nd],
                product
            )));
        }

        if self.dims[nd..].iter().any(|&d| d != 0) || self.strides[nd..].iter().any(|&s| s != 0)
        {
            return Err(Error::DescriptorInvalid(format!(
                "non-zero dims/strides past nd={}",
                nd
            )));
        }

        let nbytes = self.expected_nbytes().ok_or_else(|| {
            Error::DescriptorInvalid(format!(
                "payload size {} x {} overflows",
                self.total_size, self.elsize
            ))
        })?;
        if self.mdata.len() != nbytes {
            return Err(Error::DescriptorInvalid(format!(
                "payload is {} bytes, header describes {}",
                self.mdata.len(),
                nbytes
            )));
        }

        Ok(())
    }

    /// Payload byte count implied by the header, `None` on overflow.
    pub fn expected_nbytes(&self) -> Option<usize> {
        self.total_size
            .checked_mul(u64::from(self.elsize))
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Scalar kind, `None` for unknown codes.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        ScalarType::from_code(self.dtype)
    }

    /// Significant dimensions.
    pub fn shape(&self) -> &[u64] {
        &self.dims[..(self.nd as usize).min(MAX_RANK)]
    }

    /// Significant strides.
    pub fn strides(&self) -> &[u64] {
        &self.strides[..(self.nd as usize).min(MAX_RANK)]
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.mdata
    }

    /// Payload byte count.
    pub fn nbytes(&self) -> usize {
        self.mdata.len()
    }

    /// Take ownership of the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.mdata
    }
}

impl std::fmt::Debug for MetaData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaData")
            .field("nd", &self.nd)
            .field("dtype", &self.dtype)
            .field("elsize", &self.elsize)
            .field("total_size", &self.total_size)
            .field("dims", &self.shape())
            .field("strides", &self.strides())
            .field("nbytes", &self.mdata.len())
            .finish()
    }
}

fn shape_product(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}
