// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor wire codec.
//!
//! One DDS sample, little-endian, packed:
//!
//! ```text
//! offset  size  field
//! 0       4     nd
//! 4       4     type
//! 8       4     elsize
//! 12      8     total_size
//! 20      40    dims[5]
//! 60      40    strides[5]
//! 100     N     payload (total_size * elsize bytes)
//! ```

use super::MetaData;
use crate::config::{MAX_RANK, METADATA_HEADER_LEN};
use crate::error::{Error, Result};

/// Encoded size of `md` (header + payload).
pub fn encoded_len(md: &MetaData) -> usize {
    METADATA_HEADER_LEN + md.mdata.len()
}

/// Validate and serialize a descriptor into a fresh sample buffer.
pub fn encode(md: &MetaData) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(md));
    encode_into(md, &mut buf)?;
    Ok(buf)
}

/// Validate and append the serialized descriptor to `buf`.
///
/// `buf` is left untouched when validation fails.
pub fn encode_into(md: &MetaData, buf: &mut Vec<u8>) -> Result<()> {
    md.validate()?;

    buf.reserve(encoded_len(md));
    buf.extend_from_slice(&md.nd.to_le_bytes());
    buf.extend_from_slice(&md.dtype.to_le_bytes());
    buf.extend_from_slice(&md.elsize.to_le_bytes());
    buf.extend_from_slice(&md.total_size.to_le_bytes());
    for dim in &md.dims {
        buf.extend_from_slice(&dim.to_le_bytes());
    }
    for stride in &md.strides {
        buf.extend_from_slice(&stride.to_le_bytes());
    }
    buf.extend_from_slice(&md.mdata);
    Ok(())
}

/// Deserialize a sample into a descriptor owning a fresh payload copy.
///
/// # Errors
///
/// `DescriptorInvalid` on a truncated header, a payload length that
/// disagrees with the header, or any layout invariant failure.
pub fn decode(sample: &[u8]) -> Result<MetaData> {
    if sample.len() < METADATA_HEADER_LEN {
        return Err(Error::DescriptorInvalid(format!(
            "sample is {} bytes, header needs {}",
            sample.len(),
            METADATA_HEADER_LEN
        )));
    }

    let mut reader = LeReader::new(&sample[..METADATA_HEADER_LEN]);
    let nd = reader.u32();
    let dtype = reader.u32();
    let elsize = reader.u32();
    let total_size = reader.u64();
    let mut dims = [0u64; MAX_RANK];
    for dim in dims.iter_mut() {
        *dim = reader.u64();
    }
    let mut strides = [0u64; MAX_RANK];
    for stride in strides.iter_mut() {
        *stride = reader.u64();
    }

    let payload = &sample[METADATA_HEADER_LEN..];
    let md = MetaData {
        nd,
        dtype,
        elsize,
        total_size,
        dims,
        strides,
        mdata: payload.to_vec(),
    };
    md.validate()?;
    Ok(md)
}

/// Fixed-layout little-endian reader over a slice whose length was checked.
struct LeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take::<4>())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take::<8>())
    }
}
