// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar type table shared with peers.
//!
//! | code | kind | elsize |
//! |------|------|--------|
//! | 0 | Bool | 1 |
//! | 1 | Int16 | 2 |
//! | 2 | UInt16 | 2 |
//! | 3 | Int32 | 4 |
//! | 4 | UInt32 | 4 |
//! | 5 | Int64 | 8 |
//! | 6 | UInt64 | 8 |
//! | 7 | Byte | 1 |
//! | 8 | Float32 | 4 |
//! | 9 | Float64 | 8 |
//! | 10 | Complex64 | 8 |
//! | 11 | Complex128 | 16 |
//!
//! Code 7 is the canonical 8-bit integer; signedness is left to the peer.

/// Element scalar kind of a descriptor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    /// 8-bit integer (code 7).
    Byte,
    Float32,
    Float64,
    /// Pair of f32.
    Complex64,
    /// Pair of f64.
    Complex128,
}

impl ScalarType {
    /// Every entry, ordered by code.
    pub const ALL: [ScalarType; 12] = [
        ScalarType::Bool,
        ScalarType::Int16,
        ScalarType::UInt16,
        ScalarType::Int32,
        ScalarType::UInt32,
        ScalarType::Int64,
        ScalarType::UInt64,
        ScalarType::Byte,
        ScalarType::Float32,
        ScalarType::Float64,
        ScalarType::Complex64,
        ScalarType::Complex128,
    ];

    /// Wire code.
    pub const fn code(self) -> u32 {
        match self {
            ScalarType::Bool => 0,
            ScalarType::Int16 => 1,
            ScalarType::UInt16 => 2,
            ScalarType::Int32 => 3,
            ScalarType::UInt32 => 4,
            ScalarType::Int64 => 5,
            ScalarType::UInt64 => 6,
            ScalarType::Byte => 7,
            ScalarType::Float32 => 8,
            ScalarType::Float64 => 9,
            ScalarType::Complex64 => 10,
            ScalarType::Complex128 => 11,
        }
    }

    /// Look up a wire code.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ScalarType::Bool),
            1 => Some(ScalarType::Int16),
            2 => Some(ScalarType::UInt16),
            3 => Some(ScalarType::Int32),
            4 => Some(ScalarType::UInt32),
            5 => Some(ScalarType::Int64),
            6 => Some(ScalarType::UInt64),
            7 => Some(ScalarType::Byte),
            8 => Some(ScalarType::Float32),
            9 => Some(ScalarType::Float64),
            10 => Some(ScalarType::Complex64),
            11 => Some(ScalarType::Complex128),
            _ => None,
        }
    }

    /// Element byte size.
    pub const fn elsize(self) -> u32 {
        match self {
            ScalarType::Bool | ScalarType::Byte => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64
            | ScalarType::UInt64
            | ScalarType::Float64
            | ScalarType::Complex64 => 8,
            ScalarType::Complex128 => 16,
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table_is_bijective() {
        for (idx, scalar) in ScalarType::ALL.iter().enumerate() {
            assert_eq!(scalar.code() as usize, idx);
            assert_eq!(ScalarType::from_code(scalar.code()), Some(*scalar));
        }
        assert_eq!(ScalarType::from_code(12), None);
        assert_eq!(ScalarType::from_code(u32::MAX), None);
    }

    #[test]
    fn test_code_seven_is_byte() {
        let byte = ScalarType::from_code(7).expect("code 7 is reserved");
        assert_eq!(byte, ScalarType::Byte);
        assert_eq!(byte.elsize(), 1);
    }
}
