//! Key and value types stored in the index.

use std::fmt;

use crate::common::config::VALUE_SIZE;

/// An index key.
///
/// Keys are signed 64-bit integers, serialized little-endian. The tree
/// orders records by plain integer comparison.
pub type Key = i64;

/// Fixed-size value payload stored alongside each key.
///
/// Opaque to the index: typically a record locator that the table layer
/// resolves to a full record. Copied byte-for-byte through every split,
/// merge, and redistribution.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(pub [u8; VALUE_SIZE]);

impl Value {
    /// Zeroed value, handy in tests and as a default payload.
    pub const ZERO: Value = Value([0u8; VALUE_SIZE]);

    /// Build a value from a u64 (little-endian), the common record-locator case.
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Value(v.to_le_bytes())
    }

    /// Interpret the payload as a little-endian u64.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Raw payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:#018x})", self.as_u64())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::from_u64(v)
    }
}
