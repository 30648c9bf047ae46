//! Lexicographically sortable, timestamped unique identifiers.
//!
//! A [`Ulid`] packs a 48-bit millisecond timestamp and 80 bits of
//! randomness into a 26-character Crockford base32 string, generated by
//! the `ulid` crate. Two ids minted in the same millisecond still sort
//! by their random tail, so ordering is monotonic only up to timestamp
//! resolution — callers that need a strict total order use the
//! `(session_id, sequence)` pair instead (see `k6s_audit`).

use std::fmt;

use serde::{Deserialize, Serialize};

const LEN: usize = 26;

/// A 26-character Crockford base32 identifier: 48 bits of wall-clock
/// time followed by 80 bits of randomness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ulid(String);

impl Ulid {
    /// Mint a new id stamped with the current wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Build an id from an explicit timestamp and entropy buffer.
    ///
    /// Exposed for deterministic tests; production callers should use
    /// [`Ulid::new`].
    #[must_use]
    pub fn from_parts(millis: u64, entropy: &[u8; 10]) -> Self {
        let mut buf = [0u8; 16];
        buf[6..16].copy_from_slice(entropy);
        let random = u128::from_be_bytes(buf);
        Self(ulid::Ulid::from_parts(millis, random).to_string())
    }

    /// The id as its 26-character string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-formatted id string, e.g. one read back out of
    /// storage, without re-deriving timestamp/entropy from it.
    #[must_use]
    pub fn from_raw(raw: String) -> Self {
        Self(raw)
    }
}

impl Default for Ulid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Ulid> for String {
    fn from(id: Ulid) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_26_chars() {
        let id = Ulid::new();
        assert_eq!(id.as_str().len(), LEN);
    }

    #[test]
    fn sorts_by_timestamp() {
        let early = Ulid::from_parts(1_000, &[0; 10]);
        let late = Ulid::from_parts(2_000, &[0; 10]);
        assert!(early < late);
    }

    #[test]
    fn distinct_entropy_differs() {
        let a = Ulid::from_parts(1_000, &[1; 10]);
        let b = Ulid::from_parts(1_000, &[2; 10]);
        assert_ne!(a, b);
    }
}
