//! Record identity hashing.
//!
//! Two hashing concerns live here:
//!
//! - **Content identity**: the write engine dedups records by an XXH3-64
//!   hash of their canonical bytes. Deterministic across platforms and runs.
//! - **Element identity**: set elements and map keys are ordered on the wire
//!   by a per-type hash so consumers iterate them stably. The strategy is a
//!   capability supplied at engine construction; the default uses the
//!   element's ordinal.

use std::collections::BTreeSet;

use xxhash_rust::xxh3::xxh3_64;

use crate::types::Ordinal;

/// Reserved header tag naming the types with non-default element hashing.
///
/// The value is the sorted, comma-separated list of type names, identical
/// across runs for a given type set.
pub const DEFINED_HASH_CODES_HEADER_TAG: &str = "DefinedHashCodes";

/// Content-identity hash of a record's canonical bytes.
#[inline]
pub fn record_hash(canonical_bytes: &[u8]) -> u64 {
    xxh3_64(canonical_bytes)
}

/// Pluggable element-identity hash strategy.
///
/// Implementations must be deterministic: the same (type, ordinal) pair must
/// hash identically on the producer that writes a blob and on any process
/// that restores from it.
pub trait HashCodeFinder: Send + Sync {
    /// Hash for the record of `type_name` at `ordinal`.
    ///
    /// The default strategy is the ordinal value itself.
    fn hash_ordinal(&self, type_name: &str, ordinal: Ordinal) -> u64 {
        let _ = type_name;
        u64::from(ordinal.value())
    }

    /// Names of the types this finder hashes with a non-default strategy.
    ///
    /// Recorded in the blob header so consumers and restored producers agree
    /// on element ordering.
    fn defined_hash_code_types(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// The default strategy: a record's hash is its ordinal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashCodeFinder;

impl HashCodeFinder for DefaultHashCodeFinder {}
