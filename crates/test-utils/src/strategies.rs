//! Proptest strategies for shoal engine property tests.
//!
//! Reusable generators for randomized cycle plans. Strategies produce
//! well-formed inputs while exploring edge cases (empty batches, repeated
//! values, shrinking populations) through random variation.
//!
//! # Usage
//!
//! ```no_run
//! use proptest::prelude::*;
//! use shoal_test_utils::strategies;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(cycles in strategies::arb_cycle_plan(4, 24)) {
//!         // drive one engine cycle per batch
//!     }
//! }
//! ```

use proptest::prelude::*;

/// Generates one cycle's record batch: up to `max_len` ints from a small
/// domain so cross-cycle overlap (ordinal reuse) is common.
pub fn arb_int_batch(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(0i32..32, 0..=max_len)
}

/// Generates a multi-cycle plan: `1..=max_cycles` batches of records.
pub fn arb_cycle_plan(
    max_cycles: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Vec<i32>>> {
    proptest::collection::vec(arb_int_batch(max_len), 1..=max_cycles)
}

/// Generates a UTF-8 string value of 0-24 characters.
pub fn arb_string_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,24}"
}
