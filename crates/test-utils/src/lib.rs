//! Test utilities shared across shoal engine crates.
//!
//! Builders produce small well-formed schemas and records, assertions
//! compare read-side state against expected populations, and strategies
//! generate randomized record batches for property tests. Dev-dependency
//! only; nothing here ships in release artifacts.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod assertions;
pub mod builders;
pub mod strategies;

pub use assertions::{assert_int_field, assert_populated_ordinals};
pub use builders::{int_record, single_int_schema, RecordingListener, SharedEvents};
