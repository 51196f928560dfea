//! Core types for the shoal state engine.
//!
//! This crate provides the foundation shared by the write-side and read-side
//! engines:
//! - Identifier newtypes ([`Ordinal`], [`RandomizedTag`])
//! - The schema model (object / list / set / map) and its wire codec
//! - The record model and its canonical binary encoding
//! - VarInt stream primitives used throughout the blob format
//! - The blob header codec
//! - The pluggable hash-code finder capability
//! - Codec error types using snafu

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod header;
pub mod record;
pub mod schema;
pub mod types;
pub mod varint;

// Re-export commonly used types at crate root
pub use error::{CodecError, Result};
pub use hash::{record_hash, DefaultHashCodeFinder, HashCodeFinder, DEFINED_HASH_CODES_HEADER_TAG};
pub use header::{BlobHeader, BLOB_FORMAT_VERSION, BLOB_LEGACY_FORMAT_VERSION, BLOB_MAGIC};
pub use record::{
    FieldValue, ListRecord, MapRecord, ObjectRecord, RecordError, SetRecord, WriteRecord,
};
pub use schema::{
    FieldType, ListSchema, MapSchema, ObjectField, ObjectSchema, PrimaryKey, Schema, SetSchema,
};
pub use types::{Ordinal, RandomizedTag, EMPTY_ORDINAL};
