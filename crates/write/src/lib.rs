//! Write-side state engine for shoal.
//!
//! A producer registers one type-state per dataset type, then cycles:
//!
//! 1. `add` every record of the dataset (concurrently if desired)
//! 2. `prepare_for_write` — compile columnar payloads
//! 3. emit a snapshot and/or delta blob through [`BlobWriter`]
//! 4. `prepare_for_next_cycle` — rotate populations and advance the tag
//!
//! Records that reappear across cycles keep their ordinals, so deltas stay
//! minimal. A restarted producer can resume an existing delta chain with
//! [`WriteStateEngine::restore_from`].
//!
//! ## Quick start
//!
//! ```no_run
//! use shoal_types::{FieldType, FieldValue, ObjectField, ObjectRecord, ObjectSchema, Schema};
//! use shoal_write::{BlobWriter, WriteStateEngine};
//! use std::sync::Arc;
//!
//! let schema = ObjectSchema::new("Movie", vec![ObjectField::new("title", FieldType::String)]);
//! let mut engine = WriteStateEngine::with_schemas([Schema::Object(schema.clone())])?;
//!
//! let mut record = ObjectRecord::new(Arc::new(schema));
//! record.set("title", FieldValue::String("Interstellar".into()))?;
//! engine.add("Movie", record.into())?;
//!
//! engine.prepare_for_write()?;
//! let mut blob = Vec::new();
//! BlobWriter::new(&engine).write_snapshot(&mut blob)?;
//! engine.prepare_for_next_cycle()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod engine;
pub mod error;
mod parallel;
mod payload;
pub mod type_state;

pub use blob::BlobWriter;
pub use engine::WriteStateEngine;
pub use error::{Result, WriteError};
pub use type_state::TypeWriteState;
