//! Blob writer: emits snapshot, delta, and reverse delta blobs.
//!
//! Framing mirrors the reader exactly: header, varint count of type
//! sub-blobs, then per registered type its schema, forward-compatibility
//! pad length (zero for current producers), and the compiled payload.
//! Types appear in registration order.

use std::collections::BTreeSet;
use std::io::Write;
use std::time::Instant;

use tracing::info;

use shoal_types::varint::{write_varint_u32, write_varint_u64};
use shoal_types::{BlobHeader, RandomizedTag};

use crate::engine::WriteStateEngine;
use crate::error::{Result, WriteError};
use crate::payload::CompiledPayload;
use crate::type_state::TypeWriteState;

/// Emits blobs from a prepared [`WriteStateEngine`].
pub struct BlobWriter<'a> {
    engine: &'a WriteStateEngine,
}

impl<'a> BlobWriter<'a> {
    /// Creates a writer over the engine.
    pub fn new(engine: &'a WriteStateEngine) -> Self {
        Self { engine }
    }

    /// Writes a snapshot blob: the complete current population.
    pub fn write_snapshot<W: Write>(&self, w: &mut W) -> Result<()> {
        self.write_blob(
            w,
            "snapshot",
            self.engine.previous_randomized_tag(),
            self.engine.next_randomized_tag(),
            TypeWriteState::compiled_snapshot,
        )
    }

    /// Writes a delta blob transforming the previous state into the
    /// current one.
    pub fn write_delta<W: Write>(&self, w: &mut W) -> Result<()> {
        self.write_blob(
            w,
            "delta",
            self.engine.previous_randomized_tag(),
            self.engine.next_randomized_tag(),
            TypeWriteState::compiled_delta,
        )
    }

    /// Writes a reverse delta blob transforming the current state back
    /// into the previous one.
    pub fn write_reverse_delta<W: Write>(&self, w: &mut W) -> Result<()> {
        self.write_blob(
            w,
            "reverse delta",
            self.engine.next_randomized_tag(),
            self.engine.previous_randomized_tag(),
            TypeWriteState::compiled_reverse_delta,
        )
    }

    fn write_blob<W: Write>(
        &self,
        w: &mut W,
        kind: &'static str,
        origin: RandomizedTag,
        destination: RandomizedTag,
        payload_of: impl Fn(&TypeWriteState) -> Result<&CompiledPayload>,
    ) -> Result<()> {
        if self.engine.is_prepared_for_next_cycle() {
            return Err(WriteError::PhaseViolation { operation: "write blob" });
        }
        let start = Instant::now();

        let header = BlobHeader::new(origin, destination, self.engine.header_tags());
        header.write_to(w)?;

        let type_states = self.engine.ordered_type_states();
        write_varint_u32(w, type_states.len() as u32)?;

        let mut type_names = BTreeSet::new();
        for type_state in type_states {
            type_names.insert(type_state.type_name().to_string());
            type_state.schema().write_to(w)?;
            // Forward-compatibility padding; current producers have none.
            write_varint_u64(w, 0)?;
            payload_of(type_state)?.write_to(w)?;
        }

        info!(
            kind,
            elapsed_ms = start.elapsed().as_millis() as u64,
            types = %type_names.into_iter().collect::<Vec<_>>().join(","),
            "blob written"
        );
        Ok(())
    }
}
