//! Compiled per-type payloads.
//!
//! `prepare_for_write` reduces each type-state's populations to three
//! payloads sharing one wire shape:
//!
//! ```text
//! varint(maxOrdinalPlusOne) | ordset(removals) | ordset(additions)
//!                           | streams (length-prefixed)
//! ```
//!
//! - snapshot: no removals, additions = the whole current population
//! - delta: current minus previous / previous minus current
//! - reverse delta: the delta mirrored, content drawn from the previous
//!   population
//!
//! Object content is columnar: one stream per unfiltered schema field,
//! holding the cells of the added ordinals in ascending order. Collection
//! content is a single stream of per-record element runs.

use std::io::Write;

use shoal_types::error::Result;
use shoal_types::varint::{write_ordinal_set, write_varint_u32, write_varint_u64};
use shoal_types::Ordinal;

/// One compiled payload, ready for the blob writer.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledPayload {
    /// Max ordinal + 1 after this payload applies.
    pub max_ordinal_plus_one: u32,
    /// Ordinals removed, ascending.
    pub removals: Vec<Ordinal>,
    /// Ordinals added, ascending.
    pub additions: Vec<Ordinal>,
    /// Content streams: one per object field, or a single one for
    /// collection types.
    pub streams: Vec<Vec<u8>>,
}

impl CompiledPayload {
    /// Serializes the payload.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write_varint_u32(w, self.max_ordinal_plus_one)?;
        write_ordinal_set(w, &self.removals)?;
        write_ordinal_set(w, &self.additions)?;
        for stream in &self.streams {
            write_varint_u64(w, stream.len() as u64)?;
            w.write_all(stream)?;
        }
        Ok(())
    }
}

/// The three payloads compiled at a cycle's write boundary.
#[derive(Debug, Clone)]
pub(crate) struct CompiledCycle {
    pub snapshot: CompiledPayload,
    pub delta: CompiledPayload,
    pub reverse_delta: CompiledPayload,
}
