//! Shared payload-decoding scaffolding for the four type-state variants.
//!
//! Every per-type payload opens the same way:
//!
//! ```text
//! varint(maxOrdinalPlusOne) | ordset(removals) | ordset(additions) | content
//! ```
//!
//! Content is one or more length-prefixed streams. Streams are buffered
//! through the memory recycler and parsed from the buffer, so a type's
//! transient decode allocations are reused by the next type.

use std::io::Read;

use shoal_types::error::Result;
use shoal_types::varint::{read_ordinal_set, read_varint_u32, read_varint_u64, skip_bytes};
use shoal_types::{CodecError, Ordinal};

use crate::recycler::MemoryRecycler;

/// The fixed opening of every per-type payload.
#[derive(Debug)]
pub(crate) struct PayloadHeader {
    /// Declared max ordinal + 1 after this payload applies.
    pub max_ordinal_plus_one: u32,
    /// Ordinals removed by this payload, ascending. Empty in snapshots.
    pub removals: Vec<Ordinal>,
    /// Ordinals added by this payload, ascending.
    pub additions: Vec<Ordinal>,
}

impl PayloadHeader {
    pub(crate) fn read_from<R: Read>(r: &mut R) -> Result<PayloadHeader> {
        let max_ordinal_plus_one = read_varint_u32(r)?;
        let removals = read_ordinal_set(r)?;
        let additions = read_ordinal_set(r)?;
        // Removals refer to the pre-apply state and may exceed a shrinking
        // max; additions must land inside the declared range.
        for ordinal in &additions {
            if ordinal.value() >= max_ordinal_plus_one {
                return Err(CodecError::OrdinalOutOfRange {
                    ordinal: ordinal.value(),
                    max: max_ordinal_plus_one,
                });
            }
        }
        Ok(PayloadHeader { max_ordinal_plus_one, removals, additions })
    }
}

/// Reads one length-prefixed stream into a recycled buffer.
pub(crate) fn read_stream<R: Read>(r: &mut R, recycler: &mut MemoryRecycler) -> Result<Vec<u8>> {
    let len = read_varint_u64(r)?;
    // Cap the upfront reservation; a corrupt length must fail on read,
    // not on allocation.
    let mut buf = recycler.claim_buffer(len.min(64 * 1024) as usize);
    let read = r.by_ref().take(len).read_to_end(&mut buf)?;
    if (read as u64) < len {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf)
}

/// Drains one length-prefixed stream without materializing it.
pub(crate) fn skip_stream<R: Read>(r: &mut R) -> Result<()> {
    let len = read_varint_u64(r)?;
    skip_bytes(r, len)
}

/// Fails unless a stream buffer was consumed exactly to its end.
pub(crate) fn expect_consumed(cursor: &std::io::Cursor<Vec<u8>>) -> Result<()> {
    let len = cursor.get_ref().len() as u64;
    if cursor.position() != len {
        return Err(CodecError::TruncatedStream { expected: len, actual: cursor.position() });
    }
    Ok(())
}
