//! Read-side state for map types.
//!
//! A map record is a collection of (key ordinal, value ordinal) entries.
//! The producer writes entries ordered by (key hash, key ordinal) for
//! stable iteration.

use std::io::{Cursor, Read};

use shoal_types::error::Result;
use shoal_types::record::read_map_entries;
use shoal_types::{MapSchema, Ordinal};

use crate::bitset::OrdinalBitSet;
use crate::listener::TypeStateListener;
use crate::payload::{expect_consumed, read_stream, skip_stream, PayloadHeader};
use crate::recycler::MemoryRecycler;

/// Materialization of one map type.
pub struct MapTypeReadState {
    schema: MapSchema,
    entries: Vec<Vec<(Ordinal, Ordinal)>>,
    populated: OrdinalBitSet,
    previous_populated: OrdinalBitSet,
    max_ordinal_plus_one: u32,
    listeners: Vec<Box<dyn TypeStateListener>>,
}

impl MapTypeReadState {
    /// Creates an empty state.
    pub fn new(schema: MapSchema) -> Self {
        Self {
            schema,
            entries: Vec::new(),
            populated: OrdinalBitSet::new(),
            previous_populated: OrdinalBitSet::new(),
            max_ordinal_plus_one: 0,
            listeners: Vec::new(),
        }
    }

    /// The map schema.
    pub fn schema(&self) -> &MapSchema {
        &self.schema
    }

    /// Returns true if a record lives at the ordinal.
    pub fn is_populated(&self, ordinal: Ordinal) -> bool {
        self.populated.contains(ordinal)
    }

    /// Currently live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// Live ordinals before the most recent load.
    pub fn previous_populated_ordinals(&self) -> &OrdinalBitSet {
        &self.previous_populated
    }

    /// Max ordinal + 1 of the current state.
    pub fn max_ordinal_plus_one(&self) -> u32 {
        self.max_ordinal_plus_one
    }

    /// Entries of the map at the ordinal, in stable hash order.
    pub fn map_entries(&self, ordinal: Ordinal) -> Option<&[(Ordinal, Ordinal)]> {
        if !self.populated.contains(ordinal) {
            return None;
        }
        self.entries.get(ordinal.value() as usize).map(Vec::as_slice)
    }

    /// Value ordinal stored under the key ordinal, if present.
    pub fn value_for_key(&self, ordinal: Ordinal, key: Ordinal) -> Option<Ordinal> {
        self.map_entries(ordinal)?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Registers a listener.
    pub fn add_listener(&mut self, listener: Box<dyn TypeStateListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn notify_begin_update(&mut self) {
        for listener in &mut self.listeners {
            listener.begin_update();
        }
    }

    pub(crate) fn notify_end_update(&mut self) {
        for listener in &mut self.listeners {
            listener.end_update();
        }
    }

    pub(crate) fn after_initialization(&mut self) {
        self.entries.shrink_to_fit();
    }

    /// Fully replaces this state's contents from a snapshot payload.
    pub fn read_snapshot<R: Read>(&mut self, r: &mut R, recycler: &mut MemoryRecycler) -> Result<()> {
        let header = PayloadHeader::read_from(r)?;
        self.populated.clear_all();
        self.previous_populated.clear_all();
        self.entries.clear();
        self.entries.resize(header.max_ordinal_plus_one as usize, Vec::new());
        self.decode_content(r, recycler, &header.additions)?;
        for &ordinal in &header.additions {
            self.populated.set(ordinal);
            for listener in &mut self.listeners {
                listener.ordinal_added(ordinal);
            }
        }
        self.max_ordinal_plus_one = header.max_ordinal_plus_one;
        Ok(())
    }

    /// Mutates this state toward the next published state.
    pub fn apply_delta<R: Read>(&mut self, r: &mut R, recycler: &mut MemoryRecycler) -> Result<()> {
        let header = PayloadHeader::read_from(r)?;
        self.previous_populated = self.populated.clone();

        let new_max = header.max_ordinal_plus_one as usize;
        let working_max = new_max.max(self.max_ordinal_plus_one as usize);
        self.entries.resize(working_max, Vec::new());

        for &ordinal in &header.removals {
            self.populated.clear(ordinal);
            if let Some(slot) = self.entries.get_mut(ordinal.value() as usize) {
                *slot = Vec::new();
            }
            for listener in &mut self.listeners {
                listener.ordinal_removed(ordinal);
            }
        }

        self.decode_content(r, recycler, &header.additions)?;
        for &ordinal in &header.additions {
            self.populated.set(ordinal);
            for listener in &mut self.listeners {
                listener.ordinal_added(ordinal);
            }
        }

        self.entries.truncate(new_max);
        self.max_ordinal_plus_one = header.max_ordinal_plus_one;
        Ok(())
    }

    fn decode_content<R: Read>(
        &mut self,
        r: &mut R,
        recycler: &mut MemoryRecycler,
        additions: &[Ordinal],
    ) -> Result<()> {
        let buf = read_stream(r, recycler)?;
        let mut cursor = Cursor::new(buf);
        for &ordinal in additions {
            self.entries[ordinal.value() as usize] = read_map_entries(&mut cursor)?;
        }
        expect_consumed(&cursor)?;
        recycler.recycle_buffer(cursor.into_inner());
        Ok(())
    }

    /// Re-encodes the record at the ordinal into its canonical bytes.
    pub fn canonical_record_bytes(&self, ordinal: Ordinal) -> Option<Vec<u8>> {
        if !self.populated.contains(ordinal) {
            return None;
        }
        let entries = self.entries.get(ordinal.value() as usize)?;
        shoal_types::record::encode_map_entries(entries).ok()
    }

    /// Drains a snapshot payload for a filtered-out map type.
    pub fn discard_snapshot<R: Read>(r: &mut R) -> Result<()> {
        Self::discard_payload(r)
    }

    /// Drains a delta payload for a type this engine does not materialize.
    pub fn discard_delta<R: Read>(r: &mut R) -> Result<()> {
        Self::discard_payload(r)
    }

    fn discard_payload<R: Read>(r: &mut R) -> Result<()> {
        PayloadHeader::read_from(r)?;
        skip_stream(r)
    }
}

impl std::fmt::Debug for MapTypeReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTypeReadState")
            .field("type", &self.schema.name)
            .field("populated", &self.populated.count())
            .finish()
    }
}
