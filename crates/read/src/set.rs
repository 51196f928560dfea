//! Read-side state for set types.
//!
//! A set record is an unordered collection of element ordinals. The
//! producer writes elements ordered by (element hash, ordinal), so the
//! stored order is stable across cycles and identical for every consumer.

use std::io::{Cursor, Read};

use shoal_types::error::Result;
use shoal_types::record::read_collection_elements;
use shoal_types::{Ordinal, SetSchema};

use crate::bitset::OrdinalBitSet;
use crate::listener::TypeStateListener;
use crate::payload::{expect_consumed, read_stream, skip_stream, PayloadHeader};
use crate::recycler::MemoryRecycler;

/// Materialization of one set type.
pub struct SetTypeReadState {
    schema: SetSchema,
    elements: Vec<Vec<Ordinal>>,
    populated: OrdinalBitSet,
    previous_populated: OrdinalBitSet,
    max_ordinal_plus_one: u32,
    listeners: Vec<Box<dyn TypeStateListener>>,
}

impl SetTypeReadState {
    /// Creates an empty state.
    pub fn new(schema: SetSchema) -> Self {
        Self {
            schema,
            elements: Vec::new(),
            populated: OrdinalBitSet::new(),
            previous_populated: OrdinalBitSet::new(),
            max_ordinal_plus_one: 0,
            listeners: Vec::new(),
        }
    }

    /// The set schema.
    pub fn schema(&self) -> &SetSchema {
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

    /// Element ordinals of the set at the ordinal, in stable hash order.
    pub fn element_ordinals(&self, ordinal: Ordinal) -> Option<&[Ordinal]> {
        if !self.populated.contains(ordinal) {
            return None;
        }
        self.elements.get(ordinal.value() as usize).map(Vec::as_slice)
    }

    /// Returns true if the set at `ordinal` contains `element`.
    pub fn contains_element(&self, ordinal: Ordinal, element: Ordinal) -> bool {
        self.element_ordinals(ordinal)
            .map(|elements| elements.contains(&element))
            .unwrap_or(false)
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
        self.elements.shrink_to_fit();
    }

    /// Fully replaces this state's contents from a snapshot payload.
    pub fn read_snapshot<R: Read>(&mut self, r: &mut R, recycler: &mut MemoryRecycler) -> Result<()> {
        let header = PayloadHeader::read_from(r)?;
        self.populated.clear_all();
        self.previous_populated.clear_all();
        self.elements.clear();
        self.elements.resize(header.max_ordinal_plus_one as usize, Vec::new());
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
        self.elements.resize(working_max, Vec::new());

        for &ordinal in &header.removals {
            self.populated.clear(ordinal);
            if let Some(slot) = self.elements.get_mut(ordinal.value() as usize) {
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

        self.elements.truncate(new_max);
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
            self.elements[ordinal.value() as usize] = read_collection_elements(&mut cursor)?;
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
        let elements = self.elements.get(ordinal.value() as usize)?;
        shoal_types::record::encode_collection_elements(elements).ok()
    }

    /// Drains a snapshot payload for a filtered-out set type.
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

impl std::fmt::Debug for SetTypeReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetTypeReadState")
            .field("type", &self.schema.name)
            .field("populated", &self.populated.count())
            .finish()
    }
}
