//! Read-side state for object types.
//!
//! Storage is columnar: one `Vec<FieldValue>` per materialized field,
//! indexed by ordinal. The state carries two schemas: the filtered schema
//! (the fields it materializes) and the unfiltered wire schema. Excluded
//! fields are skipped stream-by-stream, so filtering never disturbs wire
//! positions.

use std::io::{Cursor, Read};

use shoal_types::error::Result;
use shoal_types::record::{read_cell, write_cell};
use shoal_types::{FieldType, FieldValue, ObjectSchema, Ordinal};

use crate::bitset::OrdinalBitSet;
use crate::listener::TypeStateListener;
use crate::payload::{expect_consumed, read_stream, skip_stream, PayloadHeader};
use crate::recycler::MemoryRecycler;

/// Columnar, possibly field-filtered, materialization of one object type.
pub struct ObjectTypeReadState {
    schema: ObjectSchema,
    unfiltered_schema: ObjectSchema,
    columns: Vec<Vec<FieldValue>>,
    populated: OrdinalBitSet,
    previous_populated: OrdinalBitSet,
    max_ordinal_plus_one: u32,
    reference_targets: Vec<Option<usize>>,
    listeners: Vec<Box<dyn TypeStateListener>>,
}

impl ObjectTypeReadState {
    /// Creates an empty state materializing `schema`, decoding payloads laid
    /// out per `unfiltered_schema`.
    pub fn new(schema: ObjectSchema, unfiltered_schema: ObjectSchema) -> Self {
        let column_count = schema.fields.len();
        Self {
            reference_targets: vec![None; column_count],
            columns: vec![Vec::new(); column_count],
            schema,
            unfiltered_schema,
            populated: OrdinalBitSet::new(),
            previous_populated: OrdinalBitSet::new(),
            max_ordinal_plus_one: 0,
            listeners: Vec::new(),
        }
    }

    /// The schema this state materializes (filtered fields only).
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// The full wire schema the producer published.
    pub fn unfiltered_schema(&self) -> &ObjectSchema {
        &self.unfiltered_schema
    }

    /// Returns true if any field is excluded from materialization.
    pub fn is_filtered(&self) -> bool {
        self.schema.fields.len() != self.unfiltered_schema.fields.len()
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

    /// Value of the named field at the ordinal.
    ///
    /// Returns `None` for unpopulated ordinals and for fields excluded by
    /// the filter.
    pub fn field_value(&self, ordinal: Ordinal, field_name: &str) -> Option<&FieldValue> {
        if !self.populated.contains(ordinal) {
            return None;
        }
        let column = self.schema.field_index(field_name)?;
        self.columns[column].get(ordinal.value() as usize)
    }

    /// Engine index of the type-state a reference field points at.
    ///
    /// Populated by the engine's schema wiring after a snapshot load.
    pub fn reference_target(&self, field_index: usize) -> Option<usize> {
        self.reference_targets.get(field_index).copied().flatten()
    }

    /// Registers a listener.
    pub fn add_listener(&mut self, listener: Box<dyn TypeStateListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn wire_references(&mut self, resolve: impl Fn(&str) -> Option<usize>) {
        for (index, field) in self.schema.fields.iter().enumerate() {
            if let FieldType::Reference { referenced_type } = &field.field_type {
                self.reference_targets[index] = resolve(referenced_type);
            }
        }
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
        for column in &mut self.columns {
            column.shrink_to_fit();
        }
    }

    /// Fully replaces this state's contents from a snapshot payload.
    pub fn read_snapshot<R: Read>(&mut self, r: &mut R, recycler: &mut MemoryRecycler) -> Result<()> {
        let header = PayloadHeader::read_from(r)?;
        self.populated.clear_all();
        self.previous_populated.clear_all();
        let max = header.max_ordinal_plus_one as usize;
        for column in &mut self.columns {
            column.clear();
            column.resize(max, FieldValue::Null);
        }
        let wire_fields = self.unfiltered_schema.fields.clone();
        self.decode_content(r, recycler, &wire_fields, &header.additions)?;
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
    pub fn apply_delta<R: Read>(
        &mut self,
        r: &mut R,
        wire_schema: &ObjectSchema,
        recycler: &mut MemoryRecycler,
    ) -> Result<()> {
        let header = PayloadHeader::read_from(r)?;
        self.previous_populated = self.populated.clone();

        let new_max = header.max_ordinal_plus_one as usize;
        let working_max = new_max.max(self.max_ordinal_plus_one as usize);
        for column in &mut self.columns {
            column.resize(working_max, FieldValue::Null);
        }

        for &ordinal in &header.removals {
            self.populated.clear(ordinal);
            let index = ordinal.value() as usize;
            for column in &mut self.columns {
                if let Some(cell) = column.get_mut(index) {
                    match std::mem::replace(cell, FieldValue::Null) {
                        FieldValue::String(s) => recycler.recycle_buffer(s.into_bytes()),
                        FieldValue::Bytes(b) => recycler.recycle_buffer(b),
                        _ => {}
                    }
                }
            }
            for listener in &mut self.listeners {
                listener.ordinal_removed(ordinal);
            }
        }

        self.decode_content(r, recycler, &wire_schema.fields, &header.additions)?;
        for &ordinal in &header.additions {
            self.populated.set(ordinal);
            for listener in &mut self.listeners {
                listener.ordinal_added(ordinal);
            }
        }

        for column in &mut self.columns {
            column.truncate(new_max);
        }
        self.max_ordinal_plus_one = header.max_ordinal_plus_one;
        Ok(())
    }

    fn decode_content<R: Read>(
        &mut self,
        r: &mut R,
        recycler: &mut MemoryRecycler,
        wire_fields: &[shoal_types::ObjectField],
        additions: &[Ordinal],
    ) -> Result<()> {
        for field in wire_fields {
            match self.schema.field_index(&field.name) {
                Some(column) => {
                    let buf = read_stream(r, recycler)?;
                    let mut cursor = Cursor::new(buf);
                    for &ordinal in additions {
                        let value = read_cell(&mut cursor, &field.field_type)?;
                        self.columns[column][ordinal.value() as usize] = value;
                    }
                    expect_consumed(&cursor)?;
                    recycler.recycle_buffer(cursor.into_inner());
                }
                None => skip_stream(r)?,
            }
        }
        Ok(())
    }

    /// Re-encodes the record at the ordinal into its canonical bytes.
    ///
    /// Only possible for unfiltered states; a filtered state has lost wire
    /// bytes and returns `None`, as it does for unpopulated ordinals.
    pub fn canonical_record_bytes(&self, ordinal: Ordinal) -> Option<Vec<u8>> {
        if self.is_filtered() || !self.populated.contains(ordinal) {
            return None;
        }
        let index = ordinal.value() as usize;
        let mut buf = Vec::new();
        for column in &self.columns {
            write_cell(&mut buf, &column[index]).ok()?;
        }
        Some(buf)
    }

    /// Drains a snapshot payload for a filtered-out object type.
    pub fn discard_snapshot<R: Read>(r: &mut R, schema: &ObjectSchema) -> Result<()> {
        Self::discard_payload(r, schema)
    }

    /// Drains a delta payload for a type this engine does not materialize.
    pub fn discard_delta<R: Read>(r: &mut R, schema: &ObjectSchema) -> Result<()> {
        Self::discard_payload(r, schema)
    }

    fn discard_payload<R: Read>(r: &mut R, schema: &ObjectSchema) -> Result<()> {
        PayloadHeader::read_from(r)?;
        for _ in 0..schema.fields.len() {
            skip_stream(r)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectTypeReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTypeReadState")
            .field("type", &self.schema.name)
            .field("populated", &self.populated.count())
            .field("max_ordinal_plus_one", &self.max_ordinal_plus_one)
            .field("filtered", &self.is_filtered())
            .finish()
    }
}
