//! Tagged dispatch over the four read-state variants.
//!
//! The blob reader deals in [`TypeReadState`] values; the per-shape logic
//! lives in the variant modules. All shape dispatch happens in the match
//! arms here rather than being scattered across the reader.

use std::io::Read;

use shoal_types::{Ordinal, Schema};

use crate::bitset::OrdinalBitSet;
use crate::error::{ReadError, Result};
use crate::list::ListTypeReadState;
use crate::listener::TypeStateListener;
use crate::map::MapTypeReadState;
use crate::object::ObjectTypeReadState;
use crate::recycler::MemoryRecycler;
use crate::set::SetTypeReadState;

/// A materialized type-state of any shape.
#[derive(Debug)]
pub enum TypeReadState {
    /// An object type.
    Object(ObjectTypeReadState),
    /// A list type.
    List(ListTypeReadState),
    /// A set type.
    Set(SetTypeReadState),
    /// A map type.
    Map(MapTypeReadState),
}

impl TypeReadState {
    /// The type name this state materializes.
    pub fn type_name(&self) -> &str {
        match self {
            TypeReadState::Object(s) => &s.schema().name,
            TypeReadState::List(s) => &s.schema().name,
            TypeReadState::Set(s) => &s.schema().name,
            TypeReadState::Map(s) => &s.schema().name,
        }
    }

    /// The schema as published on the wire.
    ///
    /// For object states this is the unfiltered schema; a filtered state
    /// cannot reproduce the full wire layout from its materialized fields
    /// alone, so the original is kept.
    pub fn wire_schema(&self) -> Schema {
        match self {
            TypeReadState::Object(s) => Schema::Object(s.unfiltered_schema().clone()),
            TypeReadState::List(s) => Schema::List(s.schema().clone()),
            TypeReadState::Set(s) => Schema::Set(s.schema().clone()),
            TypeReadState::Map(s) => Schema::Map(s.schema().clone()),
        }
    }

    /// Returns true if a record lives at the ordinal.
    pub fn is_populated(&self, ordinal: Ordinal) -> bool {
        self.populated_ordinals().contains(ordinal)
    }

    /// Currently live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        match self {
            TypeReadState::Object(s) => s.populated_ordinals(),
            TypeReadState::List(s) => s.populated_ordinals(),
            TypeReadState::Set(s) => s.populated_ordinals(),
            TypeReadState::Map(s) => s.populated_ordinals(),
        }
    }

    /// Live ordinals before the most recent load.
    pub fn previous_populated_ordinals(&self) -> &OrdinalBitSet {
        match self {
            TypeReadState::Object(s) => s.previous_populated_ordinals(),
            TypeReadState::List(s) => s.previous_populated_ordinals(),
            TypeReadState::Set(s) => s.previous_populated_ordinals(),
            TypeReadState::Map(s) => s.previous_populated_ordinals(),
        }
    }

    /// Returns true if fields of this state were excluded by a filter.
    pub fn is_filtered(&self) -> bool {
        match self {
            TypeReadState::Object(s) => s.is_filtered(),
            _ => false,
        }
    }

    /// The object state, if this is an object type.
    pub fn as_object(&self) -> Option<&ObjectTypeReadState> {
        match self {
            TypeReadState::Object(s) => Some(s),
            _ => None,
        }
    }

    /// The list state, if this is a list type.
    pub fn as_list(&self) -> Option<&ListTypeReadState> {
        match self {
            TypeReadState::List(s) => Some(s),
            _ => None,
        }
    }

    /// The set state, if this is a set type.
    pub fn as_set(&self) -> Option<&SetTypeReadState> {
        match self {
            TypeReadState::Set(s) => Some(s),
            _ => None,
        }
    }

    /// The map state, if this is a map type.
    pub fn as_map(&self) -> Option<&MapTypeReadState> {
        match self {
            TypeReadState::Map(s) => Some(s),
            _ => None,
        }
    }

    /// Registers a listener.
    pub fn add_listener(&mut self, listener: Box<dyn TypeStateListener>) {
        match self {
            TypeReadState::Object(s) => s.add_listener(listener),
            TypeReadState::List(s) => s.add_listener(listener),
            TypeReadState::Set(s) => s.add_listener(listener),
            TypeReadState::Map(s) => s.add_listener(listener),
        }
    }

    /// Re-encodes the record at the ordinal into its canonical bytes.
    ///
    /// Returns `None` for unpopulated ordinals and for field-filtered
    /// object states.
    pub fn canonical_record_bytes(&self, ordinal: Ordinal) -> Option<Vec<u8>> {
        match self {
            TypeReadState::Object(s) => s.canonical_record_bytes(ordinal),
            TypeReadState::List(s) => s.canonical_record_bytes(ordinal),
            TypeReadState::Set(s) => s.canonical_record_bytes(ordinal),
            TypeReadState::Map(s) => s.canonical_record_bytes(ordinal),
        }
    }

    pub(crate) fn read_snapshot<R: Read>(
        &mut self,
        r: &mut R,
        recycler: &mut MemoryRecycler,
    ) -> Result<()> {
        match self {
            TypeReadState::Object(s) => s.read_snapshot(r, recycler)?,
            TypeReadState::List(s) => s.read_snapshot(r, recycler)?,
            TypeReadState::Set(s) => s.read_snapshot(r, recycler)?,
            TypeReadState::Map(s) => s.read_snapshot(r, recycler)?,
        }
        Ok(())
    }

    pub(crate) fn apply_delta<R: Read>(
        &mut self,
        r: &mut R,
        wire_schema: &Schema,
        recycler: &mut MemoryRecycler,
    ) -> Result<()> {
        match (self, wire_schema) {
            (TypeReadState::Object(s), Schema::Object(wire)) => s.apply_delta(r, wire, recycler)?,
            (TypeReadState::List(s), Schema::List(_)) => s.apply_delta(r, recycler)?,
            (TypeReadState::Set(s), Schema::Set(_)) => s.apply_delta(r, recycler)?,
            (TypeReadState::Map(s), Schema::Map(_)) => s.apply_delta(r, recycler)?,
            (state, _) => {
                return Err(ReadError::WireSchemaMismatch {
                    type_name: state.type_name().to_string(),
                })
            }
        }
        Ok(())
    }

    pub(crate) fn notify_begin_update(&mut self) {
        match self {
            TypeReadState::Object(s) => s.notify_begin_update(),
            TypeReadState::List(s) => s.notify_begin_update(),
            TypeReadState::Set(s) => s.notify_begin_update(),
            TypeReadState::Map(s) => s.notify_begin_update(),
        }
    }

    pub(crate) fn notify_end_update(&mut self) {
        match self {
            TypeReadState::Object(s) => s.notify_end_update(),
            TypeReadState::List(s) => s.notify_end_update(),
            TypeReadState::Set(s) => s.notify_end_update(),
            TypeReadState::Map(s) => s.notify_end_update(),
        }
    }

    pub(crate) fn after_initialization(&mut self) {
        match self {
            TypeReadState::Object(s) => s.after_initialization(),
            TypeReadState::List(s) => s.after_initialization(),
            TypeReadState::Set(s) => s.after_initialization(),
            TypeReadState::Map(s) => s.after_initialization(),
        }
    }

    /// Drains one type's snapshot payload without materializing it.
    pub fn discard_snapshot<R: Read>(r: &mut R, schema: &Schema) -> Result<()> {
        match schema {
            Schema::Object(s) => ObjectTypeReadState::discard_snapshot(r, s)?,
            Schema::List(_) => ListTypeReadState::discard_snapshot(r)?,
            Schema::Set(_) => SetTypeReadState::discard_snapshot(r)?,
            Schema::Map(_) => MapTypeReadState::discard_snapshot(r)?,
        }
        Ok(())
    }

    /// Drains one type's delta payload without materializing it.
    pub fn discard_delta<R: Read>(r: &mut R, schema: &Schema) -> Result<()> {
        match schema {
            Schema::Object(s) => ObjectTypeReadState::discard_delta(r, s)?,
            Schema::List(_) => ListTypeReadState::discard_delta(r)?,
            Schema::Set(_) => SetTypeReadState::discard_delta(r)?,
            Schema::Map(_) => MapTypeReadState::discard_delta(r)?,
        }
        Ok(())
    }
}
