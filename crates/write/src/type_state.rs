//! Per-type write state: record accumulation and payload compilation.
//!
//! Each type-state keeps two populations of canonical record bytes keyed by
//! ordinal: the current cycle's and the previous cycle's. Ordinal
//! assignment is content-addressed — a record identical to one from the
//! previous cycle reclaims its previous ordinal, duplicates within a cycle
//! collapse to one ordinal, and genuinely new records take the lowest
//! ordinal not held by either population. Deltas then fall out as plain
//! set differences between the two populations.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::Arc;

use parking_lot::Mutex;

use shoal_types::record::{
    copy_cell, encode_collection_elements, encode_map_entries, encode_object_record,
};
use shoal_types::{
    record_hash, DefaultHashCodeFinder, HashCodeFinder, ObjectSchema, Ordinal, Schema, WriteRecord,
};

use shoal_read::TypeReadState;

use crate::error::{Result, WriteError};
use crate::payload::{CompiledCycle, CompiledPayload};

/// One record's canonical bytes and content hash.
#[derive(Debug, Clone)]
struct RecordEntry {
    hash: u64,
    bytes: Arc<[u8]>,
}

/// A cycle's population: ordinal-keyed records plus a content-addressed
/// dedup index.
#[derive(Debug, Default)]
struct Population {
    by_ordinal: BTreeMap<Ordinal, RecordEntry>,
    dedup: HashMap<u64, Vec<Ordinal>>,
    next_probe: u32,
}

impl Population {
    fn find(&self, hash: u64, bytes: &[u8]) -> Option<Ordinal> {
        let candidates = self.dedup.get(&hash)?;
        candidates
            .iter()
            .copied()
            .find(|&ordinal| self.by_ordinal[&ordinal].bytes.as_ref() == bytes)
    }

    fn insert(&mut self, ordinal: Ordinal, entry: RecordEntry) {
        self.dedup.entry(entry.hash).or_default().push(ordinal);
        self.by_ordinal.insert(ordinal, entry);
    }

    fn contains_ordinal(&self, ordinal: Ordinal) -> bool {
        self.by_ordinal.contains_key(&ordinal)
    }

    /// Lowest ordinal unused by both this population and `other`.
    fn allocate(&mut self, other: &Population) -> Ordinal {
        loop {
            let candidate = Ordinal::new(self.next_probe);
            self.next_probe += 1;
            if !self.contains_ordinal(candidate) && !other.contains_ordinal(candidate) {
                return candidate;
            }
        }
    }

    fn max_ordinal_plus_one(&self) -> u32 {
        self.by_ordinal.keys().next_back().map(|o| o.value() + 1).unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.by_ordinal.len()
    }
}

/// Write-side state for one dataset type.
pub struct TypeWriteState {
    schema: Schema,
    hash_code_finder: Arc<dyn HashCodeFinder>,
    current: Mutex<Population>,
    previous: Population,
    restored: bool,
    compiled: Option<CompiledCycle>,
}

impl TypeWriteState {
    /// Creates an empty type-state for the schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            hash_code_finder: Arc::new(DefaultHashCodeFinder),
            current: Mutex::new(Population::default()),
            previous: Population::default(),
            restored: false,
            compiled: None,
        }
    }

    /// The type's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The type name.
    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    /// Number of records in the current cycle.
    pub fn current_population_count(&self) -> usize {
        self.current.lock().len()
    }

    /// Number of records in the previous cycle.
    pub fn previous_population_count(&self) -> usize {
        self.previous.len()
    }

    /// Whether a restore bound all prior ordinals for this type.
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub(crate) fn bind_hash_code_finder(&mut self, finder: Arc<dyn HashCodeFinder>) {
        self.hash_code_finder = finder;
    }

    /// Adds a record, returning its ordinal.
    ///
    /// Safe to call concurrently from many threads during the
    /// adding-records phase. Duplicate records collapse to one ordinal;
    /// records also present in the previous cycle keep their ordinal.
    pub fn add(&self, record: WriteRecord) -> Result<Ordinal> {
        let bytes = self.canonical_bytes(record)?;
        let hash = record_hash(&bytes);
        let bytes: Arc<[u8]> = bytes.into();

        let mut current = self.current.lock();
        if let Some(ordinal) = current.find(hash, &bytes) {
            return Ok(ordinal);
        }
        if let Some(ordinal) = self.previous.find(hash, &bytes) {
            // Dropped back in unchanged: keep last cycle's ordinal so the
            // delta carries neither a removal nor an addition for it.
            current.insert(ordinal, self.previous.by_ordinal[&ordinal].clone());
            return Ok(ordinal);
        }
        let ordinal = current.allocate(&self.previous);
        current.insert(ordinal, RecordEntry { hash, bytes });
        Ok(ordinal)
    }

    fn canonical_bytes(&self, record: WriteRecord) -> Result<Vec<u8>> {
        let bytes = match (&self.schema, record) {
            (Schema::Object(schema), WriteRecord::Object(record)) => {
                if record.schema() != schema {
                    return Err(self.schema_mismatch());
                }
                encode_object_record(&record)?
            }
            (Schema::List(_), WriteRecord::List(record)) => {
                encode_collection_elements(&record.elements)?
            }
            (Schema::Set(schema), WriteRecord::Set(record)) => {
                let finder = &self.hash_code_finder;
                let mut elements = record.elements;
                elements.sort_by_key(|&element| {
                    (finder.hash_ordinal(&schema.element_type, element), element.value())
                });
                elements.dedup();
                encode_collection_elements(&elements)?
            }
            (Schema::Map(schema), WriteRecord::Map(record)) => {
                let finder = &self.hash_code_finder;
                let mut entries = record.entries;
                entries.sort_by_key(|&(key, _)| {
                    (finder.hash_ordinal(&schema.key_type, key), key.value())
                });
                entries.dedup_by(|a, b| a.0 == b.0);
                encode_map_entries(&entries)?
            }
            _ => return Err(self.schema_mismatch()),
        };
        Ok(bytes)
    }

    fn schema_mismatch(&self) -> WriteError {
        WriteError::SchemaMismatch { type_name: self.schema.name().to_string() }
    }

    /// Compiles the accumulated records into snapshot, delta, and reverse
    /// delta payloads.
    pub(crate) fn prepare_for_write(&mut self) -> Result<()> {
        let compiled = {
            let current = self.current.lock();

            let all_current: Vec<Ordinal> = current.by_ordinal.keys().copied().collect();
            let additions: Vec<Ordinal> = current
                .by_ordinal
                .keys()
                .filter(|o| !self.previous.contains_ordinal(**o))
                .copied()
                .collect();
            let removals: Vec<Ordinal> = self
                .previous
                .by_ordinal
                .keys()
                .filter(|o| !current.contains_ordinal(**o))
                .copied()
                .collect();

            let current_max = current.max_ordinal_plus_one();
            let previous_max = self.previous.max_ordinal_plus_one();

            let snapshot = CompiledPayload {
                max_ordinal_plus_one: current_max,
                removals: Vec::new(),
                additions: all_current.clone(),
                streams: build_streams(&self.schema, &all_current, &current)?,
            };
            let delta = CompiledPayload {
                max_ordinal_plus_one: current_max,
                removals: removals.clone(),
                additions: additions.clone(),
                streams: build_streams(&self.schema, &additions, &current)?,
            };
            let reverse_delta = CompiledPayload {
                max_ordinal_plus_one: previous_max,
                removals: additions,
                additions: removals.clone(),
                streams: build_streams(&self.schema, &removals, &self.previous)?,
            };

            CompiledCycle { snapshot, delta, reverse_delta }
        };

        self.compiled = Some(compiled);
        Ok(())
    }

    pub(crate) fn compiled_snapshot(&self) -> Result<&CompiledPayload> {
        self.compiled().map(|c| &c.snapshot)
    }

    pub(crate) fn compiled_delta(&self) -> Result<&CompiledPayload> {
        self.compiled().map(|c| &c.delta)
    }

    pub(crate) fn compiled_reverse_delta(&self) -> Result<&CompiledPayload> {
        self.compiled().map(|c| &c.reverse_delta)
    }

    fn compiled(&self) -> Result<&CompiledCycle> {
        self.compiled.as_ref().ok_or(WriteError::PhaseViolation { operation: "write blob" })
    }

    /// Rotates the current population into the previous slot.
    pub(crate) fn prepare_for_next_cycle(&mut self) {
        self.previous = std::mem::take(self.current.get_mut());
        self.compiled = None;
    }

    /// Re-adds every record from the previous cycle, keeping ordinals.
    ///
    /// Idempotent; records already re-added this cycle are left alone.
    pub(crate) fn add_all_objects_from_previous_cycle(&mut self) {
        let current = self.current.get_mut();
        for (&ordinal, entry) in &self.previous.by_ordinal {
            if !current.contains_ordinal(ordinal) {
                current.insert(ordinal, entry.clone());
            }
        }
    }

    /// Discards everything added since the last cycle boundary.
    pub(crate) fn reset_to_last_prepare_for_next_cycle(&mut self) {
        *self.current.get_mut() = Population::default();
        self.compiled = None;
    }

    /// Imports the previous-cycle population from a read-side type-state.
    ///
    /// Returns false without binding anything when the read state cannot
    /// reproduce full records (field-filtered) or its schema differs.
    pub(crate) fn restore_from(&mut self, read_state: &TypeReadState) -> bool {
        if read_state.is_filtered() || read_state.wire_schema() != self.schema {
            return false;
        }
        let mut population = Population::default();
        for ordinal in read_state.populated_ordinals().iter() {
            let Some(bytes) = read_state.canonical_record_bytes(ordinal) else {
                return false;
            };
            let hash = record_hash(&bytes);
            population.insert(ordinal, RecordEntry { hash, bytes: bytes.into() });
        }
        self.previous = population;
        self.restored = true;
        true
    }

    /// Whether the current population differs from the previous one.
    ///
    /// Ordinal reuse makes this a pure key comparison: an ordinal present
    /// in both populations always carries identical bytes.
    pub fn has_changed_since_last_cycle(&self) -> bool {
        let current = self.current.lock();
        !current.by_ordinal.keys().eq(self.previous.by_ordinal.keys())
    }
}

fn build_streams(
    schema: &Schema,
    ordinals: &[Ordinal],
    population: &Population,
) -> Result<Vec<Vec<u8>>> {
    match schema {
        Schema::Object(schema) => build_object_streams(schema, ordinals, population),
        _ => {
            let mut stream = Vec::new();
            for ordinal in ordinals {
                stream.extend_from_slice(&population.by_ordinal[ordinal].bytes);
            }
            Ok(vec![stream])
        }
    }
}

fn build_object_streams(
    schema: &ObjectSchema,
    ordinals: &[Ordinal],
    population: &Population,
) -> Result<Vec<Vec<u8>>> {
    let mut streams = vec![Vec::new(); schema.fields.len()];
    for ordinal in ordinals {
        let mut cursor = Cursor::new(population.by_ordinal[ordinal].bytes.as_ref());
        for (index, field) in schema.fields.iter().enumerate() {
            copy_cell(&mut cursor, &mut streams[index], &field.field_type)?;
        }
    }
    Ok(streams)
}

impl std::fmt::Debug for TypeWriteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeWriteState")
            .field("type", &self.schema.name())
            .field("current", &self.current.lock().len())
            .field("previous", &self.previous.len())
            .field("restored", &self.restored)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use shoal_types::{FieldType, FieldValue, ObjectField, ObjectRecord};

    use super::*;

    fn int_schema() -> Schema {
        Schema::Object(ObjectSchema::new("A", vec![ObjectField::new("x", FieldType::Int)]))
    }

    fn int_record(schema: &Schema, x: i32) -> WriteRecord {
        let Schema::Object(object_schema) = schema else { unreachable!() };
        let mut record = ObjectRecord::new(Arc::new(object_schema.clone()));
        record.set("x", FieldValue::Int(x)).unwrap();
        record.into()
    }

    #[test]
    fn test_duplicate_records_collapse() {
        let schema = int_schema();
        let state = TypeWriteState::new(schema.clone());
        let a = state.add(int_record(&schema, 42)).unwrap();
        let b = state.add(int_record(&schema, 42)).unwrap();
        let c = state.add(int_record(&schema, 43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(state.current_population_count(), 2);
    }

    #[test]
    fn test_readded_record_keeps_previous_ordinal() {
        let schema = int_schema();
        let mut state = TypeWriteState::new(schema.clone());
        let first = state.add(int_record(&schema, 42)).unwrap();
        state.prepare_for_write().unwrap();
        state.prepare_for_next_cycle();

        // Add a different record first so a naive allocator would hand out
        // the old ordinal to the wrong record.
        let other = state.add(int_record(&schema, 1)).unwrap();
        let again = state.add(int_record(&schema, 42)).unwrap();
        assert_eq!(again, first);
        assert_ne!(other, first);
    }

    #[test]
    fn test_empty_cycle_produces_empty_delta() {
        let schema = int_schema();
        let mut state = TypeWriteState::new(schema.clone());
        state.add(int_record(&schema, 7)).unwrap();
        state.prepare_for_write().unwrap();
        state.prepare_for_next_cycle();

        state.add_all_objects_from_previous_cycle();
        state.prepare_for_write().unwrap();
        let delta = state.compiled_delta().unwrap();
        assert!(delta.removals.is_empty());
        assert!(delta.additions.is_empty());
        assert!(!state.has_changed_since_last_cycle());
    }

    #[test]
    fn test_reset_discards_current_cycle() {
        let schema = int_schema();
        let mut state = TypeWriteState::new(schema.clone());
        state.add(int_record(&schema, 1)).unwrap();
        state.prepare_for_write().unwrap();
        state.prepare_for_next_cycle();

        state.add(int_record(&schema, 2)).unwrap();
        state.reset_to_last_prepare_for_next_cycle();
        assert_eq!(state.current_population_count(), 0);
        assert_eq!(state.previous_population_count(), 1);
        assert!(state.has_changed_since_last_cycle());
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let state = TypeWriteState::new(int_schema());
        let err = state.add(WriteRecord::List(shoal_types::ListRecord::new())).unwrap_err();
        assert!(matches!(err, WriteError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_set_elements_sorted_and_deduped() {
        let schema = Schema::Set(shoal_types::SetSchema::new("S", "A"));
        let state = TypeWriteState::new(schema);
        let mut forward = shoal_types::SetRecord::new();
        forward.add_element(Ordinal::new(5)).add_element(Ordinal::new(2)).add_element(Ordinal::new(5));
        let mut backward = shoal_types::SetRecord::new();
        backward.add_element(Ordinal::new(2)).add_element(Ordinal::new(5));
        // Insertion order and duplicates must not affect identity
        let a = state.add(forward.into()).unwrap();
        let b = state.add(backward.into()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_concurrent_adds_dedup() {
        let schema = int_schema();
        let state = TypeWriteState::new(schema.clone());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let state = &state;
                let schema = &schema;
                scope.spawn(move || {
                    for x in 0..100 {
                        state.add(int_record(schema, x)).unwrap();
                    }
                });
            }
        });
        assert_eq!(state.current_population_count(), 100);
    }
}
