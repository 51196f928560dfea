//! Delta-chain laws: chained consumers converge with direct snapshots,
//! reverse deltas walk the chain backwards, and resets never leak aborted
//! versions into a chain.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

mod common;

use common::{
    apply_delta, assert_engines_equal, delta_blob, load_snapshot, reverse_delta_blob,
    snapshot_blob,
};
use proptest::prelude::*;
use shoal_test_utils::strategies::arb_cycle_plan;
use shoal_test_utils::{int_record, single_int_schema};
use shoal_types::{ListRecord, ListSchema, MapRecord, MapSchema, Schema, SetRecord, SetSchema};
use shoal_write::WriteStateEngine;

/// A producer over one object type plus list/set/map types over it.
fn mixed_engine() -> (WriteStateEngine, Schema) {
    let value_schema = single_int_schema("Val");
    let engine = WriteStateEngine::with_schemas([
        value_schema.clone(),
        Schema::List(ListSchema::new("ValList", "Val")),
        Schema::Set(SetSchema::new("ValSet", "Val")),
        Schema::Map(MapSchema::new("ValMap", "Val", "Val")),
    ])
    .unwrap();
    (engine, value_schema)
}

/// Adds one cycle's worth of records derived from an int batch.
fn populate_cycle(engine: &WriteStateEngine, value_schema: &Schema, batch: &[i32]) {
    let mut ordinals = Vec::new();
    for &value in batch {
        ordinals.push(engine.add("Val", int_record(value_schema, value)).unwrap());
    }
    if !ordinals.is_empty() {
        let mut list = ListRecord::new();
        let mut set = SetRecord::new();
        let mut map = MapRecord::new();
        for &ordinal in &ordinals {
            list.add_element(ordinal);
            set.add_element(ordinal);
            map.add_entry(ordinal, ordinals[0]);
        }
        engine.add("ValList", list.into()).unwrap();
        engine.add("ValSet", set.into()).unwrap();
        engine.add("ValMap", map.into()).unwrap();
    }
}

/// Runs a multi-cycle plan, following the chain on one consumer and
/// checking convergence against a direct snapshot after every cycle.
fn run_chain_plan(plan: &[Vec<i32>]) {
    let (mut producer, value_schema) = mixed_engine();

    populate_cycle(&producer, &value_schema, &plan[0]);
    let snapshot = snapshot_blob(&mut producer);
    let mut chained = load_snapshot(&snapshot);
    assert_engines_equal(&chained, &load_snapshot(&snapshot));

    for batch in &plan[1..] {
        producer.prepare_for_next_cycle().unwrap();
        populate_cycle(&producer, &value_schema, batch);
        producer.prepare_for_write().unwrap();

        let delta = delta_blob(&mut producer);
        let fresh_snapshot = snapshot_blob(&mut producer);

        apply_delta(&mut chained, &delta);
        let direct = load_snapshot(&fresh_snapshot);
        assert_engines_equal(&chained, &direct);
        assert_eq!(chained.current_randomized_tag(), direct.current_randomized_tag());
    }
}

/// A hand-picked plan covering growth, overlap, shrink, and emptiness.
#[test]
fn test_chain_converges_with_direct_snapshot() {
    run_chain_plan(&[
        vec![1, 2, 3],
        vec![2, 3, 4, 5],
        vec![5],
        vec![],
        vec![1, 2, 3],
    ]);
}

/// A reverse delta returns the consumer to the exact prior state.
#[test]
fn test_reverse_delta_walks_back() {
    let (mut producer, value_schema) = mixed_engine();

    populate_cycle(&producer, &value_schema, &[10, 20, 30]);
    let snapshot = snapshot_blob(&mut producer);
    producer.prepare_for_next_cycle().unwrap();

    populate_cycle(&producer, &value_schema, &[20, 40]);
    let delta = delta_blob(&mut producer);
    let reverse = reverse_delta_blob(&mut producer);

    let baseline = load_snapshot(&snapshot);
    let mut walker = load_snapshot(&snapshot);
    apply_delta(&mut walker, &delta);
    apply_delta(&mut walker, &reverse);

    assert_engines_equal(&walker, &baseline);
    assert_eq!(walker.current_randomized_tag(), baseline.current_randomized_tag());
}

/// Reset restores the post-cycle population and re-rolls the next tag so
/// nothing can chain onto the aborted version.
#[test]
fn test_reset_discards_aborted_cycle() {
    let schema = single_int_schema("A");
    let mut producer = WriteStateEngine::with_schemas([schema.clone()]).unwrap();
    producer.add("A", int_record(&schema, 1)).unwrap();

    let snapshot = snapshot_blob(&mut producer);
    producer.prepare_for_next_cycle().unwrap();

    // A partially built cycle gets abandoned
    producer.add("A", int_record(&schema, 99)).unwrap();
    let aborted_tag = producer.next_randomized_tag();
    producer.reset_to_last_prepare_for_next_cycle().unwrap();
    assert_ne!(producer.next_randomized_tag(), aborted_tag);

    // The retried cycle carries the real content
    producer.add_all_objects_from_previous_cycle();
    producer.add("A", int_record(&schema, 2)).unwrap();
    let delta = delta_blob(&mut producer);

    let mut consumer = load_snapshot(&snapshot);
    apply_delta(&mut consumer, &delta);

    let state = consumer.type_state("A").unwrap();
    assert_eq!(state.populated_ordinals().count(), 2);
}

/// Reset from the writing phase drops compiled payloads too.
#[test]
fn test_reset_from_writing_phase() {
    let schema = single_int_schema("A");
    let mut producer = WriteStateEngine::with_schemas([schema.clone()]).unwrap();
    producer.add("A", int_record(&schema, 1)).unwrap();
    producer.prepare_for_write().unwrap();

    producer.reset_to_last_prepare_for_next_cycle().unwrap();
    assert!(producer.is_prepared_for_next_cycle());
    assert_eq!(producer.type_state("A").unwrap().current_population_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Chained deltas converge with direct snapshots for random plans.
    #[test]
    fn prop_chain_equivalence(plan in arb_cycle_plan(4, 12)) {
        run_chain_plan(&plan);
    }
}
