//! # Property-Based Tests
//!
//! Graph and store invariants checked with proptest.

use memlink_core::protocol::{encode_record, parse_response};
use memlink_core::{Graph, GraphStore, KvStore, RelationshipRecord, formats};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,12}"
}

fn record() -> impl Strategy<Value = RelationshipRecord> {
    (name(), name(), name(), any::<i64>())
        .prop_map(|(s, t, l, w)| RelationshipRecord::new(s, t, l, w))
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Node count equals the number of distinct names referenced.
    #[test]
    fn one_node_per_distinct_name(records in vec(record(), 0..60)) {
        let mut graph = Graph::new();
        for r in &records {
            graph.add_relationship(&r.source, &r.target, &r.label, r.weight);
        }

        let names: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| [r.source.as_str(), r.target.as_str()])
            .collect();
        prop_assert_eq!(graph.node_count(), names.len());
        prop_assert_eq!(graph.edge_count(), records.len());
    }

    /// Insertion order does not change the set of nodes.
    #[test]
    fn node_set_independent_of_order(records in vec(record(), 0..40)) {
        let forward = GraphStore::new();
        let backward = GraphStore::new();
        forward.merge_records(&records);
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        backward.merge_records(&reversed);

        let names = |store: &GraphStore| -> BTreeSet<String> {
            store.read().nodes().map(|n| n.name().to_string()).collect()
        };
        prop_assert_eq!(names(&forward), names(&backward));
    }

    /// The hash recorded at first insertion wins.
    #[test]
    fn first_hash_wins(entity in name(), h1 in any::<i64>(), h2 in any::<i64>()) {
        let mut graph = Graph::new();
        let first = graph.upsert_entity(&entity, h1);
        let second = graph.upsert_entity(&entity, h2);

        prop_assert_eq!(first, second);
        prop_assert_eq!(graph.find(&entity).map(|n| n.entity.hash), Some(h1));
    }

    /// Outgoing relationships come back in insertion order.
    #[test]
    fn relationships_from_preserves_order(records in vec(record(), 0..40)) {
        let store = GraphStore::new();
        store.merge_records(&records);

        for source in records.iter().map(|r| &r.source) {
            let expected: Vec<_> = records.iter().filter(|r| &r.source == source).cloned().collect();
            prop_assert_eq!(store.relationships_from(source), expected);
        }
    }

    /// Encoded records parse back to the same tuples.
    #[test]
    fn response_lines_roundtrip(records in vec(record(), 0..30)) {
        let mut body = String::new();
        for r in &records {
            body.push_str(&encode_record(r).expect("encodable"));
        }
        let parsed = parse_response(body.as_bytes());

        prop_assert!(parsed.rejected.is_empty());
        prop_assert_eq!(parsed.records, records);
    }

    /// Snapshots reproduce the graph exactly.
    #[test]
    fn snapshot_preserves_graph(records in vec(record(), 0..40)) {
        let mut graph = Graph::new();
        graph.merge_records(&records);

        let restored = formats::decode(&formats::encode(&graph).expect("encode")).expect("decode");
        prop_assert_eq!(restored, graph);
    }

    /// save then load on a fresh store gives the same mapping.
    #[test]
    fn kv_save_load_roundtrip(
        entries in btree_map("[a-z0-9 ]{1,10}", "[ -~]{0,20}", 0..20)
    ) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("store.txt");

        let store = KvStore::new();
        for (k, v) in &entries {
            store.set(k.clone(), v.clone()).expect("set");
        }
        store.save(&path).expect("save");

        let reloaded = KvStore::open(&path).expect("open");
        let pairs: Vec<(String, String)> = entries.into_iter().collect();
        prop_assert_eq!(reloaded.entries(), pairs);
    }
}
