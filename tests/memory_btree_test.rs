//! Integration tests for the in-memory B+Tree

use std::collections::BTreeMap;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use simpledb::common::TreeConfig;
use simpledb::index::{KeyValueStore, MemBTree, Node, NodeStore};
use simpledb::{DbError, Result};

fn key(i: usize) -> Vec<u8> {
    format!("key{:02}", i).into_bytes()
}

fn keys_after<T: KeyValueStore>(kv: &T, start: &[u8]) -> Result<Vec<Bytes>> {
    kv.find_larger(start)?
        .map(|entry| entry.map(|(k, _)| k))
        .collect()
}

fn small_tree() -> MemBTree {
    MemBTree::with_config(TreeConfig::default().with_max_keys(4)).unwrap()
}

#[test]
fn test_btree_empty() {
    let tree = MemBTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.get(b"anything").unwrap(), None);
    assert!(!tree.find_larger(b"").unwrap().has_next());
    tree.check_invariants().unwrap();
}

#[test]
fn test_btree_five_keys_split_one_leaf() {
    let mut tree = small_tree();
    for i in 1..=5 {
        tree.set(&key(i), b"v").unwrap();
    }

    let store = tree.store();
    let root = store.load(store.root()).unwrap();
    let internal = match root.as_ref() {
        Node::Internal(internal) => internal.clone(),
        Node::Leaf(_) => panic!("root should have split"),
    };
    assert_eq!(internal.keys, vec![Bytes::from(key(4))]);

    let left = store.load(internal.children[0]).unwrap();
    let right = store.load(internal.children[1]).unwrap();
    let left = left.as_leaf().unwrap();
    let right = right.as_leaf().unwrap();
    assert_eq!(left.next, Some(internal.children[1]));
    assert_eq!(right.next, None);

    let chained: Vec<Bytes> = left.keys.iter().chain(&right.keys).cloned().collect();
    let expected: Vec<Bytes> = (1..=5).map(|i| Bytes::from(key(i))).collect();
    assert_eq!(chained, expected);
    assert_eq!(left.len(), 3);
    tree.check_invariants().unwrap();
}

#[test]
fn test_btree_six_key_scenario() {
    let mut tree = small_tree();
    for i in 1..=6 {
        tree.set(&key(i), format!("value{}", i).as_bytes()).unwrap();
    }

    assert_eq!(tree.len(), 6);
    for i in 1..=6 {
        assert_eq!(
            tree.get(&key(i)).unwrap(),
            Some(Bytes::from(format!("value{}", i)))
        );
    }
    let larger = keys_after(&tree, b"key02").unwrap();
    let expected: Vec<Bytes> = (3..=6).map(|i| Bytes::from(key(i))).collect();
    assert_eq!(larger, expected);
}

#[test]
fn test_btree_overwrite_keeps_size() {
    let mut tree = small_tree();
    for i in 0..20 {
        tree.set(&key(i), b"old").unwrap();
    }
    tree.set(&key(7), b"new").unwrap();
    assert_eq!(tree.len(), 20);
    assert_eq!(tree.get(&key(7)).unwrap(), Some(Bytes::from_static(b"new")));
    tree.check_invariants().unwrap();
}

#[test]
fn test_btree_find_larger_between_keys() {
    let mut tree = small_tree();
    for i in (0..40).step_by(2) {
        tree.set(&key(i), b"v").unwrap();
    }
    // "key05" is absent: the scan starts at the next key present
    let larger = keys_after(&tree, b"key05").unwrap();
    assert_eq!(larger.first(), Some(&Bytes::from(key(6))));
    assert_eq!(larger.len(), 17);
    assert!(keys_after(&tree, b"key38").unwrap().is_empty());
    assert!(keys_after(&tree, b"zzz").unwrap().is_empty());
}

#[test]
fn test_btree_iter_in_order_regardless_of_insertion_order() {
    let mut keys: Vec<usize> = (0..300).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(7));

    let mut tree = small_tree();
    for &i in &keys {
        tree.set(format!("{:05}", i).as_bytes(), b"v").unwrap();
    }
    tree.check_invariants().unwrap();

    let scanned: Vec<Bytes> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
    let expected: Vec<Bytes> = (0..300).map(|i| Bytes::from(format!("{:05}", i))).collect();
    assert_eq!(scanned, expected);
}

#[test]
fn test_btree_delete_merges_and_collapses_root() {
    let mut tree = small_tree();
    for i in 0..40 {
        tree.set(&key(i), b"v").unwrap();
    }
    let grown = tree.store().node_count();
    assert!(grown > 3);

    let mut order: Vec<usize> = (0..40).collect();
    order.shuffle(&mut StdRng::seed_from_u64(11));
    for (n, &i) in order.iter().enumerate() {
        assert!(tree.delete(&key(i)).unwrap());
        assert_eq!(tree.len(), 39 - n);
        tree.check_invariants().unwrap();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.store().node_count(), 1);
    let root = tree.store().load(tree.store().root()).unwrap();
    assert!(root.is_leaf());
}

#[test]
fn test_btree_delete_absent_is_noop() {
    let mut tree = small_tree();
    tree.set(b"a", b"1").unwrap();
    assert!(!tree.delete(b"b").unwrap());
    assert!(tree.delete(b"a").unwrap());
    assert!(!tree.delete(b"a").unwrap());
    assert_eq!(tree.len(), 0);
}

#[test]
fn test_btree_rejects_oversized_entry() {
    let mut tree = small_tree();
    let limit = tree.config().max_entry_size();
    let value = vec![0u8; limit];
    assert!(matches!(
        tree.set(b"k", &value),
        Err(DbError::EntryTooLarge { .. })
    ));
    assert!(tree.is_empty());
    tree.set(b"k", &value[1..]).unwrap();
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_btree_rejects_bad_config() {
    let config = TreeConfig::default().with_max_keys(2);
    assert!(matches!(
        MemBTree::with_config(config),
        Err(DbError::InvalidConfig(_))
    ));
}

/// Random sets and deletes mirrored against a `BTreeMap`.
fn run_against_model<T: KeyValueStore>(kv: &mut T, seed: u64, ops: usize) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = BTreeMap::new();

    for step in 0..ops {
        let k = format!("{:04}", rng.gen_range(0..400)).into_bytes();
        if rng.gen_bool(0.6) {
            let v = format!("v{}", step).into_bytes();
            kv.set(&k, &v).unwrap();
            model.insert(k, v);
        } else {
            let removed = kv.delete(&k).unwrap();
            assert_eq!(removed, model.remove(&k).is_some());
        }
        assert_eq!(kv.len(), model.len());
    }

    for (k, v) in &model {
        assert_eq!(kv.get(k).unwrap().as_deref(), Some(&v[..]));
    }
    let probe = b"0200";
    let scanned: Vec<Bytes> = keys_after(kv, probe).unwrap();
    let expected: Vec<Bytes> = model
        .range(probe.to_vec()..)
        .filter(|(k, _)| k.as_slice() > &probe[..])
        .map(|(k, _)| Bytes::from(k.clone()))
        .collect();
    assert_eq!(scanned, expected);
    model
}

#[test]
fn test_btree_random_ops_match_model() {
    for (seed, max_keys) in [(1, 3), (2, 4), (3, 5), (4, 8)] {
        let mut tree = MemBTree::with_config(TreeConfig::default().with_max_keys(max_keys)).unwrap();
        run_against_model(&mut tree, seed, 3000);
        tree.check_invariants().unwrap();
    }
}
