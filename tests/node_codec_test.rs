//! Integration tests for the node codec against real pages

use bytes::Bytes;
use simpledb::common::{PageId, TreeConfig, PAGE_PAYLOAD_SIZE};
use simpledb::index::node_codec::{decode, encode, estimate_size};
use simpledb::index::{InternalNode, LeafNode, Node};
use simpledb::storage::disk::PageManager;
use simpledb::storage::page::{Page, PageType};
use tempfile::NamedTempFile;

fn leaf_with(entries: &[(&[u8], &[u8])], next: Option<PageId>) -> Node<PageId> {
    let mut leaf = LeafNode::new();
    for (i, (k, v)) in entries.iter().enumerate() {
        leaf.insert(i, Bytes::copy_from_slice(k), Bytes::copy_from_slice(v));
    }
    leaf.next = next;
    Node::Leaf(leaf)
}

#[test]
fn test_codec_leaf_round_trip_preserves_everything() {
    let node = leaf_with(
        &[(b"a", b"1"), (b"bb", b""), (b"ccc", b"three")],
        Some(PageId::new(9)),
    );
    let decoded = decode(&encode(&node)).unwrap();
    assert_eq!(decoded, node);
    assert!(decoded.is_leaf());
    assert_eq!(decoded.len(), 3);

    let leaf = decoded.as_leaf().unwrap();
    assert_eq!(leaf.values[1], Bytes::new());
    assert_eq!(leaf.next, Some(PageId::new(9)));
}

#[test]
fn test_codec_internal_round_trip() {
    let mut internal = InternalNode::new(Bytes::from_static(b"m"), PageId::new(1), PageId::new(2));
    internal.insert_child(1, Bytes::from_static(b"t"), PageId::new(3));
    let node = Node::Internal(internal);

    let decoded = decode(&encode(&node)).unwrap();
    assert!(!decoded.is_leaf());
    assert_eq!(decoded.keys(), &[Bytes::from_static(b"m"), Bytes::from_static(b"t")]);
    assert_eq!(
        decoded.as_internal().unwrap().children,
        vec![PageId::new(1), PageId::new(2), PageId::new(3)]
    );
}

#[test]
fn test_codec_node_survives_page_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let node = leaf_with(&[(b"apple", b"red"), (b"kiwi", b"green")], None);
    let page_id;

    {
        let pm = PageManager::open(temp_file.path()).unwrap();
        page_id = pm.allocate_page(PageType::Leaf).unwrap();
        let mut page = Page::new(page_id, PageType::Leaf);
        page.set_data(&encode(&node)).unwrap();
        pm.write_page(&mut page).unwrap();
    }

    let pm = PageManager::open(temp_file.path()).unwrap();
    let page = pm.read_page(page_id).unwrap();
    assert_eq!(decode(page.data()).unwrap(), node);
}

#[test]
fn test_codec_entry_limit_fits_full_node() {
    for max_keys in [3, 4, 16, 64] {
        let config = TreeConfig::default().with_max_keys(max_keys);
        let limit = config.max_entry_size();
        let key = vec![b'k'; limit / 2];
        let value = vec![b'v'; limit - limit / 2];

        let mut leaf = LeafNode::<PageId>::new();
        for i in 0..max_keys {
            let mut k = key.clone();
            k[0] = i as u8;
            leaf.insert(i, Bytes::from(k), Bytes::from(value.clone()));
        }
        leaf.next = Some(PageId::new(1));
        let node = Node::Leaf(leaf);
        assert!(
            estimate_size(&node) <= PAGE_PAYLOAD_SIZE,
            "max_keys {} overflows a page",
            max_keys
        );
        assert_eq!(estimate_size(&node), encode(&node).len());
    }
}
