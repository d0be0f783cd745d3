//! Workspace-level container lifecycle: naming, creation, reopen,
//! deletion, and the on-disk file format.

use recdb::storage::{ident, BlockStore};
use tempfile::tempdir;

#[test]
fn containers_live_under_normalized_paths() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    store.create("Users/Johnny/123_hello", 16).unwrap();
    store.close_all().unwrap();

    let expected: std::path::PathBuf = ["users", "johnny", "123_hello"].iter().collect();
    assert!(dir.path().join(expected).is_file());
}

#[test]
fn the_prefix_records_the_block_size() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    store.create("sized", 640).unwrap();
    store.close_all().unwrap();

    let raw = std::fs::read(dir.path().join("sized")).unwrap();
    assert_eq!(&raw[..4], &640i32.to_le_bytes());
    // prefix plus one header block
    assert_eq!(raw.len(), 4 + 640);

    let handle = store.open("sized").unwrap();
    assert_eq!(handle.block_size(), 640);
    store.close("sized").unwrap();
}

#[test]
fn delete_closes_and_removes_the_file() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    let handle = store.create("doomed", 16).unwrap();
    handle
        .write_block(0, vec![7u8; 16].into_boxed_slice())
        .unwrap()
        .wait()
        .unwrap();

    store.delete("doomed").unwrap();
    assert!(handle.is_closed());
    assert!(!store.exists("doomed"));
    assert!(store.delete("doomed").is_err());
}

#[test]
fn a_fresh_store_instance_sees_persisted_containers() {
    let dir = tempdir().unwrap();
    {
        let mut store = BlockStore::new(dir.path()).unwrap();
        let handle = store.create("kept", 16).unwrap();
        handle
            .write_block(0, vec![0xAAu8; 16].into_boxed_slice())
            .unwrap()
            .wait()
            .unwrap();
        store.close_all().unwrap();
    }

    let mut store = BlockStore::new(dir.path()).unwrap();
    assert!(store.exists("kept"));
    let handle = store.open("kept").unwrap();
    assert_eq!(handle.block_count(), 1);
    let block = handle
        .read_block(0, vec![0u8; 16].into_boxed_slice())
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(&block[..], &[0xAA; 16]);
    store.close("kept").unwrap();
}

#[test]
fn identifier_rules_hold_at_the_store_boundary() {
    assert_eq!(
        ident::normalize("/Users/Johnny/123_hello", '\\').unwrap(),
        "\\users\\johnny\\123_hello"
    );
    assert!(ident::normalize("C:/Users/johnny", '/').is_err());
    assert!(ident::normalize("a//b", '/').is_err());

    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();
    assert!(store.create("C:/nope", 16).is_err());
    assert!(store.open("a//b").is_err());
}
