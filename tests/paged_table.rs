//! End-to-end coverage of the paged byte table: random access across many
//! block/cache shapes, growth, and persistence across reopen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recdb::{BlockStore, ByteTable};
use tempfile::tempdir;

fn open_table(store: &mut BlockStore, id: &str, block_size: usize, capacity: usize) -> ByteTable {
    let file = if store.exists(id) {
        store.open(id).unwrap()
    } else {
        store.create(id, block_size).unwrap()
    };
    ByteTable::new(file, capacity).unwrap()
}

#[test]
fn reads_writes_growth_and_reopen_across_cache_shapes() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();
    let block_size = 9;

    for capacity in [3usize, 5, 10, 100, 1000] {
        let id = format!("bytes_{capacity}");
        let mut table = open_table(&mut store, &id, block_size, capacity);

        for index in 0..1000u64 {
            table.write_byte(index, index as u8).unwrap();
        }
        assert_eq!(table.len(), 1000);

        for index in 0..1000u64 {
            assert_eq!(table.read_byte(index).unwrap(), index as u8);
        }
        for index in (0..1000u64).rev() {
            assert_eq!(table.read_byte(index).unwrap(), index as u8);
        }

        let mut rng = StdRng::seed_from_u64(123);
        for _ in 0..1000 {
            let index = rng.gen_range(0..1000u64);
            assert_eq!(table.read_byte(index).unwrap(), index as u8);
        }

        // grow to 2000 elements, then bump every element by one
        for index in 1000..2000u64 {
            table.write_byte(index, index as u8).unwrap();
        }
        for index in 0..2000u64 {
            let value = table.read_byte(index).unwrap();
            table.write_byte(index, value.wrapping_add(1)).unwrap();
        }
        table.close().unwrap();

        let mut table = open_table(&mut store, &id, block_size, capacity);
        assert_eq!(table.len(), 2000);
        for index in 0..2000u64 {
            assert_eq!(table.read_byte(index).unwrap(), (index as u8).wrapping_add(1));
        }
        table.close().unwrap();
    }
}

#[test]
fn appends_are_durable_even_without_later_writes() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    // touch a handful of bytes, leaving most of the last block untouched
    let mut table = open_table(&mut store, "sparse", 16, 3);
    for index in 0..33u64 {
        table.write_byte(index, 1).unwrap();
    }
    table.close().unwrap();

    let handle = store.open("sparse").unwrap();
    assert_eq!(handle.block_count(), 3);
    store.close("sparse").unwrap();
}

#[test]
fn interleaved_tables_on_separate_containers_stay_independent() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    let mut left = open_table(&mut store, "left", 9, 3);
    let mut right = open_table(&mut store, "right", 13, 5);

    for index in 0..500u64 {
        left.write_byte(index, index as u8).unwrap();
        right.write_byte(index, (index as u8).wrapping_mul(3)).unwrap();
    }
    for index in 0..500u64 {
        assert_eq!(left.read_byte(index).unwrap(), index as u8);
        assert_eq!(right.read_byte(index).unwrap(), (index as u8).wrapping_mul(3));
    }

    left.close().unwrap();
    right.close().unwrap();
}

#[test]
fn element_count_on_disk_reflects_the_close_time_state() {
    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();

    let mut table = open_table(&mut store, "counted", 16, 3);
    for index in 0..10u64 {
        table.write_byte(index, 0xEE).unwrap();
    }
    table.flush().unwrap();

    // more writes after the flush still make it out through close
    for index in 10..20u64 {
        table.write_byte(index, 0xEE).unwrap();
    }
    table.close().unwrap();

    let table = open_table(&mut store, "counted", 16, 3);
    assert_eq!(table.len(), 20);
    table.close().unwrap();
}
