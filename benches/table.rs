//! Typed-table benchmarks: positional writes and reads through the full
//! stack (layout codec, paged byte table, page cache, block container).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recdb::{BlockStore, ByteTable, LongLayout, Table, TextLayout};
use tempfile::tempdir;

fn fixed_table(store: &mut BlockStore, id: &str, cache: usize) -> Table<LongLayout> {
    let file = store.create(id, 4096).unwrap();
    Table::fixed(LongLayout, ByteTable::new(file, cache).unwrap()).unwrap()
}

fn bench_fixed_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_append");
    group.sample_size(20);

    for cache in [8usize, 64] {
        group.bench_with_input(BenchmarkId::new("longs", cache), &cache, |b, &cache| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let mut store = BlockStore::new(dir.path()).unwrap();
                    let table = fixed_table(&mut store, "longs", cache);
                    (dir, store, table)
                },
                |(_dir, _store, mut table)| {
                    for position in 0..1000u64 {
                        table.write(position, &(position as i64)).unwrap();
                    }
                    table.close().unwrap();
                },
            );
        });
    }

    group.finish();
}

fn bench_fixed_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_read");
    group.sample_size(20);

    let dir = tempdir().unwrap();
    let mut store = BlockStore::new(dir.path()).unwrap();
    let mut table = fixed_table(&mut store, "longs", 64);
    for position in 0..1000u64 {
        table.write(position, &(position as i64)).unwrap();
    }

    group.bench_function("sequential", |b| {
        b.iter(|| {
            for position in 0..1000u64 {
                black_box(table.read(position).unwrap());
            }
        });
    });

    group.bench_function("strided", |b| {
        b.iter(|| {
            for position in (0..1000u64).step_by(37) {
                black_box(table.read(position).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_variable_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("variable_write");
    group.sample_size(20);

    group.bench_function("songs", |b| {
        b.iter_with_setup(
            || {
                let dir = tempdir().unwrap();
                let mut store = BlockStore::new(dir.path()).unwrap();
                let index = ByteTable::new(store.create("songs/index", 4096).unwrap(), 16).unwrap();
                let data = ByteTable::new(store.create("songs/data", 4096).unwrap(), 16).unwrap();
                let table = Table::variable((LongLayout, TextLayout), index, data).unwrap();
                (dir, store, table)
            },
            |(_dir, _store, mut table)| {
                for position in 0..200u64 {
                    let record = (position as i64, format!("record number {position}"));
                    table.write(position, &record).unwrap();
                }
                table.close().unwrap();
            },
        );
    });

    group.finish();
}

criterion_group!(benches, bench_fixed_append, bench_fixed_read, bench_variable_write);
criterion_main!(benches);
