//! Vault mutation and snapshot benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::Rng;
use vault_core::{Entity, EntityType, RestoreOptions, UndoHistory, Vault, VaultConfig};
use vault_testkit::scenarios::populated_vault;
use vault_value::{Map, Value};

/// A vault with `records` records of 10 pages each.
fn vault_of(records: usize) -> Vault {
    populated_vault(records, 10, VaultConfig::default())
}

fn random_page(rng: &mut impl Rng, records: usize) -> String {
    format!("r{}-p{}", rng.gen_range(0..records), rng.gen_range(0..10))
}

/// Benchmark O(1) lookups in a populated vault.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for records in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(records), records, |b, &records| {
            let vault = vault_of(records);
            let mut rng = rand::thread_rng();

            b.iter(|| {
                let id = random_page(&mut rng, records);
                black_box(vault.get(black_box(&id)));
            });
        });
    }
    group.finish();
}

/// Benchmark a single patch, which copies only the touched maps.
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for records in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(records), records, |b, &records| {
            let mut vault = vault_of(records);
            let mut rng = rand::thread_rng();
            let mut patch = Map::new();
            patch.insert("width".into(), Value::Integer(640));

            b.iter(|| {
                let id = random_page(&mut rng, records);
                vault.update(&id, black_box(&patch)).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark an update right after a snapshot, the undo-checkpoint pattern.
fn bench_update_after_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_after_snapshot");

    for records in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(records), records, |b, &records| {
            let mut vault = vault_of(records);
            let mut history = UndoHistory::with_limit(16);
            let mut rng = rand::thread_rng();
            let mut patch = Map::new();
            patch.insert("height".into(), Value::Integer(480));

            b.iter(|| {
                history.checkpoint(&vault);
                let id = random_page(&mut rng, records);
                vault.update(&id, black_box(&patch)).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark trashing and restoring a record with its pages.
fn bench_trash_restore(c: &mut Criterion) {
    c.bench_function("trash_restore_record", |b| {
        let mut vault = vault_of(100);
        let mut rng = rand::thread_rng();

        b.iter(|| {
            let id = format!("r{}", rng.gen_range(0..100));
            vault.move_to_trash(black_box(&id)).unwrap();
            vault
                .restore_from_trash(&id, RestoreOptions::default())
                .unwrap();
        });
    });
}

/// Benchmark adding a page under an existing record.
fn bench_add(c: &mut Criterion) {
    c.bench_function("add_page", |b| {
        b.iter_batched(
            || vault_of(100),
            |mut vault| {
                for i in 0..100 {
                    let page = Entity::new(format!("extra-{i}"), EntityType::Page);
                    vault.add(page, Some("r0")).unwrap();
                }
                black_box(vault);
            },
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark snapshot and restore, both pointer swaps.
fn bench_snapshot(c: &mut Criterion) {
    c.bench_function("snapshot_restore", |b| {
        let mut vault = vault_of(1000);

        b.iter(|| {
            let snapshot = vault.snapshot();
            vault.restore(black_box(snapshot));
        });
    });
}

criterion_group!(
    benches,
    bench_get,
    bench_update,
    bench_update_after_snapshot,
    bench_trash_restore,
    bench_add,
    bench_snapshot,
);

criterion_main!(benches);
