//! Indexed relation performance benchmarks: insert throughput, and
//! equal_range lookups against both an already-compatible index and one
//! that must be built on demand.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ram_datalog::relation::{Relation, SortOrder};

fn bench_single_insert(c: &mut Criterion) {
    let rel = Relation::new("point", 2);
    let mut counter = 0i32;
    c.bench_function("relation_insert_single", |b| {
        b.iter(|| {
            counter += 1;
            rel.insert(vec![counter, counter * 2])
        });
    });
}

fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_batch_insert");
    for &size in &[100i32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let rel = Relation::new("batch", 2);
                for i in 0..size {
                    rel.insert(vec![i % 10, i]);
                }
                rel.len()
            });
        });
    }
    group.finish();
}

fn bench_equal_range_with_warm_index(c: &mut Criterion) {
    let rel = Relation::new("warm", 2);
    for i in 0..10_000i32 {
        rel.insert(vec![i % 10, i]);
    }
    // Prime the index once; subsequent lookups all hit the same order.
    rel.equal_range(&[Some(0), None]);

    c.bench_function("equal_range_warm_index", |b| {
        b.iter(|| rel.equal_range(&[Some(5), None]));
    });
}

fn bench_equal_range_builds_index_on_demand(c: &mut Criterion) {
    c.bench_function("equal_range_cold_index", |b| {
        b.iter_batched(
            || {
                let rel = Relation::new("cold", 2);
                for i in 0..1_000i32 {
                    rel.insert(vec![i % 10, i]);
                }
                rel
            },
            |rel| rel.equal_range(&[Some(5), None]),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_ensure_index_over_existing_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensure_index");
    for &size in &[1_000i32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let rel = Relation::new("sized", 2);
                    for i in 0..size {
                        rel.insert(vec![i, i % 7]);
                    }
                    rel
                },
                |rel| rel.ensure_index(SortOrder(vec![1, 0])),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_single_insert, bench_batch_insert, bench_equal_range_with_warm_index,
        bench_equal_range_builds_index_on_demand, bench_ensure_index_over_existing_rows
}
criterion_main!(benches);
