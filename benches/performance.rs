//! Performance benchmarks for state cells.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use statecell::{
    compose, merge, merge_deep, ConfigUpdate, MemoryStorage, Partial, Record, StateCell, Value,
};
use std::sync::Arc;

/// A record with `width` keys, each holding a small nested record.
fn wide_record(width: usize) -> Record {
    (0..width)
        .map(|i| {
            let nested: Record = (0..4).map(|j| (format!("f{}", j), (i * j) as i64)).collect();
            (format!("k{}", i), Value::Record(nested))
        })
        .collect()
}

/// Benchmark shallow and deep merge against records of growing width
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for width in [10, 100, 1000] {
        let current = wide_record(width);
        let patch: Record = [("k0", Value::Record(Record::new().with("f1", 42)))]
            .into_iter()
            .collect();

        group.bench_with_input(BenchmarkId::new("shallow", width), &width, |b, _| {
            b.iter(|| black_box(merge(Some(&current), &patch)));
        });

        group.bench_with_input(BenchmarkId::new("deep", width), &width, |b, _| {
            b.iter(|| black_box(merge_deep(Some(&current), &patch)));
        });
    }

    group.finish();
}

/// Benchmark a mutation fanned out to many selections
fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for subscribers in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("selections", subscribers),
            &subscribers,
            |b, &subscribers| {
                let cell: StateCell<Record> = StateCell::new();
                cell.set(Partial::new().set("a", 0).set("b", 0)).unwrap();

                let _subscriptions: Vec<_> = (0..subscribers)
                    .map(|_| {
                        cell.select(|st: &Record| st.get("b").and_then(Value::as_i64))
                            .subscribe(|value| {
                                black_box(value);
                            })
                    })
                    .collect();

                let mut n = 0i64;
                b.iter(|| {
                    n += 1;
                    cell.set(Partial::new().set("a", n)).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark composed views over several cells
fn bench_compose(c: &mut Criterion) {
    let cells: Vec<StateCell<Record>> = (0..4).map(|_| StateCell::new()).collect();
    for (i, cell) in cells.iter().enumerate() {
        cell.set(Partial::new().set(format!("cell{}", i), 0)).unwrap();
    }

    let view = compose(cells.iter().map(StateCell::records));
    let _subscription = view.subscribe(|record| {
        black_box(record.len());
    });

    let mut n = 0i64;
    c.bench_function("compose_four_cells", |b| {
        b.iter(|| {
            n += 1;
            cells[(n % 4) as usize]
                .set(Partial::new().set("shared", n))
                .unwrap();
        });
    });
}

/// Benchmark mutations with persistence enabled
fn bench_persisted_mutation(c: &mut Criterion) {
    let cell: StateCell<Record> = StateCell::named("Bench");
    cell.configure(
        ConfigUpdate::new()
            .storage(Arc::new(MemoryStorage::new()))
            .persist(true),
    );
    cell.set(Partial::from_record(wide_record(50))).unwrap();

    let mut n = 0i64;
    c.bench_function("persisted_mutation", |b| {
        b.iter(|| {
            n += 1;
            cell.set(Partial::new().set("counter", n)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_merge,
    bench_broadcast,
    bench_compose,
    bench_persisted_mutation
);
criterion_main!(benches);
