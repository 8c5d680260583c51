//! Performance benchmarks for chatsync-engine

use chatsync_engine::{apply_pushes, Message, MessageStore, PushFilter};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn rows(count: u64) -> Vec<Message> {
    (0..count)
        .map(|i| {
            Message::confirmed(
                format!("msg_{}", i),
                "conv-1",
                if i % 2 == 0 { "alice" } else { "bob" },
                "Hello there",
                1_706_745_600_000 + i * 1000,
            )
        })
        .collect()
}

fn bench_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_operations");

    group.bench_function("append_and_remove_optimistic", |b| {
        let mut store = MessageStore::new("conv-1");
        store.initialize(rows(1000));
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            let temp_id = store.append_optimistic(Message::optimistic(
                format!("tmp-{}", id),
                "conv-1",
                "alice",
                "hi",
                u64::MAX,
            ));
            store.remove_optimistic(black_box(&temp_id))
        })
    });

    group.bench_function("merge_remote_duplicate", |b| {
        let mut store = MessageStore::new("conv-1");
        store.initialize(rows(1000));
        let dup = rows(1000).remove(500);

        b.iter(|| store.merge_remote(black_box(dup.clone())))
    });

    group.finish();
}

fn bench_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("initialize");

    for size in [100u64, 1000, 10000] {
        let mut input = rows(size);
        input.reverse();

        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let mut store = MessageStore::new("conv-1");
                store.initialize(black_box(input.clone()))
            })
        });
    }

    group.finish();
}

fn bench_apply_pushes(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_pushes");

    for size in [10u64, 100, 1000] {
        // Interleaved timestamps so every push lands mid-list
        let pushes: Vec<_> = rows(size)
            .into_iter()
            .map(|mut m| {
                m.id = format!("push_{}", m.id);
                m.created_at += 500;
                m
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &pushes, |b, pushes| {
            let filter = PushFilter::new("alice");
            b.iter(|| {
                let mut store = MessageStore::new("conv-1");
                store.initialize(rows(1000));
                apply_pushes(&mut store, &filter, black_box(pushes.clone()))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_store_operations, bench_initialize, bench_apply_pushes);
criterion_main!(benches);
