// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_handle::{OrderedRegistry, Registry};

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    for &n in &[1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("allocate_n{}", n), |b| {
            b.iter_batched(
                Registry::<20, 12>::new,
                |mut registry| {
                    for _ in 0..n {
                        black_box(registry.allocate());
                    }
                    registry
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("free_reallocate_n{}", n), |b| {
            b.iter_batched(
                || {
                    let mut registry = Registry::<20, 12>::new();
                    let handles: Vec<_> = (0..n).map(|_| registry.allocate()).collect();
                    (registry, handles)
                },
                |(mut registry, handles)| {
                    for handle in handles.iter().step_by(2) {
                        registry.free(*handle);
                    }
                    let valid = handles.iter().filter(|h| registry.is_valid(**h)).count();
                    for _ in 0..n / 2 {
                        black_box(registry.allocate());
                    }
                    black_box(valid);
                    registry
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_ordered_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_registry");
    group.throughput(Throughput::Elements(255));
    group.bench_function("allocate_front_and_iterate", |b| {
        b.iter_batched(
            OrderedRegistry::<8, 8>::new,
            |mut registry| {
                let mut first = None;
                for _ in 0..255 {
                    first = Some(registry.allocate(first));
                }
                black_box(registry.iter().count());
                registry
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_registry, bench_ordered_registry);
criterion_main!(benches);
