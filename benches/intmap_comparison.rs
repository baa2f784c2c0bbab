use std::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use cuckoo_intmap::IntMap;
use hashbrown::HashMap as HashbrownMap;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const SIZES: &[usize] = &[(1 << 10), (1 << 14), (1 << 18)];

/// Pseudorandom odd keys: never zero, and deterministic per size so every
/// contender sees the same workload.
fn keys_for(size: usize) -> Vec<i32> {
    let mut rng = SmallRng::seed_from_u64(size as u64);
    (0..size).map(|_| rng.random::<i32>() | 1).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    for &size in SIZES {
        let keys = keys_for(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("cuckoo_intmap", size), &keys, |b, keys| {
            b.iter_batched(
                || IntMap::with_capacity(0),
                |mut map| {
                    for &key in keys {
                        map.insert(key, key);
                    }
                    map
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("hashbrown", size), &keys, |b, keys| {
            b.iter_batched(
                HashbrownMap::new,
                |mut map| {
                    for &key in keys {
                        map.insert(key, key);
                    }
                    map
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("std", size), &keys, |b, keys| {
            b.iter_batched(
                std::collections::HashMap::new,
                |mut map| {
                    for &key in keys {
                        map.insert(key, key);
                    }
                    map
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    for (name, miss) in [("get_hit", false), ("get_miss", true)] {
        let mut group = c.benchmark_group(name);
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
        for &size in SIZES {
            let keys = keys_for(size);
            // Inserted keys are odd, so clearing the low bit turns every
            // probe into a guaranteed miss.
            let probes: Vec<i32> = if miss {
                keys.iter().map(|&key| key & !1).collect()
            } else {
                keys.clone()
            };

            let mut cuckoo = IntMap::with_capacity(size);
            let mut brown = HashbrownMap::with_capacity(size);
            for &key in &keys {
                cuckoo.insert(key, key);
                brown.insert(key, key);
            }

            group.throughput(Throughput::Elements(size as u64));
            group.bench_with_input(
                BenchmarkId::new("cuckoo_intmap", size),
                &probes,
                |b, probes| {
                    b.iter(|| {
                        let mut found = 0usize;
                        for &key in probes {
                            if cuckoo.get(black_box(key)).is_some() {
                                found += 1;
                            }
                        }
                        found
                    });
                },
            );
            group.bench_with_input(BenchmarkId::new("hashbrown", size), &probes, |b, probes| {
                b.iter(|| {
                    let mut found = 0usize;
                    for &key in probes {
                        if brown.get(black_box(&key)).is_some() {
                            found += 1;
                        }
                    }
                    found
                });
            });
        }
        group.finish();
    }
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_insert_churn");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    for &size in SIZES {
        let keys = keys_for(size);
        let mut base = IntMap::with_capacity(size);
        for &key in &keys {
            base.insert(key, key);
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("cuckoo_intmap", size), &keys, |b, keys| {
            b.iter_batched(
                || base.clone(),
                |mut map| {
                    for &key in keys {
                        map.remove(key);
                        map.insert(key, key);
                    }
                    map
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_churn);
criterion_main!(benches);
