use chained_collections::{HashBag, HashDictionary, HashSet};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_set_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("set::insert_fresh_100k", |b| {
        b.iter_batched(
            HashSet::<String>::new,
            |mut s| {
                for x in lcg(1).take(100_000) {
                    s.add(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

// Removal never shrinks, so re-inserting into a drained set skips growth.
fn bench_set_insert_warm_100k(c: &mut Criterion) {
    c.bench_function("set::insert_warm_100k", |b| {
        b.iter_batched(
            || {
                let mut s = HashSet::new();
                let keys: Vec<String> = lcg(2).take(110_000).map(key).collect();
                for k in &keys {
                    s.add(k.clone());
                }
                for k in &keys {
                    s.remove(k);
                }
                s
            },
            |mut s| {
                for x in lcg(3).take(100_000) {
                    s.add(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_set_find_hit_and_miss_10k(c: &mut Criterion) {
    let mut s = HashSet::new();
    let keys: Vec<String> = lcg(5).take(100_000).map(key).collect();
    for k in &keys {
        s.add(k.clone());
    }
    let misses: Vec<String> = lcg(6).take(10_000).map(key).collect();
    c.bench_function("set::find_hit_10k", |b| {
        b.iter(|| {
            for k in keys.iter().step_by(10) {
                black_box(s.find(k.as_str()));
            }
        })
    });
    c.bench_function("set::find_miss_10k", |b| {
        b.iter(|| {
            for k in &misses {
                black_box(s.contains(k.as_str()));
            }
        })
    });
}

fn bench_bag_add_with_repeats(c: &mut Criterion) {
    c.bench_function("bag::add_100k_over_1k_distinct", |b| {
        b.iter_batched(
            HashBag::<u64>::new,
            |mut bag| {
                for x in lcg(7).take(100_000) {
                    bag.add(x % 1_000);
                }
                black_box(bag)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_dictionary_set_and_get(c: &mut Criterion) {
    c.bench_function("dictionary::set_then_get_50k", |b| {
        b.iter_batched(
            HashDictionary::<u64, u64>::new,
            |mut d| {
                for (i, x) in lcg(9).take(50_000).enumerate() {
                    d.set(x, i as u64);
                }
                for x in lcg(9).take(50_000) {
                    black_box(d.get(&x));
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_set_insert_fresh_100k, bench_set_insert_warm_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_set_find_hit_and_miss_10k,
              bench_bag_add_with_repeats,
              bench_dictionary_set_and_get
}
criterion_main!(benches_insert, benches_ops);
