//! Insert and lookup throughput against the standard library map and
//! hashbrown, on seeded random integer and short-string datasets.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hashbrown::HashMap as BrownMap;
use raclette::HashMap as RacletteMap;
use std::collections::HashMap as StdMap;

const SEED: u64 = 1234;
const DATASET: usize = 100_000;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn int_dataset() -> Vec<(u64, u64)> {
    let mut rng = StdRng::seed_from_u64(SEED);
    (0..DATASET).map(|_| (rng.gen(), rng.gen())).collect()
}

fn string_dataset() -> Vec<(String, u64)> {
    let mut rng = StdRng::seed_from_u64(SEED);
    (0..DATASET)
        .map(|_| {
            let key = (0..7)
                .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
                .collect();
            (key, rng.gen())
        })
        .collect()
}

fn bench_insert_int(c: &mut Criterion) {
    let data = int_dataset();

    c.bench_function("insert/int/raclette", |b| {
        b.iter(|| {
            let mut m = RacletteMap::new();
            for (k, v) in &data {
                m.insert(*k, *v);
            }
            black_box(m.len())
        })
    });

    c.bench_function("insert/int/std", |b| {
        b.iter(|| {
            let mut m = StdMap::new();
            for (k, v) in &data {
                m.insert(*k, *v);
            }
            black_box(m.len())
        })
    });

    c.bench_function("insert/int/hashbrown", |b| {
        b.iter(|| {
            let mut m = BrownMap::new();
            for (k, v) in &data {
                m.insert(*k, *v);
            }
            black_box(m.len())
        })
    });
}

fn bench_lookup_int(c: &mut Criterion) {
    let data = int_dataset();

    let mut raclette = RacletteMap::new();
    let mut std = StdMap::new();
    let mut brown = BrownMap::new();
    for (k, v) in &data {
        raclette.insert(*k, *v);
        std.insert(*k, *v);
        brown.insert(*k, *v);
    }

    c.bench_function("lookup/int/raclette", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(raclette.get(k));
            }
        })
    });

    c.bench_function("lookup/int/std", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(std.get(k));
            }
        })
    });

    c.bench_function("lookup/int/hashbrown", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(brown.get(k));
            }
        })
    });
}

fn bench_insert_string(c: &mut Criterion) {
    let data = string_dataset();

    c.bench_function("insert/string/raclette", |b| {
        b.iter(|| {
            let mut m = RacletteMap::new();
            for (k, v) in &data {
                m.insert(k.clone(), *v);
            }
            black_box(m.len())
        })
    });

    c.bench_function("insert/string/std", |b| {
        b.iter(|| {
            let mut m = StdMap::new();
            for (k, v) in &data {
                m.insert(k.clone(), *v);
            }
            black_box(m.len())
        })
    });

    c.bench_function("insert/string/hashbrown", |b| {
        b.iter(|| {
            let mut m = BrownMap::new();
            for (k, v) in &data {
                m.insert(k.clone(), *v);
            }
            black_box(m.len())
        })
    });
}

fn bench_lookup_string(c: &mut Criterion) {
    let data = string_dataset();

    let mut raclette = RacletteMap::new();
    let mut std = StdMap::new();
    let mut brown = BrownMap::new();
    for (k, v) in &data {
        raclette.insert(k.clone(), *v);
        std.insert(k.clone(), *v);
        brown.insert(k.clone(), *v);
    }

    c.bench_function("lookup/string/raclette", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(raclette.get(k.as_str()));
            }
        })
    });

    c.bench_function("lookup/string/std", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(std.get(k.as_str()));
            }
        })
    });

    c.bench_function("lookup/string/hashbrown", |b| {
        b.iter(|| {
            for (k, _) in &data {
                black_box(brown.get(k.as_str()));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_insert_int,
    bench_lookup_int,
    bench_insert_string,
    bench_lookup_string
);
criterion_main!(benches);
