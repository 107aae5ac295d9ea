use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use snpstore::data::{Chromosome, Genotype, GenotypeCall};
use snpstore::{
    DuplicatePolicy, MapMeta, MarkerId, MarkerSpec, SampleId, SnpStore, StoreConfig,
};

fn store_with_map(n_markers: u32, block_capacity: usize) -> (SnpStore, snpstore::MapId, Vec<MarkerId>) {
    let store = SnpStore::in_memory(StoreConfig {
        block_capacity,
        batch_capacity: 100_000,
    })
    .expect("in-memory store");

    let ids = store
        .register_markers(
            (0..n_markers)
                .map(|i| MarkerSpec::new(Chromosome(1), 1_000 + i))
                .collect(),
            DuplicatePolicy::AlwaysCreate,
        )
        .expect("register markers");
    let map = store.create_map(MapMeta::default()).expect("create map");
    store.assign_markers(map, &ids).expect("assign markers");
    let ind = store
        .register_individual(vec!["BENCH".into()])
        .expect("register individual");
    store.add_sample(ind, map, "S1").expect("add sample");
    (store, map, ids)
}

fn calls(ids: &[MarkerId]) -> Vec<GenotypeCall> {
    ids.iter()
        .map(|&m| GenotypeCall::new(m, Genotype::new(b'A', b'B')))
        .collect()
}

/// Benchmark whole-sample import at different block capacities
fn bench_sample_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_import");

    for block_capacity in [1_000usize, 10_000] {
        let n_markers = 50_000u32;
        group.throughput(Throughput::Elements(n_markers as u64));

        group.bench_with_input(
            BenchmarkId::new("block_capacity", block_capacity),
            &block_capacity,
            |b, &block_capacity| {
                let (store, map, ids) = store_with_map(n_markers, block_capacity);
                let sample = SampleId::from("S1");
                let calls = calls(&ids);

                b.iter(|| {
                    store
                        .write_sample_calls(black_box(map), black_box(&sample), calls.clone())
                        .expect("import");
                })
            },
        );
    }

    group.finish();
}

/// Benchmark single-call lookup through the rank path
fn bench_find_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_call");

    let n_markers = 50_000u32;
    let (store, map, ids) = store_with_map(n_markers, 10_000);
    let sample = SampleId::from("S1");
    store
        .write_sample_calls(map, &sample, calls(&ids))
        .expect("import");

    group.throughput(Throughput::Elements(1));
    group.bench_function("rank_path", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let marker = ids[i % ids.len()];
            i = i.wrapping_add(7_919);
            store
                .find_call(black_box(map), black_box(&sample), black_box(marker))
                .expect("call")
        })
    });

    group.finish();
}

criterion_group!(benches, bench_sample_import, bench_find_call);
criterion_main!(benches);
