//! Snapshot persistence: save/open round trips, counter continuity, and
//! schema version enforcement.

use std::fs;

use snpstore::data::{Chromosome, Genotype, GenotypeCall};
use snpstore::{
    CounterKind, MapMeta, MarkerQuery, MarkerSpec, SampleId, SnpStore, StoreConfig, StoreError,
};

fn populate(store: &SnpStore) -> (snpstore::MapId, SampleId) {
    let ids = store
        .register_markers(
            (0..12)
                .map(|i| MarkerSpec::new(Chromosome(1), 100 + i).with_name(format!("rs{i}")))
                .collect(),
            snpstore::DuplicatePolicy::AlwaysCreate,
        )
        .unwrap();
    let map = store.create_map(MapMeta::named("chip")).unwrap();
    store.assign_markers(map, &ids).unwrap();

    let ind = store.register_individual(vec!["BR1".into()]).unwrap();
    store.add_sample(ind, map, "S1").unwrap();
    let sample = SampleId::from("S1");
    let calls = ids
        .iter()
        .map(|&m| GenotypeCall::new(m, Genotype::new(b'A', b'B')))
        .collect();
    store.write_sample_calls(map, &sample, calls).unwrap();
    (map, sample)
}

#[test]
fn save_open_round_trip_preserves_queries() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");

    let store = SnpStore::create(&root, StoreConfig {
        block_capacity: 5,
        batch_capacity: 8,
    })
    .unwrap();
    let (map, sample) = populate(&store);
    let stats = store.stats();
    let calls = store.sample_calls(map, &sample).unwrap();
    store.save().unwrap();
    drop(store);

    let reopened = SnpStore::open(&root).unwrap();
    assert_eq!(reopened.stats(), stats);
    assert_eq!(reopened.sample_calls(map, &sample).unwrap(), calls);
    assert_eq!(reopened.config().block_capacity, 5);
    reopened.verify_sample_coverage(map, &sample).unwrap();

    let hits = reopened.find_markers(&MarkerQuery::by_name("rs3"));
    assert_eq!(hits.len(), 1);
}

#[test]
fn counters_resume_without_reissuing_ids() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");

    let store = SnpStore::create(&root, StoreConfig::default()).unwrap();
    let before = store.allocate_id(CounterKind::Markers).unwrap();
    store.allocate_id(CounterKind::Markers).unwrap();
    store.save().unwrap();
    drop(store);

    let reopened = SnpStore::open(&root).unwrap();
    let after = reopened.allocate_id(CounterKind::Markers).unwrap();
    assert_eq!(before, 0);
    assert_eq!(after, 2);
}

#[test]
fn schema_version_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");

    let store = SnpStore::create(&root, StoreConfig::default()).unwrap();
    store.save().unwrap();
    drop(store);

    // Rewrite the manifest as a historical schema iteration.
    let manifest_path = root.join("manifest.json");
    let manifest = fs::read_to_string(&manifest_path).unwrap();
    let downgraded = manifest.replace(
        &format!("\"schema_version\": {}", snpstore::SCHEMA_VERSION),
        "\"schema_version\": 1",
    );
    assert_ne!(manifest, downgraded);
    fs::write(&manifest_path, downgraded).unwrap();

    let err = SnpStore::open(&root);
    assert!(matches!(
        err,
        Err(StoreError::SchemaVersionMismatch {
            found: 1,
            expected: snpstore::SCHEMA_VERSION
        })
    ));
}

#[test]
fn corrupt_snapshot_is_reported_not_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");

    let store = SnpStore::create(&root, StoreConfig::default()).unwrap();
    store.save().unwrap();
    drop(store);

    fs::write(root.join("snps.snap"), b"junk").unwrap();
    let err = SnpStore::open(&root);
    assert!(matches!(err, Err(StoreError::Corrupt { .. })));
}

#[test]
fn destroy_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");

    // Dropping a store that never existed is fine.
    SnpStore::destroy(&root).unwrap();

    SnpStore::create(&root, StoreConfig::default()).unwrap();
    SnpStore::destroy(&root).unwrap();
    assert!(!root.exists());
    SnpStore::destroy(&root).unwrap();

    // A directory that is not a store is left alone.
    let foreign = dir.path().join("not_a_store");
    fs::create_dir_all(&foreign).unwrap();
    fs::write(foreign.join("data.txt"), b"keep me").unwrap();
    SnpStore::destroy(&foreign).unwrap();
    assert!(foreign.join("data.txt").exists());
}

#[test]
fn in_memory_store_refuses_to_save() {
    let store = SnpStore::in_memory(StoreConfig::default()).unwrap();
    assert!(matches!(
        store.save(),
        Err(StoreError::InvalidConfig { .. })
    ));
}
