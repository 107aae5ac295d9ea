//! # Store Facade
//!
//! `SnpStore` ties the registries, the identifier allocator, and the schema
//! lifecycle together. Cross-collection operations (assigning a marker list
//! touches maps and markers; importing a sample touches samples and blocks)
//! run as sequences of single-collection mutations — there are no
//! multi-document transactions, matching the guarantees of the document
//! stores this model targets.
//!
//! ## Schema lifecycle
//! A store directory is created exactly once (`create`), reopened any number
//! of times (`open`), and dropped wholesale (`destroy`). The manifest
//! records an explicit `schema_version`; opening a directory written by a
//! different schema version fails instead of guessing.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::data::{
    BlockNumber, GenotypeBlock, GenotypeCall, Individual, IndividualId, MapId, MapMeta, Marker,
    MarkerId, MarkerMap, MarkerSpec, Sample, SampleId, SampleKey,
};
use crate::error::{Result, StoreError};
use crate::registry::{
    DuplicatePolicy, GenotypeBlockStore, IndividualQuery, IndividualRegistry, MapQuery,
    MapRegistry, MarkerQuery, MarkerRegistry,
};
use crate::store::{snapshot, CounterKind, CounterTable};

/// Version of the persisted schema this build reads and writes
pub const SCHEMA_VERSION: u32 = 3;

const MANIFEST_FILE: &str = "manifest.json";
const COUNTERS_FILE: &str = "counters.snap";
const MARKERS_FILE: &str = "snps.snap";
const MAPS_FILE: &str = "maps.snap";
const INDIVIDUALS_FILE: &str = "individuals.snap";
const BLOCKS_FILE: &str = "snpblocks.snap";

/// Store manifest, written once at schema creation
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
    config: StoreConfig,
}

/// Collection sizes, for reporting and tests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub num_markers: usize,
    pub num_maps: usize,
    pub num_individuals: usize,
    pub num_samples: usize,
    pub num_blocks: usize,
}

/// The SNP genotype store
pub struct SnpStore {
    root: Option<PathBuf>,
    config: StoreConfig,
    counters: Arc<CounterTable>,
    markers: MarkerRegistry,
    maps: MapRegistry,
    individuals: IndividualRegistry,
    genotypes: GenotypeBlockStore,
}

impl SnpStore {
    /// An ephemeral store with no backing directory
    pub fn in_memory(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let counters = Arc::new(CounterTable::new());
        for kind in CounterKind::ALL {
            counters.provision(kind);
        }
        Ok(Self {
            root: None,
            config,
            markers: MarkerRegistry::new(Arc::clone(&counters)),
            maps: MapRegistry::new(Arc::clone(&counters), &config),
            individuals: IndividualRegistry::new(Arc::clone(&counters)),
            genotypes: GenotypeBlockStore::new(),
            counters,
        })
    }

    /// Create the schema at `root` and return the opened store
    ///
    /// Must run exactly once per directory, before any data load; a
    /// directory that already holds a manifest is rejected.
    pub fn create(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let root = root.into();
        config.validate()?;

        let manifest_path = root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(StoreError::SchemaAlreadyExists { path: root });
        }
        fs::create_dir_all(&root)?;

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            config,
        };
        let file = File::create(&manifest_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &manifest)
            .map_err(|e| StoreError::corrupt(&manifest_path, e.to_string()))?;

        let mut store = Self::in_memory(config)?;
        store.root = Some(root.clone());
        store.save()?;
        info!(path = %root.display(), "created schema");
        Ok(store)
    }

    /// Open an existing store directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE);
        let file = File::open(&manifest_path)?;
        let manifest: Manifest = serde_json::from_reader(file)
            .map_err(|e| StoreError::corrupt(&manifest_path, e.to_string()))?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionMismatch {
                found: manifest.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let mut store = Self::in_memory(manifest.config)?;
        store.counters.restore(snapshot::read_snapshot(&root.join(COUNTERS_FILE))?);
        // Counter rows added after a snapshot was taken still start at zero.
        for kind in CounterKind::ALL {
            store.counters.provision(kind);
        }
        store.markers.restore(snapshot::read_snapshot(&root.join(MARKERS_FILE))?);
        store.maps.restore(snapshot::read_snapshot(&root.join(MAPS_FILE))?)?;
        store
            .individuals
            .restore(snapshot::read_snapshot(&root.join(INDIVIDUALS_FILE))?)?;
        store
            .genotypes
            .restore(snapshot::read_snapshot(&root.join(BLOCKS_FILE))?);

        store.root = Some(root.clone());
        info!(path = %root.display(), "opened store");
        Ok(store)
    }

    /// Snapshot every collection to the store directory
    pub fn save(&self) -> Result<()> {
        let root = self.root.as_ref().ok_or_else(|| {
            StoreError::invalid_config("in-memory store has no directory to save to")
        })?;
        snapshot::write_snapshot(&root.join(COUNTERS_FILE), &self.counters.snapshot())?;
        snapshot::write_snapshot(&root.join(MARKERS_FILE), &self.markers.snapshot())?;
        snapshot::write_snapshot(&root.join(MAPS_FILE), &self.maps.snapshot())?;
        snapshot::write_snapshot(&root.join(INDIVIDUALS_FILE), &self.individuals.snapshot())?;
        snapshot::write_snapshot(&root.join(BLOCKS_FILE), &self.genotypes.snapshot())?;
        debug!(path = %root.display(), "saved snapshots");
        Ok(())
    }

    /// Drop the schema at `root`
    ///
    /// A missing directory, or a directory without a manifest, is a no-op,
    /// so test environments can always tear down unconditionally. A
    /// directory that was never a store is left alone.
    pub fn destroy(root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        if !root.join(MANIFEST_FILE).exists() {
            return Ok(());
        }
        fs::remove_dir_all(root)?;
        info!(path = %root.display(), "destroyed schema");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identifier allocation
    // ------------------------------------------------------------------

    /// Allocate the next identifier for an entity kind
    pub fn allocate_id(&self, kind: CounterKind) -> Result<u64> {
        self.counters.allocate(kind)
    }

    // ------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------

    /// Register one marker
    pub fn register_marker(&self, spec: MarkerSpec) -> Result<MarkerId> {
        self.markers.register(spec)
    }

    /// Register many markers under a duplicate policy
    pub fn register_markers(
        &self,
        specs: Vec<MarkerSpec>,
        policy: DuplicatePolicy,
    ) -> Result<Vec<MarkerId>> {
        self.markers.register_bulk(specs, policy)
    }

    /// Search markers
    pub fn find_markers(&self, query: &MarkerQuery) -> Vec<Marker> {
        self.markers.find(query)
    }

    /// Fetch one marker
    pub fn marker(&self, id: MarkerId) -> Result<Marker> {
        self.markers.get(id)
    }

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------

    /// Create an empty map
    pub fn create_map(&self, meta: MapMeta) -> Result<MapId> {
        self.maps.create(meta)
    }

    /// Assign a map's marker list and record the membership on each marker
    ///
    /// Runs as two single-collection mutations: the marker catalog gains the
    /// map references first, then the map gains its batches. A failure
    /// between the two leaves extra `map_refs` behind but never a
    /// half-populated map.
    pub fn assign_markers(&self, map: MapId, marker_ids: &[MarkerId]) -> Result<()> {
        if self.maps.get(map)?.is_populated() {
            return Err(StoreError::MapAlreadyPopulated(map.as_u64()));
        }
        self.markers.append_map_ref(marker_ids, map)?;
        self.maps.assign_markers(map, marker_ids)
    }

    /// Search maps
    pub fn find_maps(&self, query: &MapQuery) -> Vec<MarkerMap> {
        self.maps.find(query)
    }

    /// Fetch one map
    pub fn map(&self, id: MapId) -> Result<MarkerMap> {
        self.maps.get(id)
    }

    /// The map's marker ids in canonical order
    pub fn map_marker_ids(&self, map: MapId) -> Result<Vec<MarkerId>> {
        self.maps.marker_ids(map)
    }

    // ------------------------------------------------------------------
    // Individuals and samples
    // ------------------------------------------------------------------

    /// Register an individual under its external identifiers
    pub fn register_individual(&self, external_ids: Vec<String>) -> Result<IndividualId> {
        self.individuals.register(external_ids)
    }

    /// Add an alias to an existing individual
    pub fn add_external_id(&self, individual: IndividualId, external: String) -> Result<()> {
        self.individuals.add_external_id(individual, external)
    }

    /// Create a sample for an individual on a map
    pub fn add_sample(
        &self,
        individual: IndividualId,
        map: MapId,
        sample: impl Into<SampleId>,
    ) -> Result<SampleKey> {
        self.maps.get(map)?;
        self.individuals.add_sample(individual, map, sample)
    }

    /// Create a sample with no owning individual
    pub fn register_sample(&self, map: MapId, sample: impl Into<SampleId>) -> Result<SampleKey> {
        self.maps.get(map)?;
        self.individuals.register_sample(map, sample)
    }

    /// Link an existing sample to an individual
    pub fn claim_sample(&self, individual: IndividualId, key: &SampleKey) -> Result<()> {
        self.individuals.claim_sample(individual, key)
    }

    /// Search individuals
    pub fn find_individuals(&self, query: &IndividualQuery) -> Vec<Individual> {
        self.individuals.find(query)
    }

    /// Search samples by map and/or within-map id
    pub fn find_samples(&self, map: Option<MapId>, id: Option<&SampleId>) -> Vec<Sample> {
        self.individuals.find_samples(map, id)
    }

    // ------------------------------------------------------------------
    // Genotype blocks
    // ------------------------------------------------------------------

    /// Write one genotype block
    ///
    /// The caller owns the blocking; writes to the same block number are
    /// last-writer-wins. The call list must fit the map's block capacity.
    pub fn write_block(
        &self,
        map: MapId,
        sample: impl Into<SampleId>,
        number: BlockNumber,
        calls: Vec<GenotypeCall>,
    ) -> Result<()> {
        let sample = sample.into();
        let doc = self.maps.get(map)?;
        if !self.individuals.sample_exists(map, &sample) {
            return Err(StoreError::SampleNotFound {
                map: map.as_u64(),
                sample: sample.to_string(),
            });
        }
        self.genotypes.write_block(
            GenotypeBlock {
                map,
                sample,
                number,
                calls,
            },
            doc.block_capacity,
        )
    }

    /// Calls of one block
    pub fn read_block(
        &self,
        map: MapId,
        sample: &SampleId,
        number: BlockNumber,
    ) -> Result<Vec<GenotypeCall>> {
        self.genotypes.read_block(map, sample, number)
    }

    /// Concatenation of the given blocks' calls, in the order given
    pub fn read_range(
        &self,
        map: MapId,
        sample: &SampleId,
        numbers: &[BlockNumber],
    ) -> Result<Vec<GenotypeCall>> {
        self.genotypes.read_range(map, sample, numbers)
    }

    /// Import a sample's full genotype, blocking it automatically
    ///
    /// The calls must cover the map's marker set exactly. They are sorted by
    /// marker id and split into contiguous blocks from zero, so the lead
    /// call of every block is a lower bound for the block's markers.
    pub fn write_sample_calls(
        &self,
        map: MapId,
        sample: &SampleId,
        mut calls: Vec<GenotypeCall>,
    ) -> Result<()> {
        let doc = self.maps.get(map)?;
        if !self.individuals.sample_exists(map, sample) {
            return Err(StoreError::SampleNotFound {
                map: map.as_u64(),
                sample: sample.to_string(),
            });
        }
        if calls.len() != doc.num_markers {
            return Err(StoreError::GenotypeLengthMismatch {
                expected: doc.num_markers,
                actual: calls.len(),
            });
        }

        calls.par_sort_unstable_by_key(|c| c.marker);

        let mut expected = self.maps.marker_ids(map)?;
        expected.par_sort_unstable();
        if let Some(position) = calls
            .iter()
            .zip(&expected)
            .position(|(call, id)| call.marker != *id)
        {
            return Err(StoreError::GenotypeCallMismatch { position });
        }

        let mut number = BlockNumber(0);
        for chunk in calls.chunks(doc.block_capacity) {
            self.genotypes.write_block(
                GenotypeBlock {
                    map,
                    sample: sample.clone(),
                    number,
                    calls: chunk.to_vec(),
                },
                doc.block_capacity,
            )?;
            number = number.next();
        }
        debug!(
            map = map.as_u64(),
            sample = %sample,
            blocks = number.as_u32(),
            "imported sample genotype"
        );
        Ok(())
    }

    /// A sample's full genotype in the map's canonical marker order
    pub fn sample_calls(&self, map: MapId, sample: &SampleId) -> Result<Vec<GenotypeCall>> {
        let doc = self.maps.get(map)?;
        let blocks = self.genotypes.blocks_of_sample(map, sample);
        if blocks.is_empty() {
            return Err(StoreError::SampleNotFound {
                map: map.as_u64(),
                sample: sample.to_string(),
            });
        }

        let mut by_marker = std::collections::HashMap::new();
        let mut total = 0;
        for block in &blocks {
            total += block.calls.len();
            for call in &block.calls {
                by_marker.insert(call.marker, call.genotype);
            }
        }
        if total != doc.num_markers || by_marker.len() != doc.num_markers {
            return Err(StoreError::GenotypeLengthMismatch {
                expected: doc.num_markers,
                actual: total,
            });
        }

        // Restore the panel's import order from the batch lists.
        self.maps
            .marker_ids(map)?
            .into_iter()
            .enumerate()
            .map(|(position, marker)| {
                by_marker
                    .get(&marker)
                    .map(|&genotype| GenotypeCall { marker, genotype })
                    .ok_or(StoreError::GenotypeCallMismatch { position })
            })
            .collect()
    }

    /// Fetch a single call of a sample
    ///
    /// Fast path: the marker's rank in the map's id-sorted order gives the
    /// block number and offset directly. When a caller blocked the sample by
    /// hand and the arithmetic does not land on the marker, the lead-call
    /// index narrows the search to the one block that can contain it and
    /// that block is scanned in memory.
    pub fn find_call(
        &self,
        map: MapId,
        sample: &SampleId,
        marker: MarkerId,
    ) -> Result<GenotypeCall> {
        let doc = self.maps.get(map)?;
        let rank = self
            .maps
            .marker_rank(map, marker)?
            .ok_or(StoreError::MarkerNotFound(marker.as_u64()))?;

        let number = BlockNumber((rank / doc.block_capacity) as u32);
        let offset = rank % doc.block_capacity;
        if let Ok(calls) = self.genotypes.read_block(map, sample, number) {
            if let Some(call) = calls.get(offset) {
                if call.marker == marker {
                    return Ok(*call);
                }
            }
            // Irregular blocking: fall back to the lead-call index.
            if let Some(call) = self.scan_for_call(map, sample, marker) {
                return Ok(call);
            }
        } else if let Some(call) = self.scan_for_call(map, sample, marker) {
            return Ok(call);
        }

        Err(StoreError::BlockNotFound {
            map: map.as_u64(),
            sample: sample.to_string(),
            block: number.as_u32(),
        })
    }

    fn scan_for_call(
        &self,
        map: MapId,
        sample: &SampleId,
        marker: MarkerId,
    ) -> Option<GenotypeCall> {
        let number = self.genotypes.locate_block(map, sample, marker)?;
        let calls = self.genotypes.read_block(map, sample, number).ok()?;
        calls.into_iter().find(|c| c.marker == marker)
    }

    /// Check the block invariants for one sample
    ///
    /// Block numbers must be contiguous from zero and the union of all
    /// blocks' markers must equal the map's marker set, each exactly once.
    pub fn verify_sample_coverage(&self, map: MapId, sample: &SampleId) -> Result<()> {
        let doc = self.maps.get(map)?;
        let blocks = self.genotypes.blocks_of_sample(map, sample);

        for (expected, block) in blocks.iter().enumerate() {
            if block.number.as_u32() as usize != expected {
                return Err(StoreError::BlockNotFound {
                    map: map.as_u64(),
                    sample: sample.to_string(),
                    block: expected as u32,
                });
            }
        }

        let mut seen: Vec<MarkerId> = blocks
            .iter()
            .flat_map(|b| b.calls.iter().map(|c| c.marker))
            .collect();
        if seen.len() != doc.num_markers {
            return Err(StoreError::GenotypeLengthMismatch {
                expected: doc.num_markers,
                actual: seen.len(),
            });
        }
        seen.par_sort_unstable();

        let mut expected = self.maps.marker_ids(map)?;
        expected.par_sort_unstable();
        if let Some(position) = seen
            .iter()
            .zip(&expected)
            .position(|(s, e)| s != e)
        {
            return Err(StoreError::GenotypeCallMismatch { position });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Collection sizes
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            num_markers: self.markers.len(),
            num_maps: self.maps.len(),
            num_individuals: self.individuals.len(),
            num_samples: self.individuals.num_samples(),
            num_blocks: self.genotypes.len(),
        }
    }

    /// The store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The store directory, if any
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}
