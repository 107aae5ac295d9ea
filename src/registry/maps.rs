//! # Map Registry
//!
//! Panels and their marker lists. A map's marker list is never embedded in
//! the map document: it is split across `MapBatch` documents of at most
//! `batch_capacity` ids, keyed `(map, batch_index)` with index-enforced
//! uniqueness, so per-document size stays bounded and random access by batch
//! index stays cheap. Each batch carries a sorted mirror of its slice,
//! refreshed at assignment time, so membership and rank queries
//! binary-search rather than re-sort on every read.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StoreConfig;
use crate::data::{MapBatch, MapId, MapMeta, MarkerId, MarkerMap};
use crate::error::{Result, StoreError};
use crate::store::{CounterKind, CounterTable, UniqueIndex};

/// Search predicate for maps; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct MapQuery {
    pub id: Option<MapId>,
    pub name: Option<String>,
    pub format: Option<String>,
    pub min_markers: Option<usize>,
    pub max_markers: Option<usize>,
}

impl MapQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            ..Self::default()
        }
    }

    fn matches(&self, map: &MarkerMap) -> bool {
        if let Some(id) = self.id {
            if map.id != id {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if map.name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(format) = &self.format {
            if map.format.as_deref() != Some(format.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_markers {
            if map.num_markers < min {
                return false;
            }
        }
        if let Some(max) = self.max_markers {
            if map.num_markers > max {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct MapState {
    docs: BTreeMap<MapId, MarkerMap>,
    batches: UniqueIndex<(MapId, u32), MapBatch>,
    by_name: UniqueIndex<String, MapId>,
}

/// The `maps` and `mapsnps` collections
pub struct MapRegistry {
    counters: Arc<CounterTable>,
    batch_capacity: usize,
    default_block_capacity: usize,
    inner: RwLock<MapState>,
}

impl MapRegistry {
    pub fn new(counters: Arc<CounterTable>, config: &StoreConfig) -> Self {
        Self {
            counters,
            batch_capacity: config.batch_capacity,
            default_block_capacity: config.block_capacity,
            inner: RwLock::new(MapState::default()),
        }
    }

    /// Create an empty map, minting a fresh id
    pub fn create(&self, meta: MapMeta) -> Result<MapId> {
        let block_capacity = meta.block_capacity.unwrap_or(self.default_block_capacity);
        if block_capacity == 0 {
            return Err(StoreError::invalid_config("map block_capacity must be > 0"));
        }

        let mut state = self.write();
        if let Some(name) = &meta.name {
            if state.by_name.contains(name) {
                return Err(StoreError::duplicate("maps", name.clone()));
            }
        }

        let id = MapId(self.counters.allocate(CounterKind::Maps)?);
        if let Some(name) = &meta.name {
            // Reserved above under the same write lock, so this cannot race.
            let _ = state.by_name.insert(name.clone(), id);
        }
        state.docs.insert(
            id,
            MarkerMap {
                id,
                name: meta.name,
                format: meta.format,
                num_markers: 0,
                block_capacity,
            },
        );
        Ok(id)
    }

    /// Assign the map's marker list, splitting it into batches
    ///
    /// One-shot: maps are immutable once populated, a second assignment
    /// fails with `MapAlreadyPopulated`.
    pub fn assign_markers(&self, map: MapId, marker_ids: &[MarkerId]) -> Result<()> {
        let mut state = self.write();
        let doc = state
            .docs
            .get(&map)
            .ok_or(StoreError::MapNotFound(map.as_u64()))?;
        if doc.is_populated() {
            return Err(StoreError::MapAlreadyPopulated(map.as_u64()));
        }

        let mut batches = Vec::new();
        for (index, chunk) in marker_ids.chunks(self.batch_capacity).enumerate() {
            let mut sorted_markers = chunk.to_vec();
            sorted_markers.par_sort_unstable();
            batches.push(MapBatch {
                map,
                index: index as u32,
                markers: chunk.to_vec(),
                sorted_markers,
            });
        }

        for batch in batches {
            let key = (map, batch.index);
            state
                .batches
                .insert(key, batch)
                .map_err(|(m, i)| StoreError::duplicate("mapsnps", format!("({m}, {i})")))?;
        }
        if let Some(doc) = state.docs.get_mut(&map) {
            doc.num_markers = marker_ids.len();
        }

        debug!(
            map = map.as_u64(),
            markers = marker_ids.len(),
            batches = marker_ids.len().div_ceil(self.batch_capacity),
            "assigned marker list"
        );
        Ok(())
    }

    /// Fetch one map by id
    pub fn get(&self, map: MapId) -> Result<MarkerMap> {
        self.read()
            .docs
            .get(&map)
            .cloned()
            .ok_or(StoreError::MapNotFound(map.as_u64()))
    }

    /// The map's marker ids in canonical (panel) order
    pub fn marker_ids(&self, map: MapId) -> Result<Vec<MarkerId>> {
        let state = self.read();
        let doc = state
            .docs
            .get(&map)
            .ok_or(StoreError::MapNotFound(map.as_u64()))?;
        let mut ids = Vec::with_capacity(doc.num_markers);
        for (_, batch) in state.batches.range((map, 0)..=(map, u32::MAX)) {
            ids.extend_from_slice(&batch.markers);
        }
        Ok(ids)
    }

    /// The per-batch sorted mirrors, concatenated in batch order
    pub fn sorted_marker_ids(&self, map: MapId) -> Result<Vec<MarkerId>> {
        let state = self.read();
        let doc = state
            .docs
            .get(&map)
            .ok_or(StoreError::MapNotFound(map.as_u64()))?;
        let mut ids = Vec::with_capacity(doc.num_markers);
        for (_, batch) in state.batches.range((map, 0)..=(map, u32::MAX)) {
            ids.extend_from_slice(&batch.sorted_markers);
        }
        Ok(ids)
    }

    /// Batch documents of a map, in batch order
    pub fn batches(&self, map: MapId) -> Result<Vec<MapBatch>> {
        let state = self.read();
        if !state.docs.contains_key(&map) {
            return Err(StoreError::MapNotFound(map.as_u64()));
        }
        Ok(state
            .batches
            .range((map, 0)..=(map, u32::MAX))
            .map(|(_, b)| b.clone())
            .collect())
    }

    /// True if the map's marker list contains `marker`
    pub fn contains_marker(&self, map: MapId, marker: MarkerId) -> bool {
        self.read()
            .batches
            .range((map, 0)..=(map, u32::MAX))
            .any(|(_, batch)| batch.contains(marker))
    }

    /// Rank of `marker` in the map's id-sorted marker order
    ///
    /// The rank is the number of assigned marker ids strictly below the
    /// target, summed over the per-batch sorted mirrors, so it is global
    /// even though each mirror only sorts its own slice. `None` when the
    /// marker is not assigned to the map.
    pub fn marker_rank(&self, map: MapId, marker: MarkerId) -> Result<Option<usize>> {
        let state = self.read();
        if !state.docs.contains_key(&map) {
            return Err(StoreError::MapNotFound(map.as_u64()));
        }

        let mut rank = 0;
        let mut present = false;
        for (_, batch) in state.batches.range((map, 0)..=(map, u32::MAX)) {
            rank += batch.rank_below(marker);
            present |= batch.contains(marker);
        }
        Ok(present.then_some(rank))
    }

    /// Search maps, in id order
    pub fn find(&self, query: &MapQuery) -> Vec<MarkerMap> {
        let state = self.read();
        if let Some(id) = query.id {
            return state
                .docs
                .get(&id)
                .filter(|m| query.matches(m))
                .cloned()
                .into_iter()
                .collect();
        }
        if let Some(name) = &query.name {
            return state
                .by_name
                .get(name)
                .and_then(|id| state.docs.get(id))
                .filter(|m| query.matches(m))
                .cloned()
                .into_iter()
                .collect();
        }
        state
            .docs
            .values()
            .filter(|m| query.matches(m))
            .cloned()
            .collect()
    }

    /// Number of maps
    pub fn len(&self) -> usize {
        self.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().docs.is_empty()
    }

    /// Documents only; the name index is rebuilt on restore
    pub fn snapshot(&self) -> MapSnapshot {
        let state = self.read();
        MapSnapshot {
            maps: state.docs.values().cloned().collect(),
            batches: state.batches.iter().map(|(_, b)| b.clone()).collect(),
        }
    }

    pub fn restore(&self, snapshot: MapSnapshot) -> Result<()> {
        let mut state = self.write();
        *state = MapState::default();
        for map in snapshot.maps {
            if let Some(name) = &map.name {
                let _ = state.by_name.insert(name.clone(), map.id);
            }
            state.docs.insert(map.id, map);
        }
        for batch in snapshot.batches {
            let key = (batch.map, batch.index);
            state
                .batches
                .insert(key, batch)
                .map_err(|(m, i)| StoreError::duplicate("mapsnps", format!("({m}, {i})")))?;
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, MapState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MapState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persisted form of the `maps` and `mapsnps` collections
#[derive(Serialize, Deserialize)]
pub struct MapSnapshot {
    maps: Vec<MarkerMap>,
    batches: Vec<MapBatch>,
}
