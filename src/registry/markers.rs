//! # Marker Registry
//!
//! The canonical catalog of genetic markers. The dominant query shape for
//! genomic tools is "all markers on chromosome C between positions P1 and
//! P2", so the `(chromosome, position)` compound index is mandatory and
//! chromosome-first: position ranges become contiguous key ranges. Alias
//! lookup runs on a separate multikey index because panel naming schemes are
//! not 1:1 with genomic position, and `(chromosome, position)` itself is
//! deliberately not unique.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Chromosome, MapId, Marker, MarkerId, MarkerSpec, Position};
use crate::error::{Result, StoreError};
use crate::store::{CounterKind, CounterTable, MultiIndex};

/// How bulk registration treats markers whose `(chromosome, position)` is
/// already cataloged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Always mint a new marker id
    AlwaysCreate,
    /// Reuse an existing marker when exactly one co-located marker exists;
    /// ambiguous positions (several co-located markers) mint a new id
    ReuseExisting,
}

/// Search predicate for markers; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct MarkerQuery {
    pub id: Option<MarkerId>,
    pub name: Option<String>,
    pub chromosome: Option<Chromosome>,
    pub min_chromosome: Option<Chromosome>,
    pub max_chromosome: Option<Chromosome>,
    pub min_position: Option<Position>,
    pub max_position: Option<Position>,
    pub map: Option<MapId>,
}

impl MarkerQuery {
    pub fn by_id(id: MarkerId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn on_chromosome(chromosome: Chromosome) -> Self {
        Self {
            chromosome: Some(chromosome),
            ..Self::default()
        }
    }

    pub fn in_map(map: MapId) -> Self {
        Self {
            map: Some(map),
            ..Self::default()
        }
    }

    pub fn position_range(mut self, min: Position, max: Position) -> Self {
        self.min_position = Some(min);
        self.max_position = Some(max);
        self
    }

    pub fn chromosome_range(mut self, min: Chromosome, max: Chromosome) -> Self {
        self.min_chromosome = Some(min);
        self.max_chromosome = Some(max);
        self
    }

    fn matches(&self, marker: &Marker) -> bool {
        if let Some(id) = self.id {
            if marker.id != id {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !marker.has_name(name) {
                return false;
            }
        }
        if let Some(chrom) = self.chromosome {
            if marker.chromosome != chrom {
                return false;
            }
        }
        if let Some(min) = self.min_chromosome {
            if marker.chromosome < min {
                return false;
            }
        }
        if let Some(max) = self.max_chromosome {
            if marker.chromosome > max {
                return false;
            }
        }
        if let Some(min) = self.min_position {
            if marker.position < min {
                return false;
            }
        }
        if let Some(max) = self.max_position {
            if marker.position > max {
                return false;
            }
        }
        if let Some(map) = self.map {
            if !marker.in_map(map) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct MarkerState {
    docs: BTreeMap<MarkerId, Marker>,
    by_position: MultiIndex<(Chromosome, Position), MarkerId>,
    by_name: MultiIndex<String, MarkerId>,
    by_map: MultiIndex<MapId, MarkerId>,
}

impl MarkerState {
    fn index(&mut self, marker: &Marker) {
        self.by_position
            .insert((marker.chromosome, marker.position), marker.id);
        for name in &marker.names {
            self.by_name.insert(name.clone(), marker.id);
        }
        for &map in &marker.map_refs {
            self.by_map.insert(map, marker.id);
        }
    }
}

/// The `snps` collection
pub struct MarkerRegistry {
    counters: Arc<CounterTable>,
    inner: RwLock<MarkerState>,
}

impl MarkerRegistry {
    pub fn new(counters: Arc<CounterTable>) -> Self {
        Self {
            counters,
            inner: RwLock::new(MarkerState::default()),
        }
    }

    /// Register one marker, minting a fresh id
    pub fn register(&self, spec: MarkerSpec) -> Result<MarkerId> {
        let id = MarkerId(self.counters.allocate(CounterKind::Markers)?);
        let marker = Marker {
            id,
            names: spec.names,
            chromosome: spec.chromosome,
            position: spec.position,
            map_refs: Vec::new(),
            attrs: spec.attrs,
        };

        let mut state = self.write();
        state.index(&marker);
        state.docs.insert(id, marker);
        Ok(id)
    }

    /// Register many markers at once, reserving their id range up front
    ///
    /// Under `ReuseExisting`, a spec whose `(chromosome, position)` matches
    /// exactly one cataloged marker resolves to that marker's id and no new
    /// document is created.
    pub fn register_bulk(
        &self,
        specs: Vec<MarkerSpec>,
        policy: DuplicatePolicy,
    ) -> Result<Vec<MarkerId>> {
        let mut state = self.write();

        // Resolve reuse before allocating so the reserved range covers
        // exactly the markers actually created.
        let mut reused: Vec<Option<MarkerId>> = Vec::with_capacity(specs.len());
        for spec in &specs {
            let existing = match policy {
                DuplicatePolicy::AlwaysCreate => None,
                DuplicatePolicy::ReuseExisting => {
                    let mut co_located = state
                        .by_position
                        .get(&(spec.chromosome, spec.position))
                        .copied();
                    match (co_located.next(), co_located.next()) {
                        (Some(id), None) => Some(id),
                        _ => None,
                    }
                }
            };
            reused.push(existing);
        }

        let num_new = reused.iter().filter(|r| r.is_none()).count() as u64;
        let mut next_id = self.counters.allocate_many(CounterKind::Markers, num_new)?;

        let mut ids = Vec::with_capacity(specs.len());
        for (spec, existing) in specs.into_iter().zip(reused) {
            match existing {
                Some(id) => ids.push(id),
                None => {
                    let id = MarkerId(next_id);
                    next_id += 1;
                    let marker = Marker {
                        id,
                        names: spec.names,
                        chromosome: spec.chromosome,
                        position: spec.position,
                        map_refs: Vec::new(),
                        attrs: spec.attrs,
                    };
                    state.index(&marker);
                    state.docs.insert(id, marker);
                    ids.push(id);
                }
            }
        }

        debug!(
            total = ids.len(),
            created = num_new,
            "registered marker batch"
        );
        Ok(ids)
    }

    /// Fetch one marker by id
    pub fn get(&self, id: MarkerId) -> Result<Marker> {
        self.read()
            .docs
            .get(&id)
            .cloned()
            .ok_or(StoreError::MarkerNotFound(id.as_u64()))
    }

    /// Record that `map` incorporates every marker in `markers` (append-only)
    ///
    /// All ids are validated before the first mutation so a bad list leaves
    /// the collection untouched.
    pub fn append_map_ref(&self, markers: &[MarkerId], map: MapId) -> Result<()> {
        let mut state = self.write();
        if let Some(missing) = markers.iter().find(|&&id| !state.docs.contains_key(&id)) {
            return Err(StoreError::MarkerNotFound(missing.as_u64()));
        }
        for &id in markers {
            if let Some(marker) = state.docs.get_mut(&id) {
                if !marker.map_refs.contains(&map) {
                    marker.map_refs.push(map);
                }
            }
        }
        for &id in markers {
            state.by_map.insert(map, id);
        }
        Ok(())
    }

    /// Search markers; results come back in `(chromosome, position, id)` order
    pub fn find(&self, query: &MarkerQuery) -> Vec<Marker> {
        let state = self.read();

        // Index selection: the narrowest applicable access path wins; the
        // residual predicate then filters the candidates.
        let candidates: Vec<MarkerId> = if let Some(id) = query.id {
            state.docs.get(&id).map(|m| m.id).into_iter().collect()
        } else if let Some(name) = &query.name {
            state.by_name.get(name).copied().collect()
        } else if let Some(chrom) = query.chromosome {
            let lo = (chrom, query.min_position.unwrap_or(0));
            let hi = (chrom, query.max_position.unwrap_or(Position::MAX));
            state.by_position.range(lo..=hi).copied().collect()
        } else if query.min_chromosome.is_some() || query.max_chromosome.is_some() {
            let lo = (query.min_chromosome.unwrap_or(Chromosome(0)), 0);
            let hi = (
                query.max_chromosome.unwrap_or(Chromosome(u8::MAX)),
                Position::MAX,
            );
            state.by_position.range(lo..=hi).copied().collect()
        } else if let Some(map) = query.map {
            state.by_map.get(&map).copied().collect()
        } else {
            state.docs.keys().copied().collect()
        };

        let mut hits: Vec<Marker> = candidates
            .into_iter()
            .filter_map(|id| state.docs.get(&id))
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        hits.sort_by_key(|m| (m.chromosome, m.position, m.id));
        hits.dedup_by_key(|m| m.id);
        hits
    }

    /// Number of cataloged markers
    pub fn len(&self) -> usize {
        self.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().docs.is_empty()
    }

    /// Documents only; indexes are rebuilt on restore
    pub fn snapshot(&self) -> MarkerSnapshot {
        MarkerSnapshot {
            markers: self.read().docs.values().cloned().collect(),
        }
    }

    pub fn restore(&self, snapshot: MarkerSnapshot) {
        let mut state = self.write();
        *state = MarkerState::default();
        for marker in snapshot.markers {
            state.index(&marker);
            state.docs.insert(marker.id, marker);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MarkerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MarkerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persisted form of the `snps` collection
#[derive(Serialize, Deserialize)]
pub struct MarkerSnapshot {
    markers: Vec<Marker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MarkerRegistry {
        let counters = Arc::new(CounterTable::new());
        counters.provision(CounterKind::Markers);
        MarkerRegistry::new(counters)
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let markers = registry();
        let a = markers
            .register(MarkerSpec::new(Chromosome(1), 100))
            .unwrap();
        let b = markers
            .register(MarkerSpec::new(Chromosome(1), 200))
            .unwrap();
        assert_eq!(a, MarkerId(0));
        assert_eq!(b, MarkerId(1));
    }

    #[test]
    fn test_position_range_scan() {
        let markers = registry();
        for pos in [100u32, 250, 900, 1500] {
            markers
                .register(MarkerSpec::new(Chromosome(3), pos))
                .unwrap();
        }
        markers
            .register(MarkerSpec::new(Chromosome(4), 300))
            .unwrap();

        let hits = markers.find(&MarkerQuery::on_chromosome(Chromosome(3)).position_range(200, 1000));
        let positions: Vec<Position> = hits.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![250, 900]);
    }

    #[test]
    fn test_chromosome_range_scan_spans_chromosomes() {
        let markers = registry();
        for (chrom, pos) in [(1u8, 5u32), (2, 9), (3, 1), (5, 2)] {
            markers
                .register(MarkerSpec::new(Chromosome(chrom), pos))
                .unwrap();
        }
        let hits = markers.find(
            &MarkerQuery::default().chromosome_range(Chromosome(2), Chromosome(3)),
        );
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.chromosome >= Chromosome(2)));
        assert!(hits.iter().all(|m| m.chromosome <= Chromosome(3)));
    }

    #[test]
    fn test_name_lookup_is_independent_of_position() {
        let markers = registry();
        let id = markers
            .register(MarkerSpec::new(Chromosome(1), 100).with_name("rs77"))
            .unwrap();
        // A second marker at the same position under a different alias.
        markers
            .register(MarkerSpec::new(Chromosome(1), 100).with_name("chip_9"))
            .unwrap();

        let hits = markers.find(&MarkerQuery::by_name("rs77"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        // Same position is not unique: both markers are cataloged.
        let co_located = markers.find(&MarkerQuery::on_chromosome(Chromosome(1)));
        assert_eq!(co_located.len(), 2);
    }

    #[test]
    fn test_bulk_reuse_existing_skips_known_positions() {
        let markers = registry();
        let known = markers
            .register(MarkerSpec::new(Chromosome(2), 50))
            .unwrap();

        let ids = markers
            .register_bulk(
                vec![
                    MarkerSpec::new(Chromosome(2), 50),
                    MarkerSpec::new(Chromosome(2), 60),
                ],
                DuplicatePolicy::ReuseExisting,
            )
            .unwrap();

        assert_eq!(ids[0], known);
        assert_ne!(ids[1], known);
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn test_bulk_always_create_duplicates_positions() {
        let markers = registry();
        markers.register(MarkerSpec::new(Chromosome(2), 50)).unwrap();
        let ids = markers
            .register_bulk(
                vec![MarkerSpec::new(Chromosome(2), 50)],
                DuplicatePolicy::AlwaysCreate,
            )
            .unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_append_map_ref_validates_every_id() {
        let markers = registry();
        let id = markers
            .register(MarkerSpec::new(Chromosome(1), 10))
            .unwrap();

        let err = markers.append_map_ref(&[id, MarkerId(999)], MapId(0));
        assert!(matches!(err, Err(StoreError::MarkerNotFound(999))));
        // Failed validation left map_refs untouched.
        assert!(markers.get(id).unwrap().map_refs.is_empty());

        markers.append_map_ref(&[id], MapId(0)).unwrap();
        assert_eq!(markers.get(id).unwrap().map_refs, vec![MapId(0)]);

        let hits = markers.find(&MarkerQuery::in_map(MapId(0)));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_snapshot_restore_rebuilds_indexes() {
        let markers = registry();
        markers
            .register(MarkerSpec::new(Chromosome(1), 10).with_name("rs1"))
            .unwrap();
        let snap = markers.snapshot();

        let restored = registry();
        restored.restore(snap);
        assert_eq!(restored.find(&MarkerQuery::by_name("rs1")).len(), 1);
    }
}
