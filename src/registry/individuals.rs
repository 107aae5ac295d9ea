//! # Individual and Sample Registry
//!
//! Biological subjects and their genotyping runs. Uniqueness is enforced by
//! index, not by lookup-then-insert: external ids are unique across all
//! individuals, and `(map, sample_id)` is unique across all samples. A
//! racing duplicate insert therefore fails with `DuplicateKey` instead of
//! silently overwriting — the index is the concurrency control.
//!
//! Samples may exist without an owning individual (a genotyping run whose
//! subject has not been identified yet); linking happens when the owner is
//! known.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Individual, IndividualId, MapId, Sample, SampleId, SampleKey};
use crate::error::{Result, StoreError};
use crate::store::{CounterKind, CounterTable, MultiIndex, UniqueIndex};

/// Search predicate for individuals; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct IndividualQuery {
    pub id: Option<IndividualId>,
    pub external_id: Option<String>,
    pub sample_map: Option<MapId>,
    pub sample_id: Option<SampleId>,
}

impl IndividualQuery {
    pub fn by_external_id(id: impl Into<String>) -> Self {
        Self {
            external_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_sample_on(map: MapId) -> Self {
        Self {
            sample_map: Some(map),
            ..Self::default()
        }
    }

    fn matches(&self, individual: &Individual) -> bool {
        if let Some(id) = self.id {
            if individual.id != id {
                return false;
            }
        }
        if let Some(external) = &self.external_id {
            if !individual.has_external_id(external) {
                return false;
            }
        }
        if let Some(map) = self.sample_map {
            if !individual.has_sample_on(map) {
                return false;
            }
        }
        if let Some(sample) = &self.sample_id {
            if !individual.samples.iter().any(|s| &s.sample == sample) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct IndividualState {
    docs: BTreeMap<IndividualId, Individual>,
    by_external_id: UniqueIndex<String, IndividualId>,
    by_sample: UniqueIndex<SampleKey, IndividualId>,
    samples: BTreeMap<SampleKey, Sample>,
    samples_by_id: MultiIndex<SampleId, MapId>,
}

/// The `individuals` and `samples` collections
pub struct IndividualRegistry {
    counters: Arc<CounterTable>,
    inner: RwLock<IndividualState>,
}

impl IndividualRegistry {
    pub fn new(counters: Arc<CounterTable>) -> Self {
        Self {
            counters,
            inner: RwLock::new(IndividualState::default()),
        }
    }

    /// Register an individual under its external identifiers
    pub fn register(&self, external_ids: Vec<String>) -> Result<IndividualId> {
        if external_ids.is_empty() {
            return Err(StoreError::EmptyExternalIds);
        }

        let mut state = self.write();
        if let Some(taken) = external_ids
            .iter()
            .find(|id| state.by_external_id.contains(id))
        {
            return Err(StoreError::duplicate("individuals", taken.clone()));
        }

        let id = IndividualId(self.counters.allocate(CounterKind::Individuals)?);
        for external in &external_ids {
            // Availability was checked under this same write lock.
            let _ = state.by_external_id.insert(external.clone(), id);
        }
        state.docs.insert(
            id,
            Individual {
                id,
                external_ids,
                samples: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Add an alias for an existing individual (append-only)
    pub fn add_external_id(&self, individual: IndividualId, external: String) -> Result<()> {
        let mut state = self.write();
        if !state.docs.contains_key(&individual) {
            return Err(StoreError::IndividualNotFound(individual.as_u64()));
        }
        state
            .by_external_id
            .insert(external.clone(), individual)
            .map_err(|taken| StoreError::duplicate("individuals", taken))?;
        if let Some(doc) = state.docs.get_mut(&individual) {
            doc.external_ids.push(external);
        }
        Ok(())
    }

    /// Create a sample with no owning individual yet
    pub fn register_sample(&self, map: MapId, id: impl Into<SampleId>) -> Result<SampleKey> {
        let mut state = self.write();
        self.insert_sample(&mut state, map, id.into())
    }

    /// Create a sample and link it to its owning individual
    pub fn add_sample(
        &self,
        individual: IndividualId,
        map: MapId,
        id: impl Into<SampleId>,
    ) -> Result<SampleKey> {
        let mut state = self.write();
        if !state.docs.contains_key(&individual) {
            return Err(StoreError::IndividualNotFound(individual.as_u64()));
        }

        let key = self.insert_sample(&mut state, map, id.into())?;
        // The sample was just created, so the back-reference cannot collide.
        let _ = state.by_sample.insert(key.clone(), individual);
        if let Some(doc) = state.docs.get_mut(&individual) {
            doc.samples.push(key.clone());
        }
        Ok(key)
    }

    /// Link an existing unowned sample to an individual
    pub fn claim_sample(&self, individual: IndividualId, key: &SampleKey) -> Result<()> {
        let mut state = self.write();
        if !state.docs.contains_key(&individual) {
            return Err(StoreError::IndividualNotFound(individual.as_u64()));
        }
        if !state.samples.contains_key(key) {
            return Err(StoreError::SampleNotFound {
                map: key.map.as_u64(),
                sample: key.sample.to_string(),
            });
        }
        state
            .by_sample
            .insert(key.clone(), individual)
            .map_err(|k| StoreError::duplicate("individuals.samples", k.to_string()))?;
        if let Some(doc) = state.docs.get_mut(&individual) {
            doc.samples.push(key.clone());
        }
        Ok(())
    }

    fn insert_sample(
        &self,
        state: &mut IndividualState,
        map: MapId,
        id: SampleId,
    ) -> Result<SampleKey> {
        let key = SampleKey {
            map,
            sample: id.clone(),
        };
        if state.samples.contains_key(&key) {
            return Err(StoreError::duplicate("samples", key.to_string()));
        }
        state.samples.insert(
            key.clone(),
            Sample {
                map,
                id: id.clone(),
                attrs: BTreeMap::new(),
            },
        );
        state.samples_by_id.insert(id, map);
        debug!(%key, "registered sample");
        Ok(key)
    }

    /// True if the `(map, sample)` pair exists
    pub fn sample_exists(&self, map: MapId, sample: &SampleId) -> bool {
        self.read().samples.contains_key(&SampleKey {
            map,
            sample: sample.clone(),
        })
    }

    /// Fetch one individual by id
    pub fn get(&self, id: IndividualId) -> Result<Individual> {
        self.read()
            .docs
            .get(&id)
            .cloned()
            .ok_or(StoreError::IndividualNotFound(id.as_u64()))
    }

    /// The individual owning a sample, if any
    pub fn owner_of(&self, key: &SampleKey) -> Option<IndividualId> {
        self.read().by_sample.get(key).copied()
    }

    /// Search individuals, in id order
    pub fn find(&self, query: &IndividualQuery) -> Vec<Individual> {
        let state = self.read();

        let candidates: Vec<IndividualId> = if let Some(id) = query.id {
            state.docs.get(&id).map(|i| i.id).into_iter().collect()
        } else if let Some(external) = &query.external_id {
            state.by_external_id.get(external).copied().into_iter().collect()
        } else {
            state.docs.keys().copied().collect()
        };

        candidates
            .into_iter()
            .filter_map(|id| state.docs.get(&id))
            .filter(|i| query.matches(i))
            .cloned()
            .collect()
    }

    /// Search samples by map and/or within-map id
    pub fn find_samples(&self, map: Option<MapId>, id: Option<&SampleId>) -> Vec<Sample> {
        let state = self.read();
        match (map, id) {
            (Some(map), Some(id)) => state
                .samples
                .get(&SampleKey {
                    map,
                    sample: id.clone(),
                })
                .cloned()
                .into_iter()
                .collect(),
            (Some(map), None) => {
                // (map, id) is the primary key order, so one map's samples
                // are a contiguous key range.
                let lo = SampleKey {
                    map,
                    sample: SampleId::new(""),
                };
                state
                    .samples
                    .range(lo..)
                    .take_while(|(k, _)| k.map == map)
                    .map(|(_, s)| s.clone())
                    .collect()
            }
            (None, Some(id)) => state
                .samples_by_id
                .get(id)
                .filter_map(|&map| {
                    state.samples.get(&SampleKey {
                        map,
                        sample: id.clone(),
                    })
                })
                .cloned()
                .collect(),
            (None, None) => state.samples.values().cloned().collect(),
        }
    }

    /// Number of registered individuals
    pub fn len(&self) -> usize {
        self.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().docs.is_empty()
    }

    /// Number of registered samples
    pub fn num_samples(&self) -> usize {
        self.read().samples.len()
    }

    /// Documents only; indexes are rebuilt on restore
    pub fn snapshot(&self) -> IndividualSnapshot {
        let state = self.read();
        IndividualSnapshot {
            individuals: state.docs.values().cloned().collect(),
            samples: state.samples.values().cloned().collect(),
        }
    }

    pub fn restore(&self, snapshot: IndividualSnapshot) -> Result<()> {
        let mut state = self.write();
        *state = IndividualState::default();
        for sample in snapshot.samples {
            let key = sample.key();
            state.samples_by_id.insert(sample.id.clone(), sample.map);
            state.samples.insert(key, sample);
        }
        for individual in snapshot.individuals {
            for external in &individual.external_ids {
                state
                    .by_external_id
                    .insert(external.clone(), individual.id)
                    .map_err(|taken| StoreError::duplicate("individuals", taken))?;
            }
            for key in &individual.samples {
                state
                    .by_sample
                    .insert(key.clone(), individual.id)
                    .map_err(|k| StoreError::duplicate("individuals.samples", k.to_string()))?;
            }
            state.docs.insert(individual.id, individual);
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, IndividualState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndividualState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persisted form of the `individuals` and `samples` collections
#[derive(Serialize, Deserialize)]
pub struct IndividualSnapshot {
    individuals: Vec<Individual>,
    samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IndividualRegistry {
        let counters = Arc::new(CounterTable::new());
        counters.provision(CounterKind::Individuals);
        IndividualRegistry::new(counters)
    }

    #[test]
    fn test_register_requires_external_ids() {
        let individuals = registry();
        assert!(matches!(
            individuals.register(vec![]),
            Err(StoreError::EmptyExternalIds)
        ));
    }

    #[test]
    fn test_external_ids_unique_across_individuals() {
        let individuals = registry();
        individuals.register(vec!["BR1".into()]).unwrap();
        let err = individuals.register(vec!["BR2".into(), "BR1".into()]);
        assert!(matches!(err, Err(StoreError::DuplicateKey { .. })));
        // The rejected registration must not have claimed "BR2".
        individuals.register(vec!["BR2".into()]).unwrap();
    }

    #[test]
    fn test_duplicate_sample_fails() {
        let individuals = registry();
        let ind = individuals.register(vec!["BR1".into()]).unwrap();
        individuals.add_sample(ind, MapId(7), "S1").unwrap();
        let err = individuals.add_sample(ind, MapId(7), "S1");
        assert!(matches!(err, Err(StoreError::DuplicateKey { .. })));
        // Same id on another map is a different genotyping run.
        individuals.add_sample(ind, MapId(8), "S1").unwrap();
    }

    #[test]
    fn test_unowned_sample_can_be_claimed_once() {
        let individuals = registry();
        let key = individuals.register_sample(MapId(1), "S9").unwrap();
        assert_eq!(individuals.owner_of(&key), None);

        let ind = individuals.register(vec!["BR1".into()]).unwrap();
        individuals.claim_sample(ind, &key).unwrap();
        assert_eq!(individuals.owner_of(&key), Some(ind));

        let other = individuals.register(vec!["BR2".into()]).unwrap();
        let err = individuals.claim_sample(other, &key);
        assert!(matches!(err, Err(StoreError::DuplicateKey { .. })));
    }

    #[test]
    fn test_find_by_external_id_and_sample() {
        let individuals = registry();
        let a = individuals.register(vec!["BR1".into(), "TAG-1".into()]).unwrap();
        let b = individuals.register(vec!["BR2".into()]).unwrap();
        individuals.add_sample(a, MapId(1), "S1").unwrap();
        individuals.add_sample(b, MapId(2), "S2").unwrap();

        let hits = individuals.find(&IndividualQuery::by_external_id("TAG-1"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);

        let hits = individuals.find(&IndividualQuery::with_sample_on(MapId(2)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, b);

        let hits = individuals.find(&IndividualQuery {
            sample_id: Some(SampleId::from("S1")),
            ..IndividualQuery::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);
    }

    #[test]
    fn test_find_samples_by_map_prefix() {
        let individuals = registry();
        individuals.register_sample(MapId(1), "S1").unwrap();
        individuals.register_sample(MapId(1), "S2").unwrap();
        individuals.register_sample(MapId(2), "S1").unwrap();

        assert_eq!(individuals.find_samples(Some(MapId(1)), None).len(), 2);
        assert_eq!(
            individuals
                .find_samples(None, Some(&SampleId::from("S1")))
                .len(),
            2
        );
        assert_eq!(
            individuals
                .find_samples(Some(MapId(2)), Some(&SampleId::from("S1")))
                .len(),
            1
        );
        assert_eq!(individuals.num_samples(), 3);
    }

    #[test]
    fn test_snapshot_restore_keeps_ownership() {
        let individuals = registry();
        let ind = individuals.register(vec!["BR1".into()]).unwrap();
        let key = individuals.add_sample(ind, MapId(3), "S1").unwrap();

        let snap = individuals.snapshot();
        let restored = registry();
        restored.restore(snap).unwrap();
        assert_eq!(restored.owner_of(&key), Some(ind));
        assert!(restored.sample_exists(MapId(3), &SampleId::from("S1")));
    }
}
