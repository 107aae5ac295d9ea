//! # Genotype Block Store
//!
//! The performance-critical collection. The primary structure is ordered by
//! `(map, sample, block_number)`, so every read path for one sample is a
//! prefix scan over adjacent keys rather than a filter over the whole
//! collection.
//!
//! A second, deliberately light index maps `(map, sample, lead_marker)` to a
//! block number, where `lead_marker` is the first call of the block. With
//! calls sorted by marker id this is enough to locate the one block that can
//! contain a marker; the block itself (small, bounded by `block_capacity`)
//! is then scanned in memory. Indexing only the first call keeps index
//! maintenance cost independent of block size, at the price of precise
//! per-marker lookup inside the index.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{
    BlockKey, BlockNumber, GenotypeBlock, GenotypeCall, MapId, MarkerId, SampleId,
};
use crate::error::{Result, StoreError};

#[derive(Default)]
struct BlockState {
    /// Primary storage; the key order IS the compound index
    docs: BTreeMap<BlockKey, GenotypeBlock>,
    /// `(map, sample, first call's marker)` -> block number
    lead_index: BTreeMap<(MapId, SampleId, MarkerId), BlockNumber>,
}

/// The `snpblocks` collection
#[derive(Default)]
pub struct GenotypeBlockStore {
    inner: RwLock<BlockState>,
}

impl GenotypeBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one block, replacing any previous content under the same key
    ///
    /// Writes to the same `(map, sample, block_number)` are last-writer-wins;
    /// callers that need stronger ordering serialize their own writes.
    pub fn write_block(&self, block: GenotypeBlock, capacity: usize) -> Result<()> {
        if block.calls.len() > capacity {
            return Err(StoreError::BlockOverflow {
                len: block.calls.len(),
                capacity,
            });
        }

        let mut state = self.write();
        let key = block.key();
        let lead = block.lead_marker();
        if let Some(previous) = state.docs.insert(key.clone(), block) {
            if let Some(old_lead) = previous.lead_marker() {
                state
                    .lead_index
                    .remove(&(previous.map, previous.sample, old_lead));
            }
        }
        if let Some(lead) = lead {
            state
                .lead_index
                .insert((key.map, key.sample, lead), key.number);
        }
        Ok(())
    }

    /// Calls of one block
    pub fn read_block(
        &self,
        map: MapId,
        sample: &SampleId,
        number: BlockNumber,
    ) -> Result<Vec<GenotypeCall>> {
        let key = BlockKey {
            map,
            sample: sample.clone(),
            number,
        };
        self.read()
            .docs
            .get(&key)
            .map(|b| b.calls.clone())
            .ok_or(StoreError::BlockNotFound {
                map: map.as_u64(),
                sample: sample.to_string(),
                block: number.as_u32(),
            })
    }

    /// Concatenation of the given blocks' calls, in the order given
    pub fn read_range(
        &self,
        map: MapId,
        sample: &SampleId,
        numbers: &[BlockNumber],
    ) -> Result<Vec<GenotypeCall>> {
        let state = self.read();
        let mut calls = Vec::new();
        for &number in numbers {
            let key = BlockKey {
                map,
                sample: sample.clone(),
                number,
            };
            let block = state.docs.get(&key).ok_or(StoreError::BlockNotFound {
                map: map.as_u64(),
                sample: sample.to_string(),
                block: number.as_u32(),
            })?;
            calls.extend_from_slice(&block.calls);
        }
        Ok(calls)
    }

    /// All blocks of one sample, in block order (prefix scan)
    pub fn blocks_of_sample(&self, map: MapId, sample: &SampleId) -> Vec<GenotypeBlock> {
        let lo = BlockKey {
            map,
            sample: sample.clone(),
            number: BlockNumber(0),
        };
        let hi = BlockKey {
            map,
            sample: sample.clone(),
            number: BlockNumber(u32::MAX),
        };
        self.read()
            .docs
            .range(lo..=hi)
            .map(|(_, b)| b.clone())
            .collect()
    }

    /// Block numbers stored for one sample, in order
    pub fn block_numbers(&self, map: MapId, sample: &SampleId) -> Vec<BlockNumber> {
        self.blocks_of_sample(map, sample)
            .iter()
            .map(|b| b.number)
            .collect()
    }

    /// The block whose lead marker is the greatest lower bound of `marker`
    ///
    /// This is the light-index lookup path: with calls sorted by marker id,
    /// only the returned block can contain the marker. The caller scans it
    /// in memory.
    pub fn locate_block(
        &self,
        map: MapId,
        sample: &SampleId,
        marker: MarkerId,
    ) -> Option<BlockNumber> {
        let lo = (map, sample.clone(), MarkerId(0));
        let hi = (map, sample.clone(), marker);
        self.read()
            .lead_index
            .range(lo..=hi)
            .next_back()
            .map(|(_, &number)| number)
    }

    /// Total number of stored blocks
    pub fn len(&self) -> usize {
        self.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().docs.is_empty()
    }

    /// Documents only; the lead index is rebuilt on restore
    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            blocks: self.read().docs.values().cloned().collect(),
        }
    }

    pub fn restore(&self, snapshot: BlockSnapshot) {
        let mut state = self.write();
        *state = BlockState::default();
        for block in snapshot.blocks {
            if let Some(lead) = block.lead_marker() {
                state
                    .lead_index
                    .insert((block.map, block.sample.clone(), lead), block.number);
            }
            state.docs.insert(block.key(), block);
        }
        debug!(blocks = state.docs.len(), "restored genotype blocks");
    }

    fn read(&self) -> RwLockReadGuard<'_, BlockState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BlockState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persisted form of the `snpblocks` collection
#[derive(Serialize, Deserialize)]
pub struct BlockSnapshot {
    blocks: Vec<GenotypeBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Genotype;

    fn block(map: u64, sample: &str, number: u32, markers: &[u64]) -> GenotypeBlock {
        GenotypeBlock {
            map: MapId(map),
            sample: SampleId::from(sample),
            number: BlockNumber(number),
            calls: markers
                .iter()
                .map(|&m| GenotypeCall::new(MarkerId(m), Genotype::new(b'A', b'B')))
                .collect(),
        }
    }

    #[test]
    fn test_overflow_rejected_at_capacity_boundary() {
        let store = GenotypeBlockStore::new();
        // Exactly at capacity succeeds.
        store.write_block(block(0, "S1", 0, &[0, 1, 2]), 3).unwrap();
        // One past capacity fails.
        let err = store.write_block(block(0, "S1", 1, &[3, 4, 5, 6]), 3);
        assert!(matches!(
            err,
            Err(StoreError::BlockOverflow {
                len: 4,
                capacity: 3
            })
        ));
    }

    #[test]
    fn test_read_range_concatenates_in_given_order() {
        let store = GenotypeBlockStore::new();
        store.write_block(block(7, "S1", 0, &[0, 1]), 10).unwrap();
        store.write_block(block(7, "S1", 1, &[2, 3]), 10).unwrap();

        let calls = store
            .read_range(MapId(7), &SampleId::from("S1"), &[BlockNumber(0), BlockNumber(1)])
            .unwrap();
        let markers: Vec<u64> = calls.iter().map(|c| c.marker.as_u64()).collect();
        assert_eq!(markers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_missing_block_is_an_error() {
        let store = GenotypeBlockStore::new();
        store.write_block(block(7, "S1", 0, &[0]), 10).unwrap();
        assert!(matches!(
            store.read_block(MapId(7), &SampleId::from("S1"), BlockNumber(1)),
            Err(StoreError::BlockNotFound { block: 1, .. })
        ));
    }

    #[test]
    fn test_prefix_scan_is_scoped_to_one_sample() {
        let store = GenotypeBlockStore::new();
        store.write_block(block(7, "S1", 0, &[0]), 10).unwrap();
        store.write_block(block(7, "S1", 1, &[1]), 10).unwrap();
        store.write_block(block(7, "S2", 0, &[0]), 10).unwrap();
        store.write_block(block(8, "S1", 0, &[0]), 10).unwrap();

        let blocks = store.blocks_of_sample(MapId(7), &SampleId::from("S1"));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].number, BlockNumber(0));
        assert_eq!(blocks[1].number, BlockNumber(1));
    }

    #[test]
    fn test_rewrite_is_last_writer_wins() {
        let store = GenotypeBlockStore::new();
        store.write_block(block(7, "S1", 0, &[0, 1]), 10).unwrap();
        store.write_block(block(7, "S1", 0, &[5, 6]), 10).unwrap();

        let calls = store
            .read_block(MapId(7), &SampleId::from("S1"), BlockNumber(0))
            .unwrap();
        assert_eq!(calls[0].marker, MarkerId(5));
        assert_eq!(store.len(), 1);
        // The stale lead entry is gone: locating marker 0 finds nothing
        // below the new lead.
        assert_eq!(
            store.locate_block(MapId(7), &SampleId::from("S1"), MarkerId(0)),
            None
        );
    }

    #[test]
    fn test_locate_block_finds_covering_block() {
        let store = GenotypeBlockStore::new();
        let sample = SampleId::from("S1");
        store.write_block(block(7, "S1", 0, &[0, 2, 4]), 10).unwrap();
        store.write_block(block(7, "S1", 1, &[6, 8, 10]), 10).unwrap();

        // Marker 5 can only live in the block led by 0.
        assert_eq!(
            store.locate_block(MapId(7), &sample, MarkerId(5)),
            Some(BlockNumber(0))
        );
        assert_eq!(
            store.locate_block(MapId(7), &sample, MarkerId(6)),
            Some(BlockNumber(1))
        );
    }

    #[test]
    fn test_snapshot_restore_rebuilds_lead_index() {
        let store = GenotypeBlockStore::new();
        store.write_block(block(7, "S1", 0, &[0, 2]), 10).unwrap();
        store.write_block(block(7, "S1", 1, &[4, 6]), 10).unwrap();

        let restored = GenotypeBlockStore::new();
        restored.restore(store.snapshot());
        assert_eq!(
            restored.locate_block(MapId(7), &SampleId::from("S1"), MarkerId(4)),
            Some(BlockNumber(1))
        );
        assert_eq!(restored.len(), 2);
    }
}
