//! # Map and Map-Batch Documents
//!
//! A map is a genotyping panel: the set of markers assayed together, in the
//! order the panel defines. Marker membership is not embedded in the map
//! document; it is split across `MapBatch` documents so no single document
//! grows with panel size. Each batch also carries a sorted copy of its
//! marker-id slice, a read-optimization mirror that lets membership and rank
//! queries binary-search instead of re-sorting on every read.
//!
//! Maps are immutable once their marker assignment completes.

use serde::{Deserialize, Serialize};

use crate::data::{MapId, MarkerId};

/// A map document in the `maps` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMap {
    pub id: MapId,

    /// Optional human-readable panel name, unique when present
    pub name: Option<String>,

    /// Source format tag (e.g. the panel vendor's file format)
    pub format: Option<String>,

    /// Number of markers assigned to this map; zero until assignment
    pub num_markers: usize,

    /// Genotype calls per block for samples genotyped against this map
    pub block_capacity: usize,
}

impl MarkerMap {
    /// True once the marker list has been assigned
    pub fn is_populated(&self) -> bool {
        self.num_markers > 0
    }

    /// Number of blocks a full sample of this map occupies
    pub fn num_blocks(&self) -> usize {
        self.num_markers.div_ceil(self.block_capacity)
    }
}

/// Creation-time metadata for a map
#[derive(Clone, Debug, Default)]
pub struct MapMeta {
    pub name: Option<String>,
    pub format: Option<String>,

    /// Per-map override of the store-wide block capacity
    pub block_capacity: Option<usize>,
}

impl MapMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = Some(capacity);
        self
    }
}

/// One slice of a map's marker list, in the `mapsnps` collection
///
/// `(map, index)` is unique; indexes are contiguous from zero. `markers`
/// preserves the panel's canonical order; `sorted_markers` is the same slice
/// sorted by marker id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBatch {
    pub map: MapId,
    pub index: u32,
    pub markers: Vec<MarkerId>,
    pub sorted_markers: Vec<MarkerId>,
}

impl MapBatch {
    /// Number of markers in this batch
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Binary-search membership test against the sorted mirror
    pub fn contains(&self, marker: MarkerId) -> bool {
        self.sorted_markers.binary_search(&marker).is_ok()
    }

    /// Number of markers in this batch with id strictly below `marker`
    pub fn rank_below(&self, marker: MarkerId) -> usize {
        self.sorted_markers.partition_point(|&m| m < marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ids: &[u64]) -> MapBatch {
        let markers: Vec<MarkerId> = ids.iter().copied().map(MarkerId).collect();
        let mut sorted_markers = markers.clone();
        sorted_markers.sort_unstable();
        MapBatch {
            map: MapId(0),
            index: 0,
            markers,
            sorted_markers,
        }
    }

    #[test]
    fn test_batch_membership_uses_sorted_mirror() {
        let b = batch(&[9, 3, 7, 1]);
        assert!(b.contains(MarkerId(7)));
        assert!(!b.contains(MarkerId(2)));
    }

    #[test]
    fn test_batch_rank_below() {
        let b = batch(&[9, 3, 7, 1]);
        assert_eq!(b.rank_below(MarkerId(1)), 0);
        assert_eq!(b.rank_below(MarkerId(7)), 2);
        assert_eq!(b.rank_below(MarkerId(100)), 4);
    }

    #[test]
    fn test_num_blocks_rounds_up() {
        let map = MarkerMap {
            id: MapId(1),
            name: None,
            format: None,
            num_markers: 10_001,
            block_capacity: 10_000,
        };
        assert_eq!(map.num_blocks(), 2);
    }
}
