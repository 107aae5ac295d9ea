//! # Genotype Block Documents
//!
//! Dense, batched storage of per-sample genotype calls. Rather than one
//! document per `(sample, marker)` pair, calls are packed into fixed-capacity
//! blocks keyed by `(map, sample, block_number)`. This amortizes per-document
//! overhead while keeping every document within a safe size bound, the same
//! way a column store batches values.
//!
//! Invariant: for a given `(map, sample)`, block numbers are contiguous from
//! zero and every marker of the sample's map appears in exactly one block
//! exactly once. Calls within a sample are sorted by marker id, so the first
//! call of each block is a lower bound for the whole block.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{BlockNumber, MapId, MarkerId, SampleId, SampleKey};

/// A single genotype call: two allele bytes
///
/// `b'-'` encodes a missing allele; `Genotype::MISSING` is both missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genotype(pub [u8; 2]);

impl Genotype {
    pub const MISSING: Genotype = Genotype([b'-', b'-']);

    pub fn new(first: u8, second: u8) -> Self {
        Self([first, second])
    }

    pub fn is_missing(&self) -> bool {
        self.0 == Self::MISSING.0
    }

    /// True for calls like AA or BB
    pub fn is_homozygous(&self) -> bool {
        !self.is_missing() && self.0[0] == self.0[1]
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// One `{marker, genotype}` pair inside a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypeCall {
    pub marker: MarkerId,
    pub genotype: Genotype,
}

impl GenotypeCall {
    pub fn new(marker: MarkerId, genotype: Genotype) -> Self {
        Self { marker, genotype }
    }
}

/// Primary key of a genotype block
///
/// The derived lexicographic ordering is the single most important index in
/// the schema: all blocks of one `(map, sample)` pair are adjacent, so
/// "fetch genotypes for this sample" is a prefix scan, never a full scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub map: MapId,
    pub sample: SampleId,
    pub number: BlockNumber,
}

impl BlockKey {
    pub fn new(map: MapId, sample: impl Into<SampleId>, number: BlockNumber) -> Self {
        Self {
            map,
            sample: sample.into(),
            number,
        }
    }

    pub fn sample_key(&self) -> SampleKey {
        SampleKey {
            map: self.map,
            sample: self.sample.clone(),
        }
    }
}

/// A genotype block document in the `snpblocks` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypeBlock {
    pub map: MapId,
    pub sample: SampleId,
    pub number: BlockNumber,
    pub calls: Vec<GenotypeCall>,
}

impl GenotypeBlock {
    pub fn key(&self) -> BlockKey {
        BlockKey {
            map: self.map,
            sample: self.sample.clone(),
            number: self.number,
        }
    }

    /// Marker id of the first call, the block's lower bound when calls are
    /// sorted. `None` for an empty block.
    pub fn lead_marker(&self) -> Option<MarkerId> {
        self.calls.first().map(|c| c.marker)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
