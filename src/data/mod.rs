//! # Data Module
//!
//! Entity documents and identifier newtypes. This is the core "Model" layer.
//!
//! ## Design Philosophy
//! - **Zero-cost newtypes:** `MarkerId`, `MapId`, `IndividualId`, `BlockNumber`
//!   prevent identifier mix-ups at compile time with no runtime overhead.
//! - **Descriptive fields:** the persisted documents use full field names;
//!   compact single-letter attributes are a document-store size optimization
//!   that a strongly-typed store does not need. Only the index shape matters.
//! - **Serde everywhere:** every document derives `Serialize`/`Deserialize`
//!   so collections can be snapshotted without bespoke encoders.

pub mod block;
pub mod individual;
pub mod map;
pub mod marker;

// Re-export commonly used types
pub use block::{BlockKey, Genotype, GenotypeBlock, GenotypeCall};
pub use individual::{Individual, Sample, SampleId, SampleKey};
pub use map::{MapBatch, MapMeta, MarkerMap};
pub use marker::{Marker, MarkerSpec};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// 1-based genomic position in base pairs
pub type Position = u32;

/// Zero-cost newtype for marker (SNP) identifiers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct MarkerId(pub u64);

impl MarkerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for MarkerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-cost newtype for map (panel) identifiers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct MapId(pub u64);

impl MapId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for MapId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-cost newtype for individual identifiers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct IndividualId(pub u64);

impl IndividualId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for IndividualId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-cost newtype for genotype block numbers within a `(map, sample)` pair
///
/// Block numbers are contiguous from zero for every stored sample.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BlockNumber(pub u32);

impl BlockNumber {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn next(self) -> BlockNumber {
        BlockNumber(self.0 + 1)
    }
}

impl From<u32> for BlockNumber {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chromosome code: 1-22 autosomes, 23=X, 24=Y, 25=MT
///
/// Encoding chromosomes as ordered integers keeps the `(chromosome, position)`
/// compound index a plain lexicographic key, so range scans over chromosome
/// spans need no collation logic.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Chromosome(pub u8);

impl Chromosome {
    pub const X: Chromosome = Chromosome(23);
    pub const Y: Chromosome = Chromosome(24);
    pub const MT: Chromosome = Chromosome(25);

    pub fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Parse a chromosome label, accepting an optional `chr` prefix
    pub fn parse_label(label: &str) -> Result<Self, StoreError> {
        let mut trimmed = label.trim();
        if trimmed.len() >= 3 && trimmed[..3].eq_ignore_ascii_case("chr") {
            trimmed = &trimmed[3..];
        }

        if trimmed.eq_ignore_ascii_case("X") {
            return Ok(Self::X);
        }
        if trimmed.eq_ignore_ascii_case("Y") {
            return Ok(Self::Y);
        }
        if trimmed.eq_ignore_ascii_case("MT") || trimmed.eq_ignore_ascii_case("M") {
            return Ok(Self::MT);
        }

        match trimmed.parse::<u8>() {
            Ok(n) if (1..=22).contains(&n) => Ok(Self(n)),
            _ => Err(StoreError::invalid_config(format!(
                "unrecognized chromosome label '{label}'"
            ))),
        }
    }
}

impl Default for Chromosome {
    fn default() -> Self {
        Chromosome(1)
    }
}

impl FromStr for Chromosome {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s)
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            23 => write!(f, "X"),
            24 => write!(f, "Y"),
            25 => write!(f, "MT"),
            n => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromosome_parse_labels() {
        assert_eq!(Chromosome::parse_label("7").unwrap(), Chromosome(7));
        assert_eq!(Chromosome::parse_label("chr7").unwrap(), Chromosome(7));
        assert_eq!(Chromosome::parse_label("ChrX").unwrap(), Chromosome::X);
        assert_eq!(Chromosome::parse_label("mt").unwrap(), Chromosome::MT);
        assert!(Chromosome::parse_label("chr0").is_err());
        assert!(Chromosome::parse_label("banana").is_err());
    }

    #[test]
    fn test_chromosome_ordering() {
        assert!(Chromosome(1) < Chromosome(22));
        assert!(Chromosome(22) < Chromosome::X);
        assert!(Chromosome::X < Chromosome::MT);
    }

    #[test]
    fn test_chromosome_display_round_trip() {
        for code in [1u8, 22, 23, 24, 25] {
            let chrom = Chromosome(code);
            assert_eq!(
                Chromosome::parse_label(&chrom.to_string()).unwrap(),
                chrom
            );
        }
    }

    #[test]
    fn test_block_number_next() {
        assert_eq!(BlockNumber(0).next(), BlockNumber(1));
    }
}
