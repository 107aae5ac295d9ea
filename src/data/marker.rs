//! # Marker Documents
//!
//! Canonical catalog entry for a genetic marker (SNP).
//!
//! A marker is identified by an allocator-issued numeric id. The `names`
//! list holds every panel-specific alias the marker is known by; aliasing
//! schemes are not 1:1 with genomic position, so name lookup is a separate
//! index from the `(chromosome, position)` compound index. `map_refs`
//! records every map the marker participates in and is append-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{Chromosome, MapId, MarkerId, Position};

/// A marker document in the `snps` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,

    /// Panel-specific aliases; may be empty, never deduplicated across maps
    pub names: Vec<String>,

    pub chromosome: Chromosome,
    pub position: Position,

    /// Every map this marker participates in, in registration order.
    /// Appended to as new maps incorporate the marker, never removed.
    pub map_refs: Vec<MapId>,

    /// Reader-specific extra columns carried through verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

impl Marker {
    /// True if the marker carries the given alias
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// True if the marker participates in the given map
    pub fn in_map(&self, map: MapId) -> bool {
        self.map_refs.contains(&map)
    }
}

/// Input description of a marker to register
#[derive(Clone, Debug, Default)]
pub struct MarkerSpec {
    pub names: Vec<String>,
    pub chromosome: Chromosome,
    pub position: Position,
    pub attrs: BTreeMap<String, String>,
}

impl MarkerSpec {
    pub fn new(chromosome: Chromosome, position: Position) -> Self {
        Self {
            names: Vec::new(),
            chromosome,
            position,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_spec_builder() {
        let spec = MarkerSpec::new(Chromosome(2), 1234)
            .with_name("rs42")
            .with_name("chip_0042")
            .with_attr("strand", "+");
        assert_eq!(spec.names, vec!["rs42", "chip_0042"]);
        assert_eq!(spec.attrs.get("strand").map(String::as_str), Some("+"));
    }

    #[test]
    fn test_marker_name_and_map_membership() {
        let marker = Marker {
            id: MarkerId(3),
            names: vec!["rs1".into()],
            chromosome: Chromosome(1),
            position: 100,
            map_refs: vec![MapId(0), MapId(2)],
            attrs: BTreeMap::new(),
        };
        assert!(marker.has_name("rs1"));
        assert!(!marker.has_name("rs2"));
        assert!(marker.in_map(MapId(2)));
        assert!(!marker.in_map(MapId(1)));
    }
}
