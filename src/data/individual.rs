//! # Individual and Sample Documents
//!
//! An individual is a biological subject known by one or more external
//! identifiers (ear tags, lab codes, field ids). A sample is one genotyping
//! run of an individual against a specific map; its id is the
//! caller-supplied, within-map identifier, and `(map, id)` is unique across
//! the store. Individuals reference their samples by key; the sample
//! document carries the map back-reference.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{IndividualId, MapId};

/// Within-map sample identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SampleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SampleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unique `(map, sample)` pair identifying one genotyping run
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub map: MapId,
    pub sample: SampleId,
}

impl SampleKey {
    pub fn new(map: MapId, sample: impl Into<SampleId>) -> Self {
        Self {
            map,
            sample: sample.into(),
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(map {}, sample '{}')", self.map, self.sample)
    }
}

/// A sample document in the `samples` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub map: MapId,
    pub id: SampleId,

    /// Reader-specific extra columns carried through verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

impl Sample {
    pub fn key(&self) -> SampleKey {
        SampleKey {
            map: self.map,
            sample: self.id.clone(),
        }
    }
}

/// An individual document in the `individuals` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,

    /// Alternate identifiers for the same subject; non-empty, each unique
    /// across the whole collection
    pub external_ids: Vec<String>,

    /// Keys of the samples belonging to this individual
    pub samples: Vec<SampleKey>,
}

impl Individual {
    /// True if the individual is known by the given external id
    pub fn has_external_id(&self, id: &str) -> bool {
        self.external_ids.iter().any(|e| e == id)
    }

    /// True if the individual owns a sample on the given map
    pub fn has_sample_on(&self, map: MapId) -> bool {
        self.samples.iter().any(|s| s.map == map)
    }
}
