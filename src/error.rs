//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! Duplicate-key and overflow conditions reflect caller misuse (wrong block
//! sizing, re-registration) and are surfaced immediately, never retried or
//! masked inside the store.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Allocation attempted against a counter that was never provisioned
    #[error("uninitialized counter for entity '{entity}'")]
    UninitializedCounter { entity: &'static str },

    /// Unique-index violation (sample, external-id, batch-index, map name)
    #[error("duplicate key in '{collection}': {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    /// Genotype call list exceeds the configured block capacity
    #[error("block overflow: {len} calls exceed capacity {capacity}")]
    BlockOverflow { len: usize, capacity: usize },

    /// Schema creation invoked against a directory that already holds one
    #[error("schema already exists at {path}")]
    SchemaAlreadyExists { path: PathBuf },

    /// Stored schema version differs from the one this build understands
    #[error("schema version mismatch: found {found}, expected {expected}")]
    SchemaVersionMismatch { found: u32, expected: u32 },

    /// Map lookup failed
    #[error("map {0} not found")]
    MapNotFound(u64),

    /// Marker assignment attempted on a map that already has its marker list
    #[error("map {0} is already populated")]
    MapAlreadyPopulated(u64),

    /// Individual lookup failed
    #[error("individual {0} not found")]
    IndividualNotFound(u64),

    /// Sample lookup failed
    #[error("sample '{sample}' not found on map {map}")]
    SampleNotFound { map: u64, sample: String },

    /// Marker lookup failed
    #[error("marker {0} not found")]
    MarkerNotFound(u64),

    /// Genotype block lookup failed
    #[error("block {block} of sample '{sample}' on map {map} not found")]
    BlockNotFound {
        map: u64,
        sample: String,
        block: u32,
    },

    /// Sample genotype data does not cover the map's marker set
    #[error("genotype length mismatch: map has {expected} markers, got {actual} calls")]
    GenotypeLengthMismatch { expected: usize, actual: usize },

    /// Sample genotype calls and the map's marker set differ in content
    #[error("genotype calls do not match the map's marker set (first mismatch at sorted position {position})")]
    GenotypeCallMismatch { position: usize },

    /// Individuals must carry at least one external identifier
    #[error("individual registration requires a non-empty external id list")]
    EmptyExternalIds,

    /// Configuration errors (zero capacities and the like)
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Snapshot or manifest file is unreadable
    #[error("corrupt store file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Type alias for Results using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a duplicate-key error for a collection
    pub fn duplicate(collection: &'static str, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection,
            key: key.into(),
        }
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a corrupt-file error
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}
