//! # Registries
//!
//! The typed collections of the store, one per entity family:
//! - `markers`: the canonical SNP catalog and its position/name indexes;
//! - `maps`: panels and their batched marker lists;
//! - `individuals`: biological subjects and their samples;
//! - `genotypes`: the dense block store.
//!
//! Every registry is `Send + Sync` and scopes each mutation to a single
//! write-lock acquisition; cross-collection operations (assigning markers
//! touches both maps and markers) are sequences of such single-collection
//! mutations, exactly as a document store without multi-document
//! transactions would run them.

pub mod genotypes;
pub mod individuals;
pub mod maps;
pub mod markers;

pub use genotypes::GenotypeBlockStore;
pub use individuals::{IndividualQuery, IndividualRegistry};
pub use maps::{MapQuery, MapRegistry};
pub use markers::{DuplicatePolicy, MarkerQuery, MarkerRegistry};
