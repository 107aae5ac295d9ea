//! # snpstore: An Embedded SNP Genotype Store
//!
//! Persistent data model for large-scale SNP genotype data: markers, maps
//! (genotyping panels), individuals and their samples, and densely packed
//! genotype blocks, plus the indexing and identifier-allocation scheme that
//! keeps lookup and range queries efficient at scale.
//!
//! ## Module Structure
//! ```text
//! snpstore
//! ├── data        # Entity documents and id newtypes
//! ├── store       # Substrate: indexes, counters, snapshot format
//! ├── registry    # Typed collections (markers, maps, individuals, blocks)
//! ├── db          # SnpStore facade and schema lifecycle
//! ├── config      # Capacity configuration
//! └── error       # Centralized error type
//! ```
//!
//! ## Example
//! ```no_run
//! use snpstore::{MapMeta, MarkerSpec, SnpStore, StoreConfig};
//! use snpstore::data::Chromosome;
//!
//! # fn main() -> snpstore::Result<()> {
//! let store = SnpStore::create("herd.snpstore", StoreConfig::default())?;
//!
//! let rs1 = store.register_marker(MarkerSpec::new(Chromosome(1), 12_345).with_name("rs1"))?;
//! let map = store.create_map(MapMeta::named("50k_chip"))?;
//! store.assign_markers(map, &[rs1])?;
//!
//! let ind = store.register_individual(vec!["BR123".into()])?;
//! store.add_sample(ind, map, "S1")?;
//! store.save()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use config::StoreConfig;
pub use data::{
    BlockNumber, Chromosome, Genotype, GenotypeCall, IndividualId, MapId, MapMeta, MarkerId,
    MarkerSpec, Position, SampleId, SampleKey,
};
pub use db::{SnpStore, StoreStats, SCHEMA_VERSION};
pub use error::{Result, StoreError};
pub use registry::{DuplicatePolicy, IndividualQuery, MapQuery, MarkerQuery};
pub use store::CounterKind;
