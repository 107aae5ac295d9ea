//! # Document-Store Substrate
//!
//! The primitives the registries are built on:
//! - `index`: ordered unique and multikey indexes over `BTreeMap`, giving
//!   compound-key range scans and index-enforced duplicate detection;
//! - `counter`: the identifier allocator, an atomic per-entity sequence
//!   table;
//! - `snapshot`: the on-disk envelope every collection is persisted in.
//!
//! Each registry scopes every mutation to one lock acquisition, the
//! equivalent of a document store's atomic single-document update. The
//! unique indexes double as the concurrency control for duplicate
//! detection: a racing duplicate insert fails, it never wins silently.

pub mod counter;
pub mod index;
pub mod snapshot;

pub use counter::{CounterKind, CounterTable};
pub use index::{MultiIndex, UniqueIndex};
