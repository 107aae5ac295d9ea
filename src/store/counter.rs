//! # Identifier Allocator
//!
//! Monotonically increasing integer identifiers, one sequence per entity
//! kind. The read-and-increment is a single locked operation, never a read
//! followed by a separate write, so concurrent callers can never observe the
//! same value twice. Identifiers are never reused after deletion.
//!
//! Counter rows are provisioned at schema-creation time with `next_value = 0`;
//! allocating against a kind that was never provisioned is an error, not an
//! implicit creation.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Entity kinds with allocator-issued identifiers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum CounterKind {
    Markers,
    Maps,
    Individuals,
}

impl CounterKind {
    /// All kinds provisioned at schema creation
    pub const ALL: [CounterKind; 3] = [
        CounterKind::Markers,
        CounterKind::Maps,
        CounterKind::Individuals,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::Markers => "markers",
            CounterKind::Maps => "maps",
            CounterKind::Individuals => "individuals",
        }
    }
}

/// The counter table: one `next_value` row per provisioned entity kind
#[derive(Debug, Default)]
pub struct CounterTable {
    rows: Mutex<BTreeMap<CounterKind, u64>>,
}

impl CounterTable {
    /// An empty table with no provisioned counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a counter row with `next_value = 0`; keeps an existing row
    pub fn provision(&self, kind: CounterKind) {
        self.lock().entry(kind).or_insert(0);
    }

    /// Allocate the next identifier for `kind`
    pub fn allocate(&self, kind: CounterKind) -> Result<u64> {
        self.allocate_many(kind, 1)
    }

    /// Reserve `n` consecutive identifiers, returning the first
    ///
    /// Bulk registration reserves the whole range up front so concurrent
    /// imports interleave at range granularity, not per id.
    pub fn allocate_many(&self, kind: CounterKind, n: u64) -> Result<u64> {
        let mut rows = self.lock();
        let next = rows
            .get_mut(&kind)
            .ok_or(StoreError::UninitializedCounter {
                entity: kind.as_str(),
            })?;
        let first = *next;
        *next += n;
        Ok(first)
    }

    /// Current `next_value` without allocating
    pub fn peek(&self, kind: CounterKind) -> Result<u64> {
        self.lock()
            .get(&kind)
            .copied()
            .ok_or(StoreError::UninitializedCounter {
                entity: kind.as_str(),
            })
    }

    /// Copy of all rows, for persistence
    pub fn snapshot(&self) -> BTreeMap<CounterKind, u64> {
        self.lock().clone()
    }

    /// Restore rows from a snapshot, replacing the current table
    pub fn restore(&self, rows: BTreeMap<CounterKind, u64>) {
        *self.lock() = rows;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<CounterKind, u64>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
