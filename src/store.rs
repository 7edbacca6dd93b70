//! Persistence contract the pool depends on.
//!
//! Implementations must make [`PinStore::get_unallocated`] atomic: selecting
//! unallocated rows and marking them allocated happen as one indivisible
//! operation, otherwise concurrent callers can be issued the same PIN.

use serde::Serialize;

use crate::error::Result;
use crate::pin::Pin;

/// Counts over the stored pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub allocated: usize,
    pub unallocated: usize,
}

impl PoolStats {
    pub fn from_counts(total: usize, allocated: usize) -> Self {
        PoolStats {
            total,
            allocated,
            unallocated: total.saturating_sub(allocated),
        }
    }
}

pub trait PinStore: Send + Sync {
    /// True iff at least one PIN record exists.
    fn is_initialized(&self) -> Result<bool>;

    /// Persist every PIN; true iff all records were written.
    fn bulk_insert(&self, pins: &[Pin]) -> Result<bool>;

    /// Claim up to `n` unallocated PINs, marking them allocated in the same
    /// atomic step. Returns fewer than `n` only when fewer remain.
    fn get_unallocated(&self, n: usize) -> Result<Vec<Pin>>;

    /// Mark every stored PIN unallocated; true iff at least one row changed.
    fn reset_allocations(&self) -> Result<bool>;

    fn stats(&self) -> Result<PoolStats>;
}

impl<S: PinStore + ?Sized> PinStore for std::sync::Arc<S> {
    fn is_initialized(&self) -> Result<bool> {
        (**self).is_initialized()
    }

    fn bulk_insert(&self, pins: &[Pin]) -> Result<bool> {
        (**self).bulk_insert(pins)
    }

    fn get_unallocated(&self, n: usize) -> Result<Vec<Pin>> {
        (**self).get_unallocated(n)
    }

    fn reset_allocations(&self) -> Result<bool> {
        (**self).reset_allocations()
    }

    fn stats(&self) -> Result<PoolStats> {
        (**self).stats()
    }
}
