// 🧠 In-memory PIN store
// Same contract as the SQLite store, held in a Vec behind a RwLock.
// Claims hand out the lowest unallocated codes first (deterministic).

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::pin::Pin;
use crate::store::{PinStore, PoolStats};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Kept sorted by code
    pins: Arc<RwLock<Vec<Pin>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Pin>>> {
        self.pins
            .read()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Pin>>> {
        self.pins
            .write()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }
}

impl PinStore for MemoryStore {
    fn is_initialized(&self) -> Result<bool> {
        Ok(!self.read()?.is_empty())
    }

    /// All-or-nothing: a batch carrying an existing or repeated code is rejected whole
    fn bulk_insert(&self, pins: &[Pin]) -> Result<bool> {
        let mut stored = self.write()?;

        let mut seen: HashSet<&str> = stored.iter().map(|pin| pin.code.as_str()).collect();
        if !pins.iter().all(|pin| seen.insert(pin.code.as_str())) {
            return Ok(false);
        }

        stored.extend(pins.iter().cloned());
        stored.sort_by(|a, b| a.code.cmp(&b.code));

        Ok(!pins.is_empty())
    }

    fn get_unallocated(&self, n: usize) -> Result<Vec<Pin>> {
        let mut stored = self.write()?;

        let claimed = stored
            .iter_mut()
            .filter(|pin| !pin.allocated)
            .take(n)
            .map(|pin| {
                pin.allocated = true;
                pin.clone()
            })
            .collect();

        Ok(claimed)
    }

    fn reset_allocations(&self) -> Result<bool> {
        let mut stored = self.write()?;

        for pin in stored.iter_mut() {
            pin.allocated = false;
        }

        Ok(!stored.is_empty())
    }

    fn stats(&self) -> Result<PoolStats> {
        let stored = self.read()?;
        let allocated = stored.iter().filter(|pin| pin.allocated).count();

        Ok(PoolStats::from_counts(stored.len(), allocated))
    }
}
