//! Initialization workflow and the allocation coordinator.
//!
//! Both take the store as an explicit collaborator. [`retrieve`] serves a
//! request from the currently unallocated PINs and, on a shortfall, resets
//! the whole pool and keeps going. The loop is bounded: a request larger than
//! the pool, or a store that stays empty after a reset, ends in an error
//! instead of spinning forever.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pin::Pin;
use crate::store::PinStore;
use crate::universe::{all_valid_pins, valid_pool_size};

/// Bounds applied to a single retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
    /// Largest request accepted in one call
    pub max_request: usize,

    /// Pool-wide resets allowed while serving one call
    pub max_rollovers: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        RetrievalLimits {
            max_request: valid_pool_size(),
            max_rollovers: 2,
        }
    }
}

/// Load the valid pool into an empty store; no-op once the store holds PINs.
///
/// Returns the store's own verdict on the bulk insert.
pub fn initialize<S: PinStore + ?Sized>(store: &S) -> Result<bool> {
    if store.is_initialized()? {
        debug!("PIN pool already initialized");
        return Ok(true);
    }

    let pins = all_valid_pins();
    info!(count = pins.len(), "initializing PIN pool");

    let inserted = store.bulk_insert(&pins)?;
    if !inserted {
        warn!("bulk insert of the PIN pool did not complete");
    }

    Ok(inserted)
}

/// Collect PINs until `accumulated` holds `requested` of them.
///
/// Each round asks the store for the outstanding remainder. When the store
/// comes up short, every stored PIN is marked unallocated again (including
/// PINs issued to other callers) and the next round starts.
pub fn retrieve<S: PinStore + ?Sized>(
    store: &S,
    requested: usize,
    mut accumulated: Vec<Pin>,
    limits: &RetrievalLimits,
) -> Result<Vec<Pin>> {
    if accumulated.len() >= requested {
        return Ok(accumulated);
    }

    // Bounds apply to what is still needed, not to PINs already collected
    let needed = requested - accumulated.len();
    if needed > limits.max_request {
        return Err(Error::RequestTooLarge {
            requested: needed,
            max: limits.max_request,
        });
    }

    let capacity = store.stats()?.total;
    if capacity == 0 {
        return Err(Error::PoolNotInitialized);
    }
    if needed > capacity {
        return Err(Error::RequestExceedsCapacity {
            requested: needed,
            capacity,
        });
    }

    let mut rollovers = 0;
    loop {
        let outstanding = requested - accumulated.len();
        let got = store.get_unallocated(outstanding)?;
        let fetched = got.len();
        accumulated.extend(got);

        debug!(outstanding, fetched, collected = accumulated.len(), "fetched PINs");

        if accumulated.len() >= requested {
            return Ok(accumulated);
        }

        // An empty fetch straight after a reset means the store will never
        // hand anything out
        if rollovers > 0 && fetched == 0 {
            return Err(Error::PoolExhausted {
                requested,
                collected: accumulated.len(),
            });
        }

        if rollovers >= limits.max_rollovers {
            warn!(
                requested,
                collected = accumulated.len(),
                rollovers,
                "rollover limit reached before request was filled"
            );
            return Err(Error::PoolExhausted {
                requested,
                collected: accumulated.len(),
            });
        }

        warn!(
            outstanding = requested - accumulated.len(),
            "PIN pool exhausted, resetting allocations for every PIN"
        );
        store.reset_allocations()?;
        rollovers += 1;
    }
}

/// Store plus limits, the way the binaries use it
pub struct PinService<S> {
    store: S,
    limits: RetrievalLimits,
}

impl<S: PinStore> PinService<S> {
    pub fn new(store: S) -> Self {
        Self::with_limits(store, RetrievalLimits::default())
    }

    pub fn with_limits(store: S, limits: RetrievalLimits) -> Self {
        PinService { store, limits }
    }

    pub fn initialize(&self) -> Result<bool> {
        initialize(&self.store)
    }

    pub fn get_pins(&self, requested: usize) -> Result<Vec<Pin>> {
        let pins = retrieve(&self.store, requested, Vec::new(), &self.limits)?;
        info!(requested, issued = pins.len(), "issued PINs");
        Ok(pins)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> &RetrievalLimits {
        &self.limits
    }
}
