//! Error types for the PIN pool.
//!
//! A shortfall of unallocated PINs is not an error: it is what triggers a
//! rollover. The variants here cover store failures, bad input, and the
//! requests a rollover can never satisfy.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the PIN pool.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying SQLite failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not complete an operation.
    #[error("Store unavailable: {context}")]
    Store { context: String },

    /// Input is not a 4-digit code.
    #[error("Invalid PIN code {code:?}: {reason}")]
    InvalidCode { code: String, reason: String },

    /// The request itself could not be understood.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// More PINs were requested than the pool holds.
    #[error("Requested {requested} PINs but the pool only holds {capacity}")]
    RequestExceedsCapacity { requested: usize, capacity: usize },

    /// More PINs were requested than a single call may return.
    #[error("Requested {requested} PINs but at most {max} may be requested at once")]
    RequestTooLarge { requested: usize, max: usize },

    /// The store holds no PINs at all.
    #[error("PIN pool has not been initialized")]
    PoolNotInitialized,

    /// Rollovers did not free enough PINs to finish the request.
    #[error("PIN pool exhausted: collected {collected} of {requested} requested PINs")]
    PoolExhausted { requested: usize, collected: usize },
}

impl Error {
    pub fn store(context: impl Into<String>) -> Self {
        Error::Store {
            context: context.into(),
        }
    }

    /// True for errors caused by the caller's request rather than the pool.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidCode { .. }
                | Error::InvalidRequest { .. }
                | Error::RequestExceedsCapacity { .. }
                | Error::RequestTooLarge { .. }
        )
    }
}
