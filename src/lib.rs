// PIN Pool - Core Library
// Shared by the pin-pool CLI and the pin-server binary

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod pin;
pub mod rules;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod universe;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use db::{get_pool_events, setup_database, PoolEvent, SqliteStore};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use pin::{Pin, PIN_LENGTH};
pub use rules::{
    contains_pairs, contains_repeat, is_logical_year, is_palindromic, is_sequential, is_valid,
    parse_code, RuleEngine, RuleReport, WeakPinRule,
};
pub use service::{initialize, retrieve, PinService, RetrievalLimits};
pub use store::{PinStore, PoolStats};
pub use universe::{all_possible, all_valid, all_valid_pins, to_entities, valid_pool_size};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
