use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Parser};

use crate::db::SqliteStore;
use crate::service::RetrievalLimits;
use crate::universe::valid_pool_size;

/// Where the PIN pool lives.
///
/// Environment variable: `PIN_DB_PATH`
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to the SQLite database file
    #[arg(long, env = "PIN_DB_PATH", default_value = "pins.db")]
    pub database: PathBuf,

    /// Keep the pool in an in-memory SQLite database (lost on exit)
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,
}

/// Bounds on a single PIN request.
#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    /// Maximum number of PINs a caller may request at once.
    ///
    /// Defaults to the size of the valid pool.
    ///
    /// Environment variable: `MAX_PINS_PER_REQUEST`
    #[arg(long, env = "MAX_PINS_PER_REQUEST")]
    pub max_pins_per_request: Option<usize>,

    /// Pool-wide resets allowed while serving one request.
    ///
    /// Environment variable: `MAX_ROLLOVERS`
    #[arg(long, env = "MAX_ROLLOVERS", default_value_t = 2)]
    pub max_rollovers: usize,
}

/// Runtime configuration for the `pin-server` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pin-server",
    version,
    about = "HTTP service handing out hard-to-guess 4-digit PINs"
)]
pub struct ServerArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub pool: PoolArgs,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:3000"))]
    pub server_addr: String,

    /// Load the PIN pool on startup if the store is empty.
    ///
    /// Environment variable: `AUTO_INITIALIZE`
    #[arg(long, env = "AUTO_INITIALIZE", default_value_t = false)]
    pub auto_initialize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store: StoreLocation,
    pub limits: RetrievalLimits,
}

impl ServiceConfig {
    pub fn open_store(&self) -> crate::Result<SqliteStore> {
        match &self.store {
            StoreLocation::File(path) => SqliteStore::open(path),
            StoreLocation::InMemory => SqliteStore::open_in_memory(),
        }
    }
}

impl TryFrom<(StoreArgs, PoolArgs)> for ServiceConfig {
    type Error = anyhow::Error;

    fn try_from((store, pool): (StoreArgs, PoolArgs)) -> Result<Self, Self::Error> {
        let pool_size = valid_pool_size();
        let max_request = pool.max_pins_per_request.unwrap_or(pool_size);

        if max_request == 0 {
            bail!("MAX_PINS_PER_REQUEST must be greater than 0");
        }

        if max_request > pool_size {
            bail!(
                "MAX_PINS_PER_REQUEST ({}) exceeds the valid PIN pool (max = {})",
                max_request,
                pool_size
            );
        }

        let location = if store.in_memory {
            StoreLocation::InMemory
        } else {
            StoreLocation::File(store.database)
        };

        Ok(Self {
            store: location,
            limits: RetrievalLimits {
                max_request,
                max_rollovers: pool.max_rollovers,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub server_addr: String,
    pub auto_initialize: bool,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        if args.server_addr.trim().is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        Ok(Self {
            service: ServiceConfig::try_from((args.store, args.pool))?,
            server_addr: args.server_addr,
            auto_initialize: args.auto_initialize,
        })
    }
}
