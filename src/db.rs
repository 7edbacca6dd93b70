use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pin::Pin;
use crate::store::{PinStore, PoolStats};

/// Event for the pool's audit trail (initial load, rollovers)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl PoolEvent {
    pub fn new(event_type: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        }
    }
}

pub const EVENT_POOL_INITIALIZED: &str = "pool_initialized";
pub const EVENT_ALLOCATIONS_RESET: &str = "allocations_reset";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // PIN Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL CHECK (length(code) = 4),
            allocated INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Pool Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pool_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pins_allocated ON pins(allocated)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pool_events_timestamp ON pool_events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &PoolEvent) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO pool_events (event_id, timestamp, event_type, data)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            data_json,
        ],
    )?;

    Ok(())
}

/// Most recent events first
pub fn get_pool_events(conn: &Connection, limit: usize) -> Result<Vec<PoolEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, data
         FROM pool_events
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (event_id, timestamp, event_type, data) in rows {
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::store(format!("bad event timestamp {:?}: {}", timestamp, e)))?;

        events.push(PoolEvent {
            event_id,
            timestamp,
            event_type,
            data: serde_json::from_str(&data)?,
        });
    }

    Ok(events)
}

pub fn count_pins(conn: &Connection) -> Result<PoolStats> {
    let (total, allocated): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(allocated), 0) FROM pins",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(PoolStats::from_counts(total as usize, allocated as usize))
}

// ============================================================================
// SQLite Store
// ============================================================================

/// PIN store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // Other handles on the same file wait for the write lock
        conn.busy_timeout(Duration::from_secs(5))?;

        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        debug!(path = %path.as_ref().display(), "opened PIN database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("database connection lock poisoned"))
    }

    pub fn events(&self, limit: usize) -> Result<Vec<PoolEvent>> {
        let conn = self.lock()?;
        get_pool_events(&conn, limit)
    }
}

impl PinStore for SqliteStore {
    fn is_initialized(&self) -> Result<bool> {
        let conn = self.lock()?;
        let initialized: bool =
            conn.query_row("SELECT EXISTS (SELECT 1 FROM pins)", [], |row| row.get(0))?;

        Ok(initialized)
    }

    /// One transaction for the whole batch: a duplicate code rolls everything back
    fn bulk_insert(&self, pins: &[Pin]) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare("INSERT INTO pins (code, allocated) VALUES (?1, ?2)")?;

            for pin in pins {
                match stmt.execute(params![pin.code, pin.allocated]) {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        warn!(code = %pin.code, "bulk insert rejected, rolling back");
                        return Ok(false);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if !pins.is_empty() {
            insert_event(
                &tx,
                &PoolEvent::new(EVENT_POOL_INITIALIZED, serde_json::json!({ "count": pins.len() })),
            )?;
        }

        tx.commit()?;
        info!(count = pins.len(), "bulk inserted PINs");

        Ok(!pins.is_empty())
    }

    /// Claims random unallocated rows with a single UPDATE ... RETURNING,
    /// inside an IMMEDIATE transaction so no other writer interleaves
    fn get_unallocated(&self, n: usize) -> Result<Vec<Pin>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pins = {
            let mut stmt = tx.prepare(
                "UPDATE pins SET allocated = 1
                 WHERE id IN (
                     SELECT id FROM pins
                     WHERE allocated = 0
                     ORDER BY RANDOM()
                     LIMIT ?1
                 )
                 RETURNING code, allocated",
            )?;

            let pins = stmt
                .query_map(params![n as i64], |row| {
                    Ok(Pin {
                        code: row.get(0)?,
                        allocated: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            pins
        };

        tx.commit()?;
        debug!(requested = n, claimed = pins.len(), "claimed unallocated PINs");

        Ok(pins)
    }

    fn reset_allocations(&self) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let rows = tx.execute("UPDATE pins SET allocated = 0", [])?;
        if rows > 0 {
            insert_event(
                &tx,
                &PoolEvent::new(EVENT_ALLOCATIONS_RESET, serde_json::json!({ "rows": rows })),
            )?;
        }

        tx.commit()?;
        Ok(rows > 0)
    }

    fn stats(&self) -> Result<PoolStats> {
        let conn = self.lock()?;
        count_pins(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{all_valid_pins, to_entities};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    /// Unique database file under the system temp dir, removed on drop
    struct TempDb(PathBuf);

    impl TempDb {
        fn new() -> Self {
            TempDb(std::env::temp_dir().join(format!("pin-pool-{}.db", uuid::Uuid::new_v4())))
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", self.0.display(), suffix));
            }
        }
    }

    #[test]
    fn test_setup_database_twice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        assert_eq!(count_pins(&conn).unwrap(), PoolStats::default());
    }

    #[test]
    fn test_bulk_insert_full_pool() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.is_initialized().unwrap());

        assert!(store.bulk_insert(&all_valid_pins()).unwrap());
        assert!(store.is_initialized().unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 9_580);
        assert_eq!(stats.unallocated, 9_580);

        let events = store.events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_POOL_INITIALIZED);
        assert_eq!(events[0].data["count"], 9_580);
    }

    #[test]
    fn test_bulk_insert_is_all_or_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.bulk_insert(&to_entities(["0001"])).unwrap();

        let inserted = store.bulk_insert(&to_entities(["0002", "0003", "0001"])).unwrap();

        assert!(!inserted);
        assert_eq!(store.stats().unwrap().total, 1, "partial batch rolled back");
    }

    #[test]
    fn test_get_unallocated_claims_distinct_pins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .bulk_insert(&to_entities(["0001", "0002", "0003", "0004", "0005"]))
            .unwrap();

        let first = store.get_unallocated(3).unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|pin| pin.allocated));

        let second = store.get_unallocated(3).unwrap();
        assert_eq!(second.len(), 2, "only two left unallocated");

        let codes: HashSet<String> = first.iter().chain(&second).map(|p| p.code.clone()).collect();
        assert_eq!(codes.len(), 5, "no PIN claimed twice");

        assert!(store.get_unallocated(1).unwrap().is_empty());
        assert!(store.get_unallocated(0).unwrap().is_empty());
        assert_eq!(store.stats().unwrap(), PoolStats::from_counts(5, 5));
    }

    #[test]
    fn test_reset_allocations() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.reset_allocations().unwrap(), "no rows to reset");

        store.bulk_insert(&to_entities(["0001", "0002"])).unwrap();
        store.get_unallocated(2).unwrap();

        assert!(store.reset_allocations().unwrap());
        assert_eq!(store.stats().unwrap().unallocated, 2);

        let events = store.events(10).unwrap();
        assert_eq!(events[0].event_type, EVENT_ALLOCATIONS_RESET);
        assert_eq!(events[0].data["rows"], 2);
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let event = PoolEvent::new("test_event", serde_json::json!({"test": "data"}));
        insert_event(&conn, &event).unwrap();

        let events = get_pool_events(&conn, 5).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].data["test"], "data");
    }

    #[test]
    fn test_in_memory_skips_wal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "memory");
    }

    #[test]
    fn test_file_database_uses_wal() {
        let db = TempDb::new();
        let store = SqliteStore::open(&db.0).unwrap();
        let conn = store.lock().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_concurrent_claims_are_disjoint() {
        let db = TempDb::new();
        let first = Arc::new(SqliteStore::open(&db.0).unwrap());
        let second = Arc::new(SqliteStore::open(&db.0).unwrap());
        assert!(first.bulk_insert(&all_valid_pins()).unwrap());

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let store = if i % 2 == 0 { first.clone() } else { second.clone() };
                thread::spawn(move || {
                    let mut claimed = Vec::new();
                    for _ in 0..50 {
                        claimed.extend(store.get_unallocated(20).unwrap());
                    }
                    claimed
                })
            })
            .collect();

        let mut codes = HashSet::new();
        let mut total = 0;
        for worker in workers {
            for pin in worker.join().unwrap() {
                total += 1;
                codes.insert(pin.code);
            }
        }

        assert_eq!(total, 8_000);
        assert_eq!(codes.len(), 8_000, "no PIN issued twice");
        assert_eq!(second.stats().unwrap().allocated, 8_000);
    }
}
