//! Record persistence: append-only location history.
//!
//! `RecordStore` is the seam the ingestion pipeline writes through. Two
//! backends: `SqliteStore` (WAL-mode SQLite, the system of record) and
//! `MemoryStore` (process-local, for `--memory` runs and tests).
//!
//! Ordering contract for both: ascending by timestamp, ties broken by
//! insertion order. "Latest" is the greatest timestamp, ties going to the
//! most recently inserted record.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use uuid::Uuid;

use vtrack_core::{LocationRecord, Result, TrackError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT UNIQUE NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    speed REAL NOT NULL,
    timestamp_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp_us, seq);
"#;

/// Opaque identifier for a newly stored record.
fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist `record` and return its generated id. Any id already set on
    /// the record is ignored.
    async fn append(&self, record: &LocationRecord) -> Result<String>;

    async fn find_latest(&self) -> Result<Option<LocationRecord>>;

    async fn find_all_ordered(&self) -> Result<Vec<LocationRecord>>;

    async fn count(&self) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Synchronous SQLite handle. Used directly by the offline CLI commands and
/// wrapped by `SqliteStore` for the server.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Database { conn })
    }

    /// Open in-memory database (for testing).
    #[cfg(test)]
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    pub fn insert(&mut self, record: &LocationRecord) -> SqlResult<String> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO records (id, latitude, longitude, speed, timestamp_us)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                record.latitude,
                record.longitude,
                record.speed,
                record.timestamp.timestamp_micros()
            ],
        )?;
        Ok(id)
    }

    pub fn latest(&self) -> SqlResult<Option<LocationRecord>> {
        self.conn
            .query_row(
                "SELECT id, latitude, longitude, speed, timestamp_us
                 FROM records ORDER BY timestamp_us DESC, seq DESC LIMIT 1",
                [],
                row_to_record,
            )
            .optional()
    }

    pub fn all_ordered(&self) -> SqlResult<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, latitude, longitude, speed, timestamp_us
             FROM records ORDER BY timestamp_us ASC, seq ASC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let records = rows.collect::<SqlResult<Vec<_>>>();
        records
    }

    pub fn count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))
    }
}

fn row_to_record(r: &rusqlite::Row<'_>) -> SqlResult<LocationRecord> {
    let micros: i64 = r.get(4)?;
    let timestamp = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, micros))?;
    Ok(LocationRecord {
        id: Some(r.get(0)?),
        latitude: r.get(1)?,
        longitude: r.get(2)?,
        speed: r.get(3)?,
        timestamp,
    })
}

/// Async `RecordStore` over a mutex-guarded SQLite connection. Every call
/// runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> SqlResult<Self> {
        Ok(SqliteStore {
            db: Arc::new(Mutex::new(Database::open(path)?)),
        })
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> SqlResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| TrackError::Persistence(e.to_string()))?
        .map_err(|e| TrackError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn append(&self, record: &LocationRecord) -> Result<String> {
        let record = record.clone();
        self.with_db(move |db| db.insert(&record)).await
    }

    async fn find_latest(&self) -> Result<Option<LocationRecord>> {
        self.with_db(|db| db.latest()).await
    }

    async fn find_all_ordered(&self) -> Result<Vec<LocationRecord>> {
        self.with_db(|db| db.all_ordered()).await
    }

    async fn count(&self) -> Result<i64> {
        self.with_db(|db| db.count()).await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store. Records live in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LocationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<LocationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, record: &LocationRecord) -> Result<String> {
        let id = new_id();
        self.records().push(record.clone().with_id(id.clone()));
        Ok(id)
    }

    async fn find_latest(&self) -> Result<Option<LocationRecord>> {
        // max_by_key keeps the last maximum, i.e. the newest insert on ties
        Ok(self
            .records()
            .iter()
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    async fn find_all_ordered(&self) -> Result<Vec<LocationRecord>> {
        let mut all = self.records().clone();
        all.sort_by_key(|r| r.timestamp); // stable
        Ok(all)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records().len() as i64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
