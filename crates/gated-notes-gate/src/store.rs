//! Persistence for note and payment-request entries.
//!
//! The gate is the only writer. Every method is synchronous; callers on the
//! async side hold no lock across an await.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gated_notes::{NoteEntry, PaymentStatus, PrEntry};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("already exists: {0}")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref err, _) = e {
            if err.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Duplicate("primary key already present".to_string());
            }
        }
        StoreError::Database(e)
    }
}

/// Storage backend for the gate.
///
/// Implementations must be thread-safe (`Send + Sync`) and must make
/// [`GateStore::mark_paid`] a single conditional write.
pub trait GateStore: Send + Sync {
    /// Insert a new note. Fails with `Duplicate` if the id is taken.
    fn insert_note(&self, entry: &NoteEntry) -> Result<(), StoreError>;

    fn note(&self, note_id: &str) -> Result<Option<NoteEntry>, StoreError>;

    /// All notes, newest first.
    fn notes(&self) -> Result<Vec<NoteEntry>, StoreError>;

    /// The only mutation a note ever sees after insert.
    fn change_price(&self, note_id: &str, price: u64) -> Result<NoteEntry, StoreError>;

    /// Delete a note and its payment requests. Returns how many payment
    /// requests went with it.
    fn delete_note(&self, note_id: &str) -> Result<usize, StoreError>;

    /// Delete everything. Returns the number of notes removed.
    fn delete_all(&self) -> Result<usize, StoreError>;

    fn insert_payment_request(&self, entry: &PrEntry) -> Result<(), StoreError>;

    fn payment_request(&self, payment_hash: &str) -> Result<Option<PrEntry>, StoreError>;

    /// All payment requests, newest first.
    fn payment_requests(&self) -> Result<Vec<PrEntry>, StoreError>;

    /// Atomically move `UNPAID` to `PAID`.
    ///
    /// Returns `true` only for the caller that performed the transition;
    /// `false` if the entry was already paid.
    fn mark_paid(&self, payment_hash: &str) -> Result<bool, StoreError>;
}

/// In-memory store backed by DashMap. Lost on restart.
pub struct InMemoryGateStore {
    notes: DashMap<String, NoteEntry>,
    payment_requests: DashMap<String, PrEntry>,
}

impl InMemoryGateStore {
    pub fn new() -> Self {
        Self {
            notes: DashMap::new(),
            payment_requests: DashMap::new(),
        }
    }
}

impl Default for InMemoryGateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GateStore for InMemoryGateStore {
    fn insert_note(&self, entry: &NoteEntry) -> Result<(), StoreError> {
        match self.notes.entry(entry.note_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(entry.note_id.clone())),
            Entry::Vacant(v) => {
                v.insert(entry.clone());
                Ok(())
            }
        }
    }

    fn note(&self, note_id: &str) -> Result<Option<NoteEntry>, StoreError> {
        Ok(self.notes.get(note_id).map(|e| e.value().clone()))
    }

    fn notes(&self) -> Result<Vec<NoteEntry>, StoreError> {
        let mut all: Vec<NoteEntry> = self.notes.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.note_id.cmp(&b.note_id))
        });
        Ok(all)
    }

    fn change_price(&self, note_id: &str, price: u64) -> Result<NoteEntry, StoreError> {
        let mut entry = self
            .notes
            .get_mut(note_id)
            .ok_or_else(|| StoreError::NotFound(note_id.to_string()))?;
        entry.price = price;
        Ok(entry.clone())
    }

    fn delete_note(&self, note_id: &str) -> Result<usize, StoreError> {
        if self.notes.remove(note_id).is_none() {
            return Err(StoreError::NotFound(note_id.to_string()));
        }
        let before = self.payment_requests.len();
        self.payment_requests.retain(|_, pr| pr.note_id != note_id);
        Ok(before - self.payment_requests.len())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let removed = self.notes.len();
        self.notes.clear();
        self.payment_requests.clear();
        Ok(removed)
    }

    fn insert_payment_request(&self, entry: &PrEntry) -> Result<(), StoreError> {
        match self.payment_requests.entry(entry.payment_hash.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(entry.payment_hash.clone())),
            Entry::Vacant(v) => {
                v.insert(entry.clone());
                Ok(())
            }
        }
    }

    fn payment_request(&self, payment_hash: &str) -> Result<Option<PrEntry>, StoreError> {
        Ok(self
            .payment_requests
            .get(payment_hash)
            .map(|e| e.value().clone()))
    }

    fn payment_requests(&self) -> Result<Vec<PrEntry>, StoreError> {
        let mut all: Vec<PrEntry> = self
            .payment_requests
            .iter()
            .map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.payment_hash.cmp(&b.payment_hash))
        });
        Ok(all)
    }

    fn mark_paid(&self, payment_hash: &str) -> Result<bool, StoreError> {
        // get_mut holds the shard write lock for the whole check-and-set
        let mut entry = self
            .payment_requests
            .get_mut(payment_hash)
            .ok_or_else(|| StoreError::NotFound(payment_hash.to_string()))?;
        if entry.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }
        entry.payment_status = PaymentStatus::Paid;
        Ok(true)
    }
}

/// Persistent store backed by SQLite. Survives restarts.
pub struct SqliteGateStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        note_id TEXT PRIMARY KEY,
        lud16 TEXT NOT NULL,
        price INTEGER NOT NULL,
        secret TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS payment_requests (
        payment_hash TEXT PRIMARY KEY,
        note_id TEXT NOT NULL,
        pr TEXT NOT NULL,
        verify TEXT NOT NULL,
        status TEXT,
        payment_status TEXT NOT NULL DEFAULT 'UNPAID',
        success_action TEXT NOT NULL,
        routes TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_payment_requests_note ON payment_requests(note_id);
";

const NOTE_COLUMNS: &str = "note_id, lud16, price, secret, created_at";

const PR_COLUMNS: &str =
    "payment_hash, note_id, pr, verify, status, payment_status, success_action, routes, created_at";

impl SqliteGateStore {
    /// Open (or create) the database at `path`.
    ///
    /// On Unix the file is restricted to 0600 since it holds note secrets.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(
                    path = %path,
                    error = %e,
                    "failed to set gate database file permissions to 0600"
                );
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| {
            tracing::error!("gate store mutex poisoned");
            StoreError::LockPoisoned
        })
    }
}

/// Raw row as stored, before domain conversion.
struct NoteRow {
    note_id: String,
    lud16: String,
    price: i64,
    secret: String,
    created_at: i64,
}

impl NoteRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            note_id: row.get(0)?,
            lud16: row.get(1)?,
            price: row.get(2)?,
            secret: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_entry(self) -> Result<NoteEntry, StoreError> {
        let price = u64::try_from(self.price).map_err(|_| {
            StoreError::Corrupt(format!("note {} has price {}", self.note_id, self.price))
        })?;
        Ok(NoteEntry {
            note_id: self.note_id,
            lud16: self.lud16,
            price,
            secret: self.secret,
            created_at: self.created_at,
        })
    }
}

struct PrRow {
    payment_hash: String,
    note_id: String,
    pr: String,
    verify: String,
    status: Option<String>,
    payment_status: String,
    success_action: String,
    routes: String,
    created_at: i64,
}

impl PrRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            payment_hash: row.get(0)?,
            note_id: row.get(1)?,
            pr: row.get(2)?,
            verify: row.get(3)?,
            status: row.get(4)?,
            payment_status: row.get(5)?,
            success_action: row.get(6)?,
            routes: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<PrEntry, StoreError> {
        let corrupt = |what: &str| {
            StoreError::Corrupt(format!("payment request {} has bad {what}", self.payment_hash))
        };
        let payment_status =
            PaymentStatus::parse(&self.payment_status).ok_or_else(|| corrupt("payment_status"))?;
        let success_action =
            serde_json::from_str(&self.success_action).map_err(|_| corrupt("success_action"))?;
        let routes = serde_json::from_str(&self.routes).map_err(|_| corrupt("routes"))?;

        Ok(PrEntry {
            payment_hash: self.payment_hash,
            note_id: self.note_id,
            invoice: self.pr,
            verify_token: self.verify,
            status: self.status,
            payment_status,
            success_action,
            routes,
            created_at: self.created_at,
        })
    }
}

fn price_to_sql(price: u64) -> Result<i64, StoreError> {
    i64::try_from(price).map_err(|_| StoreError::OutOfRange(format!("price {price}")))
}

impl GateStore for SqliteGateStore {
    fn insert_note(&self, entry: &NoteEntry) -> Result<(), StoreError> {
        let price = price_to_sql(entry.price)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (note_id, lud16, price, secret, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.note_id, entry.lud16, price, entry.secret, entry.created_at],
        )
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(entry.note_id.clone()),
            other => other,
        })?;
        Ok(())
    }

    fn note(&self, note_id: &str) -> Result<Option<NoteEntry>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE note_id = ?1"),
                params![note_id],
                NoteRow::from_row,
            )
            .optional()?;
        row.map(NoteRow::into_entry).transpose()
    }

    fn notes(&self) -> Result<Vec<NoteEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, note_id ASC"
        ))?;
        let rows = stmt.query_map([], NoteRow::from_row)?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?.into_entry()?);
        }
        Ok(notes)
    }

    fn change_price(&self, note_id: &str, price: u64) -> Result<NoteEntry, StoreError> {
        let price = price_to_sql(price)?;
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "UPDATE notes SET price = ?1 WHERE note_id = ?2 RETURNING {NOTE_COLUMNS}"
                ),
                params![price, note_id],
                NoteRow::from_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::NotFound(note_id.to_string()))?
            .into_entry()
    }

    fn delete_note(&self, note_id: &str) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed_requests = tx.execute(
            "DELETE FROM payment_requests WHERE note_id = ?1",
            params![note_id],
        )?;
        let removed_notes = tx.execute("DELETE FROM notes WHERE note_id = ?1", params![note_id])?;
        if removed_notes == 0 {
            // dropping the transaction rolls back
            return Err(StoreError::NotFound(note_id.to_string()));
        }
        tx.commit()?;
        Ok(removed_requests)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM payment_requests", [])?;
        let removed = tx.execute("DELETE FROM notes", [])?;
        tx.commit()?;
        Ok(removed)
    }

    fn insert_payment_request(&self, entry: &PrEntry) -> Result<(), StoreError> {
        let success_action = serde_json::to_string(&entry.success_action)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let routes =
            serde_json::to_string(&entry.routes).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO payment_requests ({PR_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                entry.payment_hash,
                entry.note_id,
                entry.invoice,
                entry.verify_token,
                entry.status,
                entry.payment_status.as_str(),
                success_action,
                routes,
                entry.created_at,
            ],
        )
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(entry.payment_hash.clone()),
            other => other,
        })?;
        Ok(())
    }

    fn payment_request(&self, payment_hash: &str) -> Result<Option<PrEntry>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {PR_COLUMNS} FROM payment_requests WHERE payment_hash = ?1"),
                params![payment_hash],
                PrRow::from_row,
            )
            .optional()?;
        row.map(PrRow::into_entry).transpose()
    }

    fn payment_requests(&self) -> Result<Vec<PrEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PR_COLUMNS} FROM payment_requests ORDER BY created_at DESC, payment_hash ASC"
        ))?;
        let rows = stmt.query_map([], PrRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    fn mark_paid(&self, payment_hash: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE payment_requests SET payment_status = 'PAID'
             WHERE payment_hash = ?1 AND payment_status = 'UNPAID'",
            params![payment_hash],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM payment_requests WHERE payment_hash = ?1",
                params![payment_hash],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(payment_hash.to_string())),
        }
    }
}
