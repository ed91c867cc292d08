//! Notification store - SQLite-backed unified inbox
//!
//! One writer connection (inserts and read-marking are serialized behind its
//! mutex) and one reader connection. The database runs in WAL mode, so a
//! reader always sees a committed snapshot and never waits on a writer.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::item::{ItemType, NewItem, NotificationItem};
use crate::error::StoreError;

/// Database file name inside the data directory
pub const DB_FILE: &str = "inbox.db";

const COLUMNS: &str =
    "id, type, source, title, body, metadata, notify, received_at, read, external_id";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    received_at TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'other',
    source TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}',
    read INTEGER DEFAULT 0,
    notify INTEGER NOT NULL DEFAULT 1,
    external_id TEXT
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_inbox_received ON inbox(received_at DESC);
CREATE INDEX IF NOT EXISTS idx_inbox_type ON inbox(type);
CREATE UNIQUE INDEX IF NOT EXISTS idx_inbox_dedup
    ON inbox(type, source, external_id) WHERE external_id IS NOT NULL;
"#;

/// Result of an insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(NotificationItem),
    /// `(type, source, external_id)` already stored under this id
    Duplicate(i64),
}

/// Per-type totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub total: u64,
    pub unread: u64,
}

/// Unified inbox storage
pub struct NotificationStore {
    path: PathBuf,
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl NotificationStore {
    /// Open (or create) the store under `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE);

        let writer = Connection::open(&path)?;
        writer.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        writer.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::migrate(&writer)?;

        let reader = Connection::open(&path)?;
        reader.busy_timeout(std::time::Duration::from_secs(5))?;
        register_fold_case(&reader)?;

        info!(path = %path.display(), "Notification store opened");

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run store work on the blocking pool so async workers never wait on SQLite
    pub async fn run_blocking<T, E, F>(self: &Arc<Self>, work: F) -> Result<T, E>
    where
        F: FnOnce(&NotificationStore) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| E::from(StoreError::Task(e.to_string())))?
    }

    /// Create the schema, upgrade older inbox tables and import the legacy
    /// email-only table if present
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        let had_inbox = table_exists(conn, "inbox")?;
        conn.execute_batch(SCHEMA)?;

        if had_inbox {
            let columns = table_columns(conn, "inbox")?;
            if !columns.iter().any(|c| c == "notify") {
                conn.execute_batch("ALTER TABLE inbox ADD COLUMN notify INTEGER NOT NULL DEFAULT 1")?;
            }
            if !columns.iter().any(|c| c == "external_id") {
                conn.execute_batch("ALTER TABLE inbox ADD COLUMN external_id TEXT")?;
            }
        }

        conn.execute_batch(INDEXES)?;

        if !had_inbox && table_exists(conn, "emails")? {
            let migrated = conn.execute(
                "INSERT OR IGNORE INTO inbox (received_at, type, source, title, body, metadata, read, external_id)
                 SELECT received_at, 'email', sender, subject, body,
                        json_object('to', raw_to, 'message_id', message_id),
                        read, NULLIF(message_id, '')
                 FROM emails",
                [],
            )?;
            info!(count = migrated, "Migrated legacy emails into unified inbox");
        }

        Ok(())
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.writer.lock().map_err(|_| StoreError::Poisoned)
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.reader.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a normalized item, dropping it when its external id was already
    /// seen for the same type and source
    pub fn insert(&self, item: &NewItem) -> Result<InsertOutcome, StoreError> {
        let metadata = serde_json::to_string(&item.metadata)?;
        let conn = self.writer()?;

        // Timestamp taken under the writer lock so id order and time order agree
        let received_at = Utc::now();
        let changed = conn.execute(
            "INSERT INTO inbox (received_at, type, source, title, body, metadata, notify, read, external_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
             ON CONFLICT DO NOTHING",
            params![
                format_timestamp(&received_at),
                item.item_type.as_str(),
                item.source,
                item.title,
                item.body,
                metadata,
                item.notify,
                item.external_id,
            ],
        )?;

        if changed == 0 {
            let existing: i64 = conn.query_row(
                "SELECT id FROM inbox WHERE type = ?1 AND source = ?2 AND external_id = ?3",
                params![item.item_type.as_str(), item.source, item.external_id],
                |row| row.get(0),
            )?;
            debug!(existing_id = existing, external_id = ?item.external_id, "Duplicate item dropped");
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let id = conn.last_insert_rowid();
        Ok(InsertOutcome::Inserted(NotificationItem {
            id,
            item_type: item.item_type,
            source: item.source.clone(),
            title: item.title.clone(),
            body: item.body.clone(),
            metadata: item.metadata.clone(),
            notify: item.notify,
            received_at,
            read: false,
            external_id: item.external_id.clone(),
        }))
    }

    /// Most recent items (optionally of one type); marks the returned items read
    ///
    /// Items are returned with the `read` flag they had before this call.
    pub fn list_by_type(
        &self,
        filter: Option<ItemType>,
        limit: usize,
    ) -> Result<Vec<NotificationItem>, StoreError> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        let items = select_recent(&tx, filter, limit)?;
        {
            let mut stmt = tx.prepare("UPDATE inbox SET read = 1 WHERE id = ?1 AND (read = 0 OR read IS NULL)")?;
            for item in items.iter().filter(|i| !i.read) {
                stmt.execute(params![item.id])?;
            }
        }
        tx.commit()?;
        Ok(items)
    }

    /// Most recent items without touching read state
    pub fn recent(
        &self,
        filter: Option<ItemType>,
        limit: usize,
    ) -> Result<Vec<NotificationItem>, StoreError> {
        let conn = self.reader()?;
        select_recent(&conn, filter, limit)
    }

    /// Substring match against title, body and source. Case folding is
    /// Unicode-aware (`Ü` matches `ü`) and the keyword is taken literally.
    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<NotificationItem>, StoreError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let needle = keyword.to_lowercase();

        let conn = self.reader()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM inbox
             WHERE instr(fold_case(title), ?1) > 0
                OR instr(fold_case(body), ?1) > 0
                OR instr(fold_case(source), ?1) > 0
             ORDER BY received_at DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![needle, limit as i64], row_to_item)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark the given ids read; returns how many changed
    pub fn mark_read(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare("UPDATE inbox SET read = 1 WHERE id = ?1 AND (read = 0 OR read IS NULL)")?;
            for id in ids {
                changed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Totals and unread counts per type
    pub fn counts(&self) -> Result<BTreeMap<ItemType, TypeCounts>, StoreError> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*), SUM(CASE WHEN read = 0 OR read IS NULL THEN 1 ELSE 0 END)
             FROM inbox GROUP BY type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            ))
        })?;

        let mut counts: BTreeMap<ItemType, TypeCounts> = BTreeMap::new();
        for row in rows {
            let (raw_type, total, unread) = row?;
            let entry = counts.entry(ItemType::normalize(&raw_type)).or_default();
            entry.total += total as u64;
            entry.unread += unread as u64;
        }
        Ok(counts)
    }

    pub fn unread_count(&self, filter: Option<ItemType>) -> Result<u64, StoreError> {
        let conn = self.reader()?;
        let count: i64 = match filter {
            Some(t) => conn.query_row(
                "SELECT COUNT(*) FROM inbox WHERE (read = 0 OR read IS NULL) AND type = ?1",
                params![t.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM inbox WHERE read = 0 OR read IS NULL",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    pub fn get(&self, id: i64) -> Result<Option<NotificationItem>, StoreError> {
        let conn = self.reader()?;
        let item = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM inbox WHERE id = ?1"),
                params![id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }
}

fn select_recent(
    conn: &Connection,
    filter: Option<ItemType>,
    limit: usize,
) -> Result<Vec<NotificationItem>, StoreError> {
    let items = match filter {
        Some(t) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM inbox WHERE type = ?1 ORDER BY received_at DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![t.as_str(), limit as i64], row_to_item)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM inbox ORDER BY received_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit as i64], row_to_item)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(items)
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<NotificationItem> {
    let raw_type: String = row.get(1)?;
    let metadata: String = row.get(5)?;
    let received_at: String = row.get(7)?;

    Ok(NotificationItem {
        id: row.get(0)?,
        item_type: ItemType::normalize(&raw_type),
        source: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        notify: row.get::<_, Option<bool>>(6)?.unwrap_or(true),
        received_at: parse_timestamp(&received_at),
        read: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
        external_id: row.get(9)?,
    })
}

/// Fixed-width UTC timestamp so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// `fold_case(text)`: Unicode lowercase, since SQLite's own folding is ASCII-only
fn register_fold_case(conn: &Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
