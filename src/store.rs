use crate::models::{Record, Result};
use chrono::Utc;
use mobc::{Manager, Pool};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::VecDeque;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Hands out unprocessed records and takes discovered emails back. The store
/// is the only shared mutable resource in the run, so both methods must be
/// safe under concurrent workers; durability cadence (persist on every
/// update or batch) is the store's own business.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Next unprocessed record, or `None` once the input is exhausted.
    async fn next(&self) -> Option<Record>;
    /// Put a pulled record back at the head of the queue, so a worker that
    /// cannot finish it hands it to a sibling instead of losing it.
    async fn requeue(&self, record: Record);
    /// Apply a discovered email to a record.
    async fn update(&self, id: i64, email: &str) -> Result<()>;
    /// Number of records this run started with.
    async fn count(&self) -> usize;
}

pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }
}

#[async_trait::async_trait]
impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        debug!("Opening database: {}", self.db_path);
        let conn = Connection::open(&self.db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "memory")?;

        init_database(&conn)?;
        Ok(conn)
    }

    async fn check(&self, conn: Self::Connection) -> std::result::Result<Self::Connection, Self::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(conn)
    }
}

fn init_database(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            website TEXT,
            email TEXT,
            updated_at TEXT
        )
        "#,
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_organizations_email ON organizations(email)",
        [],
    )?;
    Ok(())
}

pub type DbPool = Pool<SqliteManager>;

pub async fn create_db_pool(db_path: &str) -> Result<DbPool> {
    if let Some(parent) = Path::new(db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let manager = SqliteManager::new(db_path.to_string());
    let pool = Pool::builder().max_open(10).max_idle(5).build(manager);

    info!("✓ SQLite connection pool created: {}", db_path);
    Ok(pool)
}

/// SQLite-backed store. Pending records are loaded once at startup into a
/// work queue; every `update` is written through immediately, so a killed run
/// loses nothing already discovered.
pub struct SqliteRecordStore {
    pool: DbPool,
    queue: Mutex<VecDeque<Record>>,
    total: usize,
}

impl SqliteRecordStore {
    pub async fn open(db_path: &str) -> Result<Self> {
        let pool = create_db_pool(db_path).await?;
        let records = {
            let conn = pool.get().await?;
            load_pending(&conn)?
        };
        let total = records.len();
        info!("Loaded {} unprocessed records from {}", total, db_path);
        Ok(Self {
            pool,
            queue: Mutex::new(records),
            total,
        })
    }
}

fn load_pending(conn: &Connection) -> SqliteResult<VecDeque<Record>> {
    let mut stmt = conn.prepare(
        "SELECT id, website, email FROM organizations
         WHERE email IS NULL OR email = ''
         ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Record {
            id: row.get(0)?,
            website: row.get(1)?,
            email: row.get(2)?,
        })
    })?;
    rows.collect()
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    async fn next(&self) -> Option<Record> {
        self.queue.lock().await.pop_front()
    }

    async fn requeue(&self, record: Record) {
        self.queue.lock().await.push_front(record);
    }

    async fn update(&self, id: i64, email: &str) -> Result<()> {
        let conn = self.pool.get().await?;
        let changed = conn.execute(
            "UPDATE organizations SET email = ?1, updated_at = ?2 WHERE id = ?3",
            params![email, Utc::now().to_rfc3339(), id],
        )?;
        debug!("Persisted email for record {} ({} row)", id, changed);
        Ok(())
    }

    async fn count(&self) -> usize {
        self.total
    }
}

/// In-memory store for tests: same contract, no disk.
#[cfg(test)]
pub struct MemoryRecordStore {
    queue: Mutex<VecDeque<Record>>,
    pub updates: Mutex<Vec<(i64, String)>>,
    total: usize,
}

#[cfg(test)]
impl MemoryRecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        let total = records.len();
        Self {
            queue: Mutex::new(records.into()),
            updates: Mutex::new(Vec::new()),
            total,
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn next(&self) -> Option<Record> {
        self.queue.lock().await.pop_front()
    }

    async fn requeue(&self, record: Record) {
        self.queue.lock().await.push_front(record);
    }

    async fn update(&self, id: i64, email: &str) -> Result<()> {
        self.updates.lock().await.push((id, email.to_string()));
        Ok(())
    }

    async fn count(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path(tag: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("email-crawler-{}-{}-{}.db", tag, std::process::id(), nanos))
            .to_string_lossy()
            .into_owned()
    }

    fn seed(path: &str, rows: &[(&str, Option<&str>)]) {
        let conn = Connection::open(path).unwrap();
        init_database(&conn).unwrap();
        for (website, email) in rows {
            conn.execute(
                "INSERT INTO organizations (name, website, email) VALUES (?1, ?2, ?3)",
                params!["org", website, email],
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn loads_only_records_without_email() {
        let path = temp_db_path("pending");
        seed(
            &path,
            &[
                ("https://a.com", None),
                ("https://b.com", Some("done@b.com")),
                ("-", None),
            ],
        );

        let store = SqliteRecordStore::open(&path).await.unwrap();
        assert_eq!(store.count().await, 2);
        let first = store.next().await.unwrap();
        assert_eq!(first.website.as_deref(), Some("https://a.com"));

        // A requeued record is handed out again before the rest.
        let first_id = first.id;
        store.requeue(first).await;
        assert_eq!(store.next().await.unwrap().id, first_id);

        let second = store.next().await.unwrap();
        assert_eq!(second.website_url(), None);
        assert!(store.next().await.is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn update_persists_immediately() {
        let path = temp_db_path("update");
        seed(&path, &[("https://a.com", None)]);

        let store = SqliteRecordStore::open(&path).await.unwrap();
        let record = store.next().await.unwrap();
        store.update(record.id, "info@a.com").await.unwrap();

        // A fresh connection must already see the write.
        let conn = Connection::open(&path).unwrap();
        let email: String = conn
            .query_row(
                "SELECT email FROM organizations WHERE id = ?1",
                params![record.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(email, "info@a.com");

        let _ = std::fs::remove_file(&path);
    }
}
