use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ragcrust_common::{Error, Result, SessionKey};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::knowledge_base::{IndexMapStore, KnowledgeBaseHandle};
use crate::records::{FileRecordStore, UploadedFileRecord};

/// SQLite-backed store so session → index mappings and file records survive
/// restarts. Reused handles are still liveness-probed by the cache.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening knowledge base store at {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS knowledge_bases (
                    session_key TEXT PRIMARY KEY,
                    index_id TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS uploaded_files (
                    file_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    size INTEGER NOT NULL,
                    content_type TEXT,
                    knowledge_base_id TEXT,
                    session_key TEXT NOT NULL,
                    uploaded_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_uploaded_files_session
                    ON uploaded_files(session_key);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("connection mutex poisoned".to_string()))
    }
}

impl IndexMapStore for SqliteStore {
    fn get(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>> {
        self.conn()?
            .query_row(
                "SELECT index_id, session_key, created_at FROM knowledge_bases
                 WHERE session_key = ?1",
                params![session_key.as_str()],
                handle_from_row,
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to load knowledge base: {e}")))
    }

    fn put(&self, handle: KnowledgeBaseHandle) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO knowledge_bases (session_key, index_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_key) DO UPDATE SET
                   index_id = excluded.index_id,
                   created_at = excluded.created_at",
                params![
                    handle.session_key.as_str(),
                    handle.id,
                    handle.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to store knowledge base: {e}")))?;
        Ok(())
    }

    fn remove(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>> {
        let existing = IndexMapStore::get(self, session_key)?;
        if existing.is_some() {
            self.conn()?
                .execute(
                    "DELETE FROM knowledge_bases WHERE session_key = ?1",
                    params![session_key.as_str()],
                )
                .map_err(|e| Error::Database(format!("failed to delete knowledge base: {e}")))?;
        }
        Ok(existing)
    }

    fn list(&self) -> Result<Vec<KnowledgeBaseHandle>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT index_id, session_key, created_at FROM knowledge_bases
                 ORDER BY session_key",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], handle_from_row)
            .map_err(|e| Error::Database(format!("failed to list knowledge bases: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("failed to read knowledge base row: {e}")))
    }
}

impl FileRecordStore for SqliteStore {
    fn insert(&self, record: UploadedFileRecord) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO uploaded_files
                   (file_id, name, size, content_type, knowledge_base_id, session_key, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.file_id,
                    record.name,
                    record.size as i64,
                    record.content_type,
                    record.knowledge_base_id,
                    record.session_key.as_str(),
                    record.uploaded_at.to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to store file record: {e}")))?;
        Ok(())
    }

    fn get(&self, file_id: &str) -> Result<Option<UploadedFileRecord>> {
        self.conn()?
            .query_row(
                "SELECT file_id, name, size, content_type, knowledge_base_id, session_key, uploaded_at
                 FROM uploaded_files WHERE file_id = ?1",
                params![file_id],
                record_from_row,
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to load file record: {e}")))
    }

    fn remove(&self, file_id: &str) -> Result<Option<UploadedFileRecord>> {
        let existing = FileRecordStore::get(self, file_id)?;
        if existing.is_some() {
            self.conn()?
                .execute(
                    "DELETE FROM uploaded_files WHERE file_id = ?1",
                    params![file_id],
                )
                .map_err(|e| Error::Database(format!("failed to delete file record: {e}")))?;
        }
        Ok(existing)
    }

    fn list(&self) -> Result<Vec<UploadedFileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT file_id, name, size, content_type, knowledge_base_id, session_key, uploaded_at
                 FROM uploaded_files ORDER BY uploaded_at, file_id",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], record_from_row)
            .map_err(|e| Error::Database(format!("failed to list file records: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("failed to read file record row: {e}")))
    }

    fn remove_for_session(&self, session_key: &SessionKey) -> Result<usize> {
        self.conn()?
            .execute(
                "DELETE FROM uploaded_files WHERE session_key = ?1",
                params![session_key.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to clear session files: {e}")))
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM uploaded_files", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count file records: {e}")))?;
        Ok(count.max(0) as usize)
    }
}

fn handle_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeBaseHandle> {
    let created_at: String = row.get(2)?;
    Ok(KnowledgeBaseHandle {
        id: row.get(0)?,
        session_key: SessionKey::new(row.get::<_, String>(1)?),
        created_at: parse_timestamp(&created_at),
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<UploadedFileRecord> {
    let size: i64 = row.get(2)?;
    let uploaded_at: String = row.get(6)?;
    Ok(UploadedFileRecord {
        file_id: row.get(0)?,
        name: row.get(1)?,
        size: size.max(0) as u64,
        content_type: row.get(3)?,
        knowledge_base_id: row.get(4)?,
        session_key: SessionKey::new(row.get::<_, String>(5)?),
        uploaded_at: parse_timestamp(&uploaded_at),
    })
}

fn parse_timestamp(value: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(file_id: &str, session: &str, kb: Option<&str>) -> UploadedFileRecord {
        UploadedFileRecord {
            file_id: file_id.to_string(),
            name: "readme.txt".to_string(),
            size: 500,
            content_type: Some("text/plain".to_string()),
            knowledge_base_id: kb.map(String::from),
            session_key: SessionKey::new(session),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn file_record_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(record("file-1", "ABCDEFGH", Some("vs_1"))).unwrap();
        store.insert(record("file-2", "ABCDEFGH", None)).unwrap();

        let loaded = FileRecordStore::get(&store, "file-1").unwrap().unwrap();
        assert_eq!(loaded.size, 500);
        assert_eq!(loaded.knowledge_base_id.as_deref(), Some("vs_1"));
        assert_eq!(loaded.session_key.as_str(), "ABCDEFGH");

        let unattached = FileRecordStore::get(&store, "file-2").unwrap().unwrap();
        assert!(unattached.knowledge_base_id.is_none());
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn remove_for_session_returns_removed_count() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(record("file-1", "S1", Some("vs_1"))).unwrap();
        store.insert(record("file-2", "S2", Some("vs_2"))).unwrap();

        assert_eq!(store.remove_for_session(&SessionKey::new("S1")).unwrap(), 1);
        assert_eq!(store.remove_for_session(&SessionKey::new("S1")).unwrap(), 0);
        assert_eq!(FileRecordStore::list(&store).unwrap().len(), 1);
    }

    #[test]
    fn knowledge_base_upsert_replaces_previous_handle() {
        let store = SqliteStore::in_memory().unwrap();
        let key = SessionKey::new("S1");
        store.put(KnowledgeBaseHandle::new("vs_a", key.clone())).unwrap();
        store.put(KnowledgeBaseHandle::new("vs_b", key.clone())).unwrap();

        let handles = IndexMapStore::list(&store).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].id, "vs_b");

        let removed = IndexMapStore::remove(&store, &key).unwrap();
        assert_eq!(removed.map(|h| h.id).as_deref(), Some("vs_b"));
        assert!(IndexMapStore::get(&store, &key).unwrap().is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put(KnowledgeBaseHandle::new("vs_keep", SessionKey::new("S1")))
                .unwrap();
            store.insert(record("file-1", "S1", Some("vs_keep"))).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let handle = IndexMapStore::get(&reopened, &SessionKey::new("S1"))
            .unwrap()
            .unwrap();
        assert_eq!(handle.id, "vs_keep");
        assert!(FileRecordStore::get(&reopened, "file-1").unwrap().is_some());
    }
}
