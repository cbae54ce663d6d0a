use crate::KeyValueStore;
use chrono::Utc;
use keep_core::{KeepError, KeepResult};
use keep_fs::WorkspacePaths;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value store backed by the workspace's `state.db`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn from_workspace(paths: &WorkspacePaths) -> KeepResult<Self> {
        Self::open(&paths.state_db_path)
    }

    pub fn open(db_path: &Path) -> KeepResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Keys currently stored, in lexical order.
    pub fn keys(&self) -> KeepResult<Vec<String>> {
        let conn = self.connection()?;
        let mut statement = conn
            .prepare("SELECT key FROM kv_entries ORDER BY key ASC")
            .map_err(|err| sqlite_error("prepare keys query", &self.db_path, err))?;

        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| sqlite_error("query keys", &self.db_path, err))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|err| sqlite_error("read key row", &self.db_path, err))?);
        }

        Ok(keys)
    }

    fn connection(&self) -> KeepResult<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open state database", &self.db_path, err))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|err| sqlite_error("configure busy timeout", &self.db_path, err))?;
        Ok(conn)
    }

    fn initialize_schema(&self, conn: &Connection) -> KeepResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS kv_entries (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> KeepResult<Option<String>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| sqlite_error("load entry", &self.db_path, err))
    }

    fn set(&self, key: &str, value: &str) -> KeepResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save entry", &self.db_path, err))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> KeepResult<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .map_err(|err| sqlite_error("remove entry", &self.db_path, err))?;
        Ok(())
    }
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> KeepError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return KeepError::io(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.keep/state.db' and run `keep sync now` to rebuild the local cache",
            db_path.display()
        ));
    }

    KeepError::io(format!(
        "failed to {action} using state database '{}': {}",
        db_path.display(),
        err
    ))
}
