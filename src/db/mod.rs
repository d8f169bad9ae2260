use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{ColdlistError, Result};

pub mod leads;
pub mod lists;
pub mod migrate;

pub use leads::{
    fetch_all_leads, fetch_leads, find_import_by_hash, get_lead, insert_leads, record_call_attempt, record_import,
    update_lead_status, ImportHistoryEntry, ImportReport, StoredLead,
};
pub use lists::{
    create_list, delete_list, get_list, list_lists, update_fields, update_list, LeadCounts, ListRecord,
    ListSettings, ListStatus, ListSummary, ListUpdate,
};

// WAL for concurrent readers, foreign keys so deleting a list cascades to its imports
const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA busy_timeout = 5000;";

/// Database connection wrapper
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        open(&self.path)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ColdlistError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
    }

    /// Apply pending migrations from `migrations_dir`
    pub async fn migrate(&self, migrations_dir: &Path) -> Result<()> {
        let dir = migrations_dir.to_path_buf();
        self.with_connection(move |conn| migrate::run_migrations(conn, &dir))
            .await
    }
}

fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(PRAGMAS)?;
    Ok(conn)
}

/// Fresh migrated database in a temp dir, shared by the store tests
#[cfg(test)]
pub(crate) async fn test_db() -> (tempfile::TempDir, Db) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let db = Db::new(temp_dir.path().join("test.db"));
    db.migrate(&Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await
        .unwrap();
    (temp_dir, db)
}
