use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use rusqlite::Connection;

use super::schema;
use crate::prelude::*;

/// Shared handle on one SQLite connection.
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| eyre!("Failed to acquire database lock: {}", e))?;

        f(&conn)
    }

    /// Run `f` inside a transaction that commits when `f` returns `Ok`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        let mut conn = self
            .connection
            .lock()
            .map_err(|e| eyre!("Failed to acquire database lock: {}", e))?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_connection() {
        let db = DatabaseConnection::new_in_memory().unwrap();
        assert_eq!(db.path().to_string_lossy(), ":memory:");

        let two: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT 1 + 1", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(two, 2);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = DatabaseConnection::new_in_memory().unwrap();

        let result: Result<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO page_ranges (document, unit_no, start_page) VALUES ('cp01.pdf', 'A', 1)",
                [],
            )?;
            Err(eyre!("abort"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM page_ranges", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lexseg.db");

        let db = DatabaseConnection::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
