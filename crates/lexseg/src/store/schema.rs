use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

use crate::prelude::*;

pub const SCHEMA_VERSION: i32 = 1;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(eyre!(
            "Database schema v{} is newer than this build (v{})",
            current_version,
            SCHEMA_VERSION
        ));
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()
        .context("Failed to read schema version")?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
        [version],
    )?;
    Ok(())
}

fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS page_ranges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document TEXT NOT NULL,
            unit_no TEXT NOT NULL,
            start_page INTEGER NOT NULL,
            end_page INTEGER,
            UNIQUE(document, unit_no, start_page)
        );

        CREATE INDEX IF NOT EXISTS idx_page_ranges_document ON page_ranges(document, start_page);

        CREATE TABLE IF NOT EXISTS footnotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document TEXT NOT NULL,
            page INTEGER NOT NULL,
            text TEXT NOT NULL,
            unit_no TEXT,
            UNIQUE(document, page, text)
        );

        CREATE TABLE IF NOT EXISTS opinions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document TEXT NOT NULL,
            unit_id INTEGER NOT NULL,
            start_page INTEGER NOT NULL,
            end_page INTEGER NOT NULL,
            content TEXT NOT NULL,
            links TEXT NOT NULL DEFAULT '[]',
            UNIQUE(document, unit_id)
        );

        CREATE TABLE IF NOT EXISTS metadata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document TEXT NOT NULL,
            page INTEGER NOT NULL,
            core_terms TEXT NOT NULL DEFAULT '[]',
            judges TEXT NOT NULL DEFAULT '',
            counsel TEXT NOT NULL DEFAULT '',
            plaintiff_defendant TEXT NOT NULL DEFAULT '',
            opinion_by TEXT NOT NULL DEFAULT '',
            prior_history TEXT NOT NULL DEFAULT '',
            subsequent_history TEXT NOT NULL DEFAULT '',
            UNIQUE(document, page)
        );
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = table_names(&conn);
        for table in ["footnotes", "metadata", "opinions", "page_ranges", "schema_version"] {
            assert!(tables.iter().any(|t| t == table), "missing {}", table);
        }
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();
        assert!(initialize_schema(&conn).is_err());
    }

    #[test]
    fn test_empty_version_table_reads_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (id INTEGER PRIMARY KEY, version INTEGER);")
            .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_broken_version_table_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (id INTEGER PRIMARY KEY, label TEXT);")
            .unwrap();
        assert!(get_schema_version(&conn).is_err());
        assert!(initialize_schema(&conn).is_err());

        let text = Connection::open_in_memory().unwrap();
        text.execute_batch(
            "CREATE TABLE schema_version (id INTEGER PRIMARY KEY, version TEXT);
             INSERT INTO schema_version VALUES (1, 'one');",
        )
        .unwrap();
        assert!(get_schema_version(&text).is_err());
    }
}
