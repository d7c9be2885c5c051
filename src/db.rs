//! Local SQLite storage layer for Brew POS.
//!
//! Uses rusqlite with WAL mode. Aggregates are persisted as whole JSON
//! documents (one row per aggregate, `doc` column) plus a few indexed columns
//! used by precondition queries. `INSERT OR REPLACE` of the row is the atomic
//! whole-document replace the domain layer relies on: two concurrent closures
//! of the same shift can never interleave partial writes.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::DomainError;

/// Managed state holding the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

impl DbState {
    /// Acquire the connection, surfacing a poisoned lock as a storage error.
    pub fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Storage(format!("connection lock poisoned: {e}")))
    }
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initialize the database at `{data_dir}/brew-pos.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, DomainError> {
    fs::create_dir_all(data_dir)
        .map_err(|e| DomainError::Storage(format!("create data dir: {e}")))?;

    let db_path = data_dir.join("brew-pos.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                // Also remove WAL/SHM files if present
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| DomainError::Storage(format!("open after retry: {e}")))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, DomainError> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
        apply_migration(conn, version)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        info!("Applied migration v{version}");
    }

    Ok(())
}

/// Apply a single schema migration.
fn apply_migration(conn: &Connection, version: i32) -> Result<(), DomainError> {
    match version {
        1 => conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                waiter_id TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_waiter ON orders (waiter_id, status);

            CREATE TABLE IF NOT EXISTS shifts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_shifts_user_role ON shifts (user_id, role, status);

            CREATE TABLE IF NOT EXISTS cashier_shifts (
                id TEXT PRIMARY KEY,
                cashier_id TEXT NOT NULL,
                status TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cashier_shifts_cashier
                ON cashier_shifts (cashier_id, status);",
        )?,
        2 => conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cash_handovers (
                id TEXT PRIMARY KEY,
                waiter_shift_id TEXT NOT NULL,
                status TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_handovers_shift
                ON cash_handovers (waiter_shift_id, status);

            CREATE TABLE IF NOT EXISTS cash_discrepancies (
                id TEXT PRIMARY KEY,
                handover_id TEXT NOT NULL,
                status TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_discrepancies_status
                ON cash_discrepancies (status);",
        )?,
        other => {
            return Err(DomainError::Storage(format!(
                "unknown migration version {other}"
            )))
        }
    }
    Ok(())
}

/// Run the full migration set against a test connection.
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("test migrations");
}

#[cfg(test)]
pub(crate) fn test_db() -> DbState {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .expect("pragma setup");
    run_migrations_for_test(&conn);
    DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_all_tables() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();
        for table in [
            "orders",
            "shifts",
            "cashier_shifts",
            "cash_handovers",
            "cash_discrepancies",
        ] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {table} should exist");
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();
        run_migrations(&conn).expect("second run");
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }
}
