//! ABOUTME: Database layer with SQLite, schema bootstrap, and repositories
//! ABOUTME: Handles all data persistence and database operations

use dp_core::{Error, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Row, SqlitePool,
};
use tracing::{debug, info, instrument};

/// Allowed table names for statistics queries
/// This is a security measure to prevent SQL injection via dynamic table names
const ALLOWED_TABLES: &[&str] = &["supervisors", "devices", "loans", "alerts", "audit"];

/// Validates that a table name contains only safe SQL identifier characters
///
/// Identifiers must be non-empty, start with a letter or underscore, and
/// contain only alphanumerics and underscores.
fn is_safe_sql_identifier(table: &str) -> bool {
    let mut chars = table.chars();

    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Idempotent schema bootstrap statements, executed in order on open.
///
/// There is no migration system; the schema is create-if-absent only.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS supervisors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT,
        permission TEXT NOT NULL,
        status TEXT NOT NULL,
        registration_date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        status TEXT NOT NULL,
        location TEXT,
        last_maintenance TEXT,
        scan_code TEXT UNIQUE,
        supervisor_id INTEGER,
        FOREIGN KEY (supervisor_id) REFERENCES supervisors (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS loans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id INTEGER NOT NULL,
        supervisor_id INTEGER NOT NULL,
        loan_date TEXT NOT NULL,
        return_date TEXT,
        notes TEXT,
        status TEXT NOT NULL,
        FOREIGN KEY (device_id) REFERENCES devices (id),
        FOREIGN KEY (supervisor_id) REFERENCES supervisors (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id INTEGER,
        type TEXT NOT NULL,
        description TEXT NOT NULL,
        date TEXT NOT NULL,
        resolved INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (device_id) REFERENCES devices (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name TEXT NOT NULL,
        action TEXT NOT NULL,
        actor_id INTEGER,
        date TEXT NOT NULL,
        before_json TEXT,
        after_json TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_loans_device_status ON loans (device_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_alerts_resolved ON alerts (resolved)",
    "CREATE INDEX IF NOT EXISTS idx_audit_table ON audit (table_name)",
];

/// Database connection pool and operations
///
/// Explicitly constructed and passed to repositories; lifecycle (open once,
/// close on shutdown) is owned by the application entry point.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open the database, creating the file and schema if absent
    #[instrument(skip(path))]
    pub async fn open(path: &str, pool_size: u32, wal: bool) -> Result<Self> {
        info!("Opening database at: {}", path);

        let journal_mode = if wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(journal_mode)
            .create_if_missing(true)
            .pragma("foreign_keys", "ON")
            .pragma("synchronous", "NORMAL")
            .pragma("busy_timeout", "30000"); // 30 second timeout for lock contention

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .min_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::Database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.create_schema().await?;

        info!("Database opened successfully");
        Ok(db)
    }

    /// Create all tables and indexes if they don't exist
    #[instrument(skip(self))]
    async fn create_schema(&self) -> Result<()> {
        debug!("Bootstrapping schema");

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Database(format!("Schema bootstrap failed: {}", e)))?;
        }

        debug!("Schema bootstrap completed");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a Db instance from an existing pool (for testing/reuse)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check database health
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing database health check");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;

        debug!("Database health check passed");
        Ok(())
    }

    /// Get row counts per table
    ///
    /// Table names come exclusively from the ALLOWED_TABLES allow-list and
    /// are re-validated as SQL identifiers before interpolation.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DatabaseStats> {
        debug!("Gathering database statistics");

        let mut table_counts = std::collections::HashMap::new();

        for &table in ALLOWED_TABLES {
            if !is_safe_sql_identifier(table) {
                return Err(Error::Database(format!(
                    "ALLOWED_TABLES contains invalid SQL identifier: '{}'",
                    table
                )));
            }

            // SQLx doesn't support parameterized table names; interpolation is
            // safe only because the name passed allow-list validation above
            let query = format!("SELECT COUNT(*) as count FROM {}", table);
            let row = sqlx::query(&query)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(format!("Failed to get count for {}: {}", table, e))
                })?;

            let count: i64 = row.get("count");
            table_counts.insert(table.to_string(), count);
        }

        Ok(DatabaseStats { table_counts })
    }

    /// Close the connection pool
    ///
    /// Reuse after close requires constructing a new handle.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseStats {
    pub table_counts: std::collections::HashMap<String, i64>,
}

pub mod audit;
pub mod flags;
pub mod repositories;
pub mod seed;

pub use audit::{AuditAction, AuditRecord, AuditRepository};
pub use flags::FlagStore;
pub use repositories::{
    alerts::{Alert, AlertRepository, CreateAlertRequest, UpdateAlertRequest},
    devices::{CreateDeviceRequest, Device, DeviceRepository, DeviceStatus, UpdateDeviceRequest},
    loans::{CreateLoanRequest, Loan, LoanRepository, LoanStatus, UpdateLoanRequest},
    supervisors::{
        CreateSupervisorRequest, Permission, Supervisor, SupervisorRepository, SupervisorStatus,
        UpdateSupervisorRequest,
    },
};

#[cfg(test)]
mod tests;
