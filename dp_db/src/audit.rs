//! ABOUTME: Append-only audit log capturing before/after snapshots of mutations
//! ABOUTME: Audit inserts share the transaction of the write they describe

use crate::repositories::column;
use dp_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

/// Kind of mutation recorded in the audit table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Resolve,
    Return,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Resolve => "resolve",
            Self::Return => "return",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "resolve" => Ok(Self::Resolve),
            "return" => Ok(Self::Return),
            other => Err(Error::Decode(format!("unknown audit action: {}", other))),
        }
    }
}

/// One audit table row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub table_name: String,
    pub action: AuditAction,
    pub actor_id: Option<i64>,
    pub date: String,
    pub before_json: Option<String>,
    pub after_json: Option<String>,
}

/// Serialize an entity snapshot for the before/after columns
pub(crate) fn snapshot<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::Database(format!("Failed to serialize audit snapshot: {}", e)))
}

/// Insert an audit record on the given connection
///
/// Callers pass the transaction carrying the primary mutation so the audit
/// row commits or rolls back together with it.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    table: &str,
    action: AuditAction,
    actor_id: Option<i64>,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
) -> Result<()> {
    let date = now_iso8601();
    let before_json = before.map(|v| v.to_string());
    let after_json = after.map(|v| v.to_string());

    debug!(table = %table, action = %action.as_str(), "Recording audit entry");

    sqlx::query(
        r#"
        INSERT INTO audit (table_name, action, actor_id, date, before_json, after_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(table)
    .bind(action.as_str())
    .bind(actor_id)
    .bind(&date)
    .bind(&before_json)
    .bind(&after_json)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::Database(format!("Failed to write audit record: {}", e)))?;

    Ok(())
}

fn decode_audit(row: &SqliteRow) -> Result<AuditRecord> {
    let action: String = column(row, "action")?;

    Ok(AuditRecord {
        id: column(row, "id")?,
        table_name: column(row, "table_name")?,
        action: action.parse()?,
        actor_id: column(row, "actor_id")?,
        date: column(row, "date")?,
        before_json: column(row, "before_json")?,
        after_json: column(row, "after_json")?,
    })
}

/// Read-only access to the audit trail
pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent audit records, newest first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_name, action, actor_id, date, before_json, after_json
            FROM audit ORDER BY id DESC LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list audit records: {}", e)))?;

        rows.iter().map(decode_audit).collect()
    }

    /// Audit records for one table, newest first
    pub async fn list_for_table(&self, table: &str) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_name, action, actor_id, date, before_json, after_json
            FROM audit WHERE table_name = ?1 ORDER BY id DESC
            "#,
        )
        .bind(table)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list audit records for table: {}", e)))?;

        rows.iter().map(decode_audit).collect()
    }
}
