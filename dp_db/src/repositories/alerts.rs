//! ABOUTME: Alert repository for maintenance and incident notifications
//! ABOUTME: Provides CRUD, resolve, unresolved listing, and search

use super::column;
use crate::audit::{self, AuditAction};
use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Alert entity
///
/// `resolved` is stored as a 0/1 integer; `device_name` is join-denormalized
/// for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub device_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub date: String,
    pub resolved: bool,
    #[serde(skip)]
    pub device_name: Option<String>,
}

/// Request to create a new alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    pub device_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub date: String,
}

/// Request to update an alert; replaces all columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAlertRequest {
    pub device_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub date: String,
    pub resolved: bool,
}

const BASE_COLUMNS: &str = "id, device_id, type, description, date, resolved";

const JOINED_SELECT: &str = r#"
    SELECT a.id, a.device_id, a.type, a.description, a.date, a.resolved,
           d.name AS device_name
    FROM alerts a
    LEFT JOIN devices d ON a.device_id = d.id
"#;

fn decode_alert(row: &SqliteRow) -> Result<Alert> {
    let resolved: i64 = column(row, "resolved")?;

    Ok(Alert {
        id: column(row, "id")?,
        device_id: column(row, "device_id")?,
        kind: column(row, "type")?,
        description: column(row, "description")?,
        date: column(row, "date")?,
        resolved: resolved != 0,
        // absent on non-joined rows (INSERT/UPDATE ... RETURNING)
        device_name: row.try_get::<Option<String>, _>("device_name").ok().flatten(),
    })
}

/// Alert repository
pub struct AlertRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new alert, initially unresolved
    pub async fn create(&self, request: CreateAlertRequest) -> Result<Alert> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO alerts (device_id, type, description, date, resolved)
            VALUES (?1, ?2, ?3, ?4, 0)
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(request.device_id)
        .bind(&request.kind)
        .bind(&request.description)
        .bind(&request.date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        let alert = decode_alert(&row)?;

        audit::record(
            &mut tx,
            "alerts",
            AuditAction::Create,
            None,
            None,
            Some(audit::snapshot(&alert)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert create: {}", e)))?;

        Ok(alert)
    }

    /// Find an alert by ID, with the device name joined in
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Alert>> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?1", JOINED_SELECT))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to find alert: {}", e)))?;

        row.as_ref().map(decode_alert).transpose()
    }

    /// List all alerts with device names joined in
    pub async fn list(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query(&format!("{} ORDER BY a.id", JOINED_SELECT))
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        rows.iter().map(decode_alert).collect()
    }

    /// Alerts attached to one device
    pub async fn list_for_device(&self, device_id: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query(&format!(
            "{} WHERE a.device_id = ?1 ORDER BY a.id",
            JOINED_SELECT
        ))
        .bind(device_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts for device: {}", e)))?;

        rows.iter().map(decode_alert).collect()
    }

    /// Alerts not yet resolved
    pub async fn list_unresolved(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query(&format!(
            "{} WHERE a.resolved = 0 ORDER BY a.id",
            JOINED_SELECT
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list unresolved alerts: {}", e)))?;

        rows.iter().map(decode_alert).collect()
    }

    /// Update an alert, replacing all columns
    ///
    /// Returns `Ok(None)` when the id does not exist; nothing is written.
    pub async fn update(&self, id: i64, request: UpdateAlertRequest) -> Result<Option<Alert>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!("SELECT {} FROM alerts WHERE id = ?1", BASE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to find alert: {}", e)))?;

        let before = match existing.as_ref().map(decode_alert).transpose()? {
            Some(a) => a,
            None => return Ok(None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE alerts
            SET device_id = ?1, type = ?2, description = ?3, date = ?4, resolved = ?5
            WHERE id = ?6
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(request.device_id)
        .bind(&request.kind)
        .bind(&request.description)
        .bind(&request.date)
        .bind(if request.resolved { 1i64 } else { 0i64 })
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update alert: {}", e)))?;

        let alert = decode_alert(&row)?;

        audit::record(
            &mut tx,
            "alerts",
            AuditAction::Update,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&alert)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert update: {}", e)))?;

        Ok(Some(alert))
    }

    /// Mark an alert as resolved
    ///
    /// Idempotent: resolving an already-resolved alert still returns true.
    /// Returns `Ok(false)` only when the id does not exist.
    pub async fn resolve(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!("SELECT {} FROM alerts WHERE id = ?1", BASE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to find alert: {}", e)))?;

        let before = match existing.as_ref().map(decode_alert).transpose()? {
            Some(a) => a,
            None => return Ok(false),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE alerts SET resolved = 1 WHERE id = ?1
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to resolve alert: {}", e)))?;

        let after = decode_alert(&row)?;

        audit::record(
            &mut tx,
            "alerts",
            AuditAction::Resolve,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&after)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert resolve: {}", e)))?;

        Ok(true)
    }

    /// Delete an alert
    ///
    /// Returns `Ok(false)` when the id does not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!("SELECT {} FROM alerts WHERE id = ?1", BASE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to find alert: {}", e)))?;

        let before = match existing.as_ref().map(decode_alert).transpose()? {
            Some(a) => a,
            None => return Ok(false),
        };

        sqlx::query("DELETE FROM alerts WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete alert: {}", e)))?;

        audit::record(
            &mut tx,
            "alerts",
            AuditAction::Delete,
            None,
            Some(audit::snapshot(&before)?),
            None,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert delete: {}", e)))?;

        Ok(true)
    }

    /// Search alerts by description or type
    pub async fn search(&self, query: &str) -> Result<Vec<Alert>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(&format!(
            "{} WHERE a.description LIKE ?1 OR a.type LIKE ?1 ORDER BY a.id",
            JOINED_SELECT
        ))
        .bind(&pattern)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to search alerts: {}", e)))?;

        rows.iter().map(decode_alert).collect()
    }
}
