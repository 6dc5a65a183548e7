//! ABOUTME: Device repository for the tracked inventory items
//! ABOUTME: Provides CRUD, scan-code lookup, search, and status/category filters

use super::column;
use crate::audit::{self, AuditAction};
use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;

/// Availability state of a device
///
/// Transitions are driven externally: loan create/return/delete and direct
/// edits. There is no device-owned state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceStatus {
    Available,
    #[serde(rename = "In Use")]
    InUse,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::InUse => "In Use",
            Self::Maintenance => "Maintenance",
        }
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Available" => Ok(Self::Available),
            "In Use" => Ok(Self::InUse),
            "Maintenance" => Ok(Self::Maintenance),
            other => Err(Error::Decode(format!("unknown device status: {}", other))),
        }
    }
}

/// Device entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub status: DeviceStatus,
    pub location: Option<String>,
    pub last_maintenance: Option<String>,
    pub scan_code: Option<String>,
    pub supervisor_id: Option<i64>,
}

/// Request to create a new device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub category: String,
    pub status: DeviceStatus,
    pub location: Option<String>,
    pub last_maintenance: Option<String>,
    pub scan_code: Option<String>,
    pub supervisor_id: Option<i64>,
}

/// Request to update a device; replaces all columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: String,
    pub category: String,
    pub status: DeviceStatus,
    pub location: Option<String>,
    pub last_maintenance: Option<String>,
    pub scan_code: Option<String>,
    pub supervisor_id: Option<i64>,
}

const COLUMNS: &str = "id, name, category, status, location, last_maintenance, scan_code, supervisor_id";

fn decode_device(row: &SqliteRow) -> Result<Device> {
    let status: String = column(row, "status")?;

    Ok(Device {
        id: column(row, "id")?,
        name: column(row, "name")?,
        category: column(row, "category")?,
        status: status.parse()?,
        location: column(row, "location")?,
        last_maintenance: column(row, "last_maintenance")?,
        scan_code: column(row, "scan_code")?,
        supervisor_id: column(row, "supervisor_id")?,
    })
}

pub struct DeviceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DeviceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateDeviceRequest) -> Result<Device> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO devices (name, category, status, location, last_maintenance, scan_code, supervisor_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&request.name)
        .bind(&request.category)
        .bind(request.status.as_str())
        .bind(&request.location)
        .bind(&request.last_maintenance)
        .bind(&request.scan_code)
        .bind(request.supervisor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create device: {}", e)))?;

        let device = decode_device(&row)?;

        audit::record(
            &mut tx,
            "devices",
            AuditAction::Create,
            None,
            None,
            Some(audit::snapshot(&device)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit device create: {}", e)))?;

        Ok(device)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("SELECT {} FROM devices WHERE id = ?1", COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to find device: {}", e)))?;

        row.as_ref().map(decode_device).transpose()
    }

    /// Look up a device by its unique scan code
    pub async fn find_by_scan_code(&self, scan_code: &str) -> Result<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE scan_code = ?1",
            COLUMNS
        ))
        .bind(scan_code)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to find device by scan code: {}", e)))?;

        row.as_ref().map(decode_device).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("SELECT {} FROM devices ORDER BY id", COLUMNS))
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list devices: {}", e)))?;

        rows.iter().map(decode_device).collect()
    }

    /// Update a device, replacing all columns
    ///
    /// Returns `Ok(None)` when the id does not exist; nothing is written.
    pub async fn update(&self, id: i64, request: UpdateDeviceRequest) -> Result<Option<Device>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!("SELECT {} FROM devices WHERE id = ?1", COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to find device: {}", e)))?;

        let before = match existing.as_ref().map(decode_device).transpose()? {
            Some(d) => d,
            None => return Ok(None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE devices
            SET name = ?1, category = ?2, status = ?3, location = ?4,
                last_maintenance = ?5, scan_code = ?6, supervisor_id = ?7
            WHERE id = ?8
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&request.name)
        .bind(&request.category)
        .bind(request.status.as_str())
        .bind(&request.location)
        .bind(&request.last_maintenance)
        .bind(&request.scan_code)
        .bind(request.supervisor_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update device: {}", e)))?;

        let device = decode_device(&row)?;

        audit::record(
            &mut tx,
            "devices",
            AuditAction::Update,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&device)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit device update: {}", e)))?;

        Ok(Some(device))
    }

    /// Delete a device
    ///
    /// Returns `Ok(false)` when the id does not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!("SELECT {} FROM devices WHERE id = ?1", COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to find device: {}", e)))?;

        let before = match existing.as_ref().map(decode_device).transpose()? {
            Some(d) => d,
            None => return Ok(false),
        };

        sqlx::query("DELETE FROM devices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete device: {}", e)))?;

        audit::record(
            &mut tx,
            "devices",
            AuditAction::Delete,
            None,
            Some(audit::snapshot(&before)?),
            None,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit device delete: {}", e)))?;

        Ok(true)
    }

    /// Search devices by name, category, or location
    pub async fn search(&self, query: &str) -> Result<Vec<Device>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM devices
            WHERE name LIKE ?1 OR category LIKE ?1 OR location LIKE ?1
            ORDER BY id
            "#,
            COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to search devices: {}", e)))?;

        rows.iter().map(decode_device).collect()
    }

    pub async fn filter_by_status(&self, status: DeviceStatus) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE status = ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to filter devices by status: {}", e)))?;

        rows.iter().map(decode_device).collect()
    }

    pub async fn filter_by_category(&self, category: &str) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE category = ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(category)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to filter devices by category: {}", e)))?;

        rows.iter().map(decode_device).collect()
    }

    /// List devices owned by a supervisor
    pub async fn list_by_supervisor(&self, supervisor_id: i64) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE supervisor_id = ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(supervisor_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list devices for supervisor: {}", e)))?;

        rows.iter().map(decode_device).collect()
    }
}
