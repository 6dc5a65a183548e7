//! ABOUTME: Supervisor repository for the people devices and loans reference
//! ABOUTME: Provides CRUD, search, and permission/status filters

use super::column;
use crate::audit::{self, AuditAction};
use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

/// Permission level of a supervisor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Permission {
    Admin,
    Basic,
    Auditor,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Basic => "Basic",
            Self::Auditor => "Auditor",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Basic" => Ok(Self::Basic),
            "Auditor" => Ok(Self::Auditor),
            other => Err(Error::Decode(format!("unknown permission: {}", other))),
        }
    }
}

/// Active/inactive state of a supervisor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SupervisorStatus {
    Active,
    Inactive,
}

impl SupervisorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl std::str::FromStr for SupervisorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Active" => Ok(Self::Active),
            "Inactive" => Ok(Self::Inactive),
            other => Err(Error::Decode(format!("unknown supervisor status: {}", other))),
        }
    }
}

/// Supervisor entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supervisor {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub permission: Permission,
    pub status: SupervisorStatus,
    pub registration_date: String,
}

/// Request to create a new supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupervisorRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub permission: Permission,
    pub status: SupervisorStatus,
    pub registration_date: String,
}

/// Request to update a supervisor; replaces all columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSupervisorRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub permission: Permission,
    pub status: SupervisorStatus,
    pub registration_date: String,
}

const COLUMNS: &str = "id, name, email, phone, permission, status, registration_date";

fn decode_supervisor(row: &SqliteRow) -> Result<Supervisor> {
    let permission: String = column(row, "permission")?;
    let status: String = column(row, "status")?;

    Ok(Supervisor {
        id: column(row, "id")?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        permission: permission.parse()?,
        status: status.parse()?,
        registration_date: column(row, "registration_date")?,
    })
}

/// Supervisor repository
pub struct SupervisorRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SupervisorRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new supervisor
    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateSupervisorRequest) -> Result<Supervisor> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO supervisors (name, email, phone, permission, status, registration_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.permission.as_str())
        .bind(request.status.as_str())
        .bind(&request.registration_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create supervisor: {}", e)))?;

        let supervisor = decode_supervisor(&row)?;

        audit::record(
            &mut tx,
            "supervisors",
            AuditAction::Create,
            None,
            None,
            Some(audit::snapshot(&supervisor)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit supervisor create: {}", e)))?;

        debug!("Created supervisor {}", supervisor.id);
        Ok(supervisor)
    }

    /// Find a supervisor by ID
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Supervisor>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE id = ?1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to find supervisor: {}", e)))?;

        row.as_ref().map(decode_supervisor).transpose()
    }

    /// List all supervisors
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Supervisor>> {
        let rows = sqlx::query(&format!("SELECT {} FROM supervisors ORDER BY id", COLUMNS))
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list supervisors: {}", e)))?;

        rows.iter().map(decode_supervisor).collect()
    }

    /// Update a supervisor, replacing all columns
    ///
    /// Returns `Ok(None)` when the id does not exist; nothing is written.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: i64,
        request: UpdateSupervisorRequest,
    ) -> Result<Option<Supervisor>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE id = ?1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to find supervisor: {}", e)))?;

        let before = match existing.as_ref().map(decode_supervisor).transpose()? {
            Some(s) => s,
            None => return Ok(None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE supervisors
            SET name = ?1, email = ?2, phone = ?3, permission = ?4, status = ?5,
                registration_date = ?6
            WHERE id = ?7
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.permission.as_str())
        .bind(request.status.as_str())
        .bind(&request.registration_date)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update supervisor: {}", e)))?;

        let supervisor = decode_supervisor(&row)?;

        audit::record(
            &mut tx,
            "supervisors",
            AuditAction::Update,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&supervisor)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit supervisor update: {}", e)))?;

        Ok(Some(supervisor))
    }

    /// Delete a supervisor
    ///
    /// Returns `Ok(false)` when the id does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE id = ?1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to find supervisor: {}", e)))?;

        let before = match existing.as_ref().map(decode_supervisor).transpose()? {
            Some(s) => s,
            None => return Ok(false),
        };

        sqlx::query("DELETE FROM supervisors WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete supervisor: {}", e)))?;

        audit::record(
            &mut tx,
            "supervisors",
            AuditAction::Delete,
            None,
            Some(audit::snapshot(&before)?),
            None,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit supervisor delete: {}", e)))?;

        Ok(true)
    }

    /// Search supervisors by name or email, case-insensitive substring match
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Supervisor>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE name LIKE ?1 OR email LIKE ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to search supervisors: {}", e)))?;

        rows.iter().map(decode_supervisor).collect()
    }

    /// List supervisors with a given permission level
    #[instrument(skip(self))]
    pub async fn filter_by_permission(&self, permission: Permission) -> Result<Vec<Supervisor>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE permission = ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(permission.as_str())
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to filter supervisors: {}", e)))?;

        rows.iter().map(decode_supervisor).collect()
    }

    /// List supervisors with a given status
    #[instrument(skip(self))]
    pub async fn filter_by_status(&self, status: SupervisorStatus) -> Result<Vec<Supervisor>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM supervisors WHERE status = ?1 ORDER BY id",
            COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to filter supervisors: {}", e)))?;

        rows.iter().map(decode_supervisor).collect()
    }
}
