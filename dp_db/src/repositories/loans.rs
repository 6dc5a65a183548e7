//! ABOUTME: Loan repository tying devices to supervisors with status side effects
//! ABOUTME: Loan mutations, device-status writes, and audit share one transaction

use super::column;
use crate::audit::{self, AuditAction};
use crate::repositories::devices::DeviceStatus;
use dp_core::{time::today_date, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

/// Lifecycle state of a loan; Active -> Returned is the only transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoanStatus {
    Active,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Returned => "Returned",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Active" => Ok(Self::Active),
            "Returned" => Ok(Self::Returned),
            other => Err(Error::Decode(format!("unknown loan status: {}", other))),
        }
    }
}

/// Loan entity
///
/// `device_name` and `supervisor_name` are join-denormalized for display
/// only; they are never written back and are excluded from audit snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    pub id: i64,
    pub device_id: i64,
    pub supervisor_id: i64,
    pub loan_date: String,
    pub return_date: Option<String>,
    pub notes: Option<String>,
    pub status: LoanStatus,
    #[serde(skip)]
    pub device_name: Option<String>,
    #[serde(skip)]
    pub supervisor_name: Option<String>,
}

/// Request to create a new loan; loans always start Active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanRequest {
    pub device_id: i64,
    pub supervisor_id: i64,
    pub loan_date: String,
    pub notes: Option<String>,
}

/// Request to update a loan; replaces all columns, no device side effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLoanRequest {
    pub device_id: i64,
    pub supervisor_id: i64,
    pub loan_date: String,
    pub return_date: Option<String>,
    pub notes: Option<String>,
    pub status: LoanStatus,
}

const BASE_COLUMNS: &str = "id, device_id, supervisor_id, loan_date, return_date, notes, status";

const JOINED_SELECT: &str = r#"
    SELECT l.id, l.device_id, l.supervisor_id, l.loan_date, l.return_date, l.notes, l.status,
           d.name AS device_name, s.name AS supervisor_name
    FROM loans l
    LEFT JOIN devices d ON l.device_id = d.id
    LEFT JOIN supervisors s ON l.supervisor_id = s.id
"#;

fn decode_loan(row: &SqliteRow) -> Result<Loan> {
    let status: String = column(row, "status")?;

    Ok(Loan {
        id: column(row, "id")?,
        device_id: column(row, "device_id")?,
        supervisor_id: column(row, "supervisor_id")?,
        loan_date: column(row, "loan_date")?,
        return_date: column(row, "return_date")?,
        notes: column(row, "notes")?,
        status: status.parse()?,
        // absent on non-joined rows (INSERT/UPDATE ... RETURNING)
        device_name: row.try_get::<Option<String>, _>("device_name").ok().flatten(),
        supervisor_name: row
            .try_get::<Option<String>, _>("supervisor_name")
            .ok()
            .flatten(),
    })
}

/// Fetch a loan without joins on the transaction's connection
async fn fetch_in_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Option<Loan>> {
    let row = sqlx::query(&format!("SELECT {} FROM loans WHERE id = ?1", BASE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to find loan: {}", e)))?;

    row.as_ref().map(decode_loan).transpose()
}

/// Set a device's status on the transaction's connection
async fn set_device_status(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: i64,
    status: DeviceStatus,
) -> Result<()> {
    let result = sqlx::query("UPDATE devices SET status = ?1 WHERE id = ?2")
        .bind(status.as_str())
        .bind(device_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update device status: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("device {} not found", device_id)));
    }

    Ok(())
}

/// Loan repository
pub struct LoanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LoanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a loan and mark the device as in use
    ///
    /// Rejects a device that already has an Active loan. The loan insert,
    /// the device-status write, and the audit record commit atomically.
    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateLoanRequest) -> Result<Loan> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM loans WHERE device_id = ?1 AND status = 'Active' LIMIT 1",
        )
        .bind(request.device_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to check active loans: {}", e)))?;

        if let Some(loan_id) = existing {
            return Err(Error::Validation(format!(
                "device {} already has active loan {}",
                request.device_id, loan_id
            )));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO loans (device_id, supervisor_id, loan_date, return_date, notes, status)
            VALUES (?1, ?2, ?3, NULL, ?4, 'Active')
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(request.device_id)
        .bind(request.supervisor_id)
        .bind(&request.loan_date)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create loan: {}", e)))?;

        let loan = decode_loan(&row)?;

        set_device_status(&mut tx, loan.device_id, DeviceStatus::InUse).await?;

        audit::record(
            &mut tx,
            "loans",
            AuditAction::Create,
            None,
            None,
            Some(audit::snapshot(&loan)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit loan create: {}", e)))?;

        debug!("Created loan {} for device {}", loan.id, loan.device_id);
        Ok(loan)
    }

    /// Find a loan by ID, with display names joined in
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!("{} WHERE l.id = ?1", JOINED_SELECT))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to find loan: {}", e)))?;

        row.as_ref().map(decode_loan).transpose()
    }

    /// List all loans with display names joined in
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!("{} ORDER BY l.id", JOINED_SELECT))
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list loans: {}", e)))?;

        rows.iter().map(decode_loan).collect()
    }

    /// Active loans for one device
    #[instrument(skip(self))]
    pub async fn active_for_device(&self, device_id: i64) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.device_id = ?1 AND l.status = 'Active'",
            JOINED_SELECT
        ))
        .bind(device_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list active loans: {}", e)))?;

        rows.iter().map(decode_loan).collect()
    }

    /// Loans held by one supervisor
    #[instrument(skip(self))]
    pub async fn list_by_supervisor(&self, supervisor_id: i64) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.supervisor_id = ?1 ORDER BY l.id",
            JOINED_SELECT
        ))
        .bind(supervisor_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list loans for supervisor: {}", e)))?;

        rows.iter().map(decode_loan).collect()
    }

    /// Update a loan, replacing all columns
    ///
    /// Plain column replace with audit; device status is not touched here.
    /// Returns `Ok(None)` when the id does not exist; nothing is written.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: i64, request: UpdateLoanRequest) -> Result<Option<Loan>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let before = match fetch_in_tx(&mut tx, id).await? {
            Some(l) => l,
            None => return Ok(None),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE loans
            SET device_id = ?1, supervisor_id = ?2, loan_date = ?3, return_date = ?4,
                notes = ?5, status = ?6
            WHERE id = ?7
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(request.device_id)
        .bind(request.supervisor_id)
        .bind(&request.loan_date)
        .bind(&request.return_date)
        .bind(&request.notes)
        .bind(request.status.as_str())
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update loan: {}", e)))?;

        let loan = decode_loan(&row)?;

        audit::record(
            &mut tx,
            "loans",
            AuditAction::Update,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&loan)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit loan update: {}", e)))?;

        Ok(Some(loan))
    }

    /// Return a device, completing an Active loan
    ///
    /// Stamps today's date on the loan, resets the device to Available, and
    /// audits the return, all in one transaction. Returns `Ok(false)` when
    /// the loan is absent or not Active.
    #[instrument(skip(self))]
    pub async fn return_device(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let before = match fetch_in_tx(&mut tx, id).await? {
            Some(l) => l,
            None => return Ok(false),
        };
        if before.status != LoanStatus::Active {
            return Ok(false);
        }

        let return_date = today_date();

        let row = sqlx::query(&format!(
            r#"
            UPDATE loans SET status = 'Returned', return_date = ?1 WHERE id = ?2
            RETURNING {}
            "#,
            BASE_COLUMNS
        ))
        .bind(&return_date)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to return loan: {}", e)))?;

        let after = decode_loan(&row)?;

        set_device_status(&mut tx, before.device_id, DeviceStatus::Available).await?;

        audit::record(
            &mut tx,
            "loans",
            AuditAction::Return,
            None,
            Some(audit::snapshot(&before)?),
            Some(audit::snapshot(&after)?),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit loan return: {}", e)))?;

        debug!("Returned loan {} for device {}", id, before.device_id);
        Ok(true)
    }

    /// Delete a loan
    ///
    /// Deleting an Active loan releases the device back to Available.
    /// Returns `Ok(false)` when the id does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let before = match fetch_in_tx(&mut tx, id).await? {
            Some(l) => l,
            None => return Ok(false),
        };

        sqlx::query("DELETE FROM loans WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete loan: {}", e)))?;

        if before.status == LoanStatus::Active {
            set_device_status(&mut tx, before.device_id, DeviceStatus::Available).await?;
        }

        audit::record(
            &mut tx,
            "loans",
            AuditAction::Delete,
            None,
            Some(audit::snapshot(&before)?),
            None,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit loan delete: {}", e)))?;

        Ok(true)
    }

    /// Search loans by device or supervisor display name
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Loan>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(&format!(
            "{} WHERE d.name LIKE ?1 OR s.name LIKE ?1 ORDER BY l.id",
            JOINED_SELECT
        ))
        .bind(&pattern)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to search loans: {}", e)))?;

        rows.iter().map(decode_loan).collect()
    }

    /// List loans with a given status
    #[instrument(skip(self))]
    pub async fn filter_by_status(&self, status: LoanStatus) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.status = ?1 ORDER BY l.id",
            JOINED_SELECT
        ))
        .bind(status.as_str())
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to filter loans: {}", e)))?;

        rows.iter().map(decode_loan).collect()
    }
}
