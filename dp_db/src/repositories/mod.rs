//! ABOUTME: Entity repositories with CRUD, search, and domain filters
//! ABOUTME: Each repository owns the row decoding for its table

pub mod alerts;
pub mod devices;
pub mod loans;
pub mod supervisors;

use dp_core::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Read one column, wrapping failures as decode errors with the column name
pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| Error::Decode(format!("column {}: {}", name, e)))
}
