//! ABOUTME: One-time sample data for first-run installs
//! ABOUTME: Inserts through the repositories so side effects and audit apply

use crate::repositories::alerts::{AlertRepository, CreateAlertRequest};
use crate::repositories::devices::{CreateDeviceRequest, DeviceRepository, DeviceStatus};
use crate::repositories::loans::{CreateLoanRequest, LoanRepository};
use crate::repositories::supervisors::{
    CreateSupervisorRequest, Permission, SupervisorRepository, SupervisorStatus,
};
use crate::Db;
use dp_core::time::{now_iso8601, today_date};
use dp_core::Result;
use tracing::{info, instrument};

/// Insert sample supervisors, devices, a loan, and alerts
///
/// Goes through the repositories so the loan marks its device as in use and
/// every insert lands in the audit trail like a real mutation.
#[instrument(skip(db))]
pub async fn seed_sample_data(db: &Db) -> Result<()> {
    info!("Seeding sample data");

    let supervisors = SupervisorRepository::new(db.pool());
    let devices = DeviceRepository::new(db.pool());
    let loans = LoanRepository::new(db.pool());
    let alerts = AlertRepository::new(db.pool());

    let now = now_iso8601();

    let alice = supervisors
        .create(CreateSupervisorRequest {
            name: "Alice Warren".to_string(),
            email: "alice.warren@example.com".to_string(),
            phone: Some("555-0101".to_string()),
            permission: Permission::Admin,
            status: SupervisorStatus::Active,
            registration_date: now.clone(),
        })
        .await?;

    let bruno = supervisors
        .create(CreateSupervisorRequest {
            name: "Bruno Keller".to_string(),
            email: "bruno.keller@example.com".to_string(),
            phone: None,
            permission: Permission::Basic,
            status: SupervisorStatus::Active,
            registration_date: now.clone(),
        })
        .await?;

    let scanner = devices
        .create(CreateDeviceRequest {
            name: "Handheld Scanner".to_string(),
            category: "Electronics".to_string(),
            status: DeviceStatus::Available,
            location: Some("Aisle 4".to_string()),
            last_maintenance: None,
            scan_code: Some("SCN-0001".to_string()),
            supervisor_id: Some(alice.id),
        })
        .await?;

    let pallet_jack = devices
        .create(CreateDeviceRequest {
            name: "Pallet Jack".to_string(),
            category: "Warehouse".to_string(),
            status: DeviceStatus::Available,
            location: Some("Dock B".to_string()),
            last_maintenance: Some(today_date()),
            scan_code: Some("PJK-0002".to_string()),
            supervisor_id: Some(bruno.id),
        })
        .await?;

    devices
        .create(CreateDeviceRequest {
            name: "Label Printer".to_string(),
            category: "Electronics".to_string(),
            status: DeviceStatus::Maintenance,
            location: Some("Office".to_string()),
            last_maintenance: Some(today_date()),
            scan_code: Some("LBL-0003".to_string()),
            supervisor_id: None,
        })
        .await?;

    loans
        .create(CreateLoanRequest {
            device_id: scanner.id,
            supervisor_id: bruno.id,
            loan_date: today_date(),
            notes: Some("Cycle count, aisle 4".to_string()),
        })
        .await?;

    alerts
        .create(CreateAlertRequest {
            device_id: Some(pallet_jack.id),
            kind: "Maintenance".to_string(),
            description: "Hydraulic fluid check due".to_string(),
            date: now.clone(),
        })
        .await?;

    alerts
        .create(CreateAlertRequest {
            device_id: None,
            kind: "Inventory".to_string(),
            description: "Quarterly audit scheduled".to_string(),
            date: now,
        })
        .await?;

    info!("Sample data seeded");
    Ok(())
}
