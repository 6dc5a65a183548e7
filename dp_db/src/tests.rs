use super::*;
use dp_core::Id;

/// Create a test database with a unique name under the temp dir
pub(crate) async fn create_test_db() -> Result<Db> {
    let dir = test_support::temp_dir_path();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(dp_core::Error::Io)?;
    let db_path = dir.join(format!("test_depot_{}.db", Id::new()));
    Db::open(&db_path.to_string_lossy(), 5, true).await
}

fn sample_supervisor(email: &str) -> CreateSupervisorRequest {
    CreateSupervisorRequest {
        name: "Dana Reyes".to_string(),
        email: email.to_string(),
        phone: Some("555-0199".to_string()),
        permission: Permission::Basic,
        status: SupervisorStatus::Active,
        registration_date: "2024-01-15T09:00:00Z".to_string(),
    }
}

fn sample_device(name: &str, scan_code: Option<&str>) -> CreateDeviceRequest {
    CreateDeviceRequest {
        name: name.to_string(),
        category: "Hardware".to_string(),
        status: DeviceStatus::Available,
        location: Some("Warehouse".to_string()),
        last_maintenance: None,
        scan_code: scan_code.map(|s| s.to_string()),
        supervisor_id: None,
    }
}

#[tokio::test]
async fn test_database_initialization() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");

    db.health_check().await.expect("Health check should pass");

    let stats = db.stats().await.expect("Stats should be available");
    for table in ["supervisors", "devices", "loans", "alerts", "audit"] {
        assert_eq!(stats.table_counts[table], 0, "table {} should be empty", table);
    }
}

#[tokio::test]
async fn test_schema_bootstrap_is_idempotent() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");

    // A second bootstrap over the same file must not fail or wipe data
    let repo = SupervisorRepository::new(db.pool());
    repo.create(sample_supervisor("idem@example.com"))
        .await
        .expect("Failed to create supervisor");

    db.create_schema().await.expect("Bootstrap should be idempotent");

    let all = repo.list().await.expect("Failed to list supervisors");
    assert_eq!(all.len(), 1);
}

#[test]
fn test_safe_sql_identifier_validation() {
    assert!(is_safe_sql_identifier("supervisors"));
    assert!(is_safe_sql_identifier("audit"));
    assert!(is_safe_sql_identifier("_private"));
    assert!(is_safe_sql_identifier("table123"));

    assert!(!is_safe_sql_identifier(""));
    assert!(!is_safe_sql_identifier("1users"));
    assert!(!is_safe_sql_identifier("user-table"));
    assert!(!is_safe_sql_identifier("users; DROP TABLE users"));
    assert!(!is_safe_sql_identifier("users' OR '1'='1"));
}

#[tokio::test]
async fn test_supervisor_create_and_find_roundtrip() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = SupervisorRepository::new(db.pool());

    let created = repo
        .create(sample_supervisor("dana@example.com"))
        .await
        .expect("Failed to create supervisor");

    assert!(created.id > 0);
    assert_eq!(created.name, "Dana Reyes");
    assert_eq!(created.permission, Permission::Basic);

    let found = repo
        .find_by_id(created.id)
        .await
        .expect("Failed to find supervisor")
        .expect("Supervisor should exist");
    assert_eq!(found, created);
}

#[tokio::test]
async fn test_supervisor_update_roundtrip_and_missing_id() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = SupervisorRepository::new(db.pool());
    let audit = AuditRepository::new(db.pool());

    let created = repo
        .create(sample_supervisor("update@example.com"))
        .await
        .expect("Failed to create supervisor");

    let updated = repo
        .update(
            created.id,
            UpdateSupervisorRequest {
                name: "Dana R. Quinn".to_string(),
                email: "update@example.com".to_string(),
                phone: None,
                permission: Permission::Admin,
                status: SupervisorStatus::Inactive,
                registration_date: created.registration_date.clone(),
            },
        )
        .await
        .expect("Failed to update supervisor")
        .expect("Supervisor should exist");

    assert_eq!(updated.name, "Dana R. Quinn");
    assert_eq!(updated.permission, Permission::Admin);
    assert_eq!(updated.phone, None);

    let found = repo
        .find_by_id(created.id)
        .await
        .expect("Failed to find supervisor")
        .expect("Supervisor should exist");
    assert_eq!(found, updated);

    // Update on a missing id: no result and no audit side effects
    let records_before = audit.list_for_table("supervisors").await.unwrap().len();
    let missing = repo
        .update(
            9999,
            UpdateSupervisorRequest {
                name: "Nobody".to_string(),
                email: "nobody@example.com".to_string(),
                phone: None,
                permission: Permission::Basic,
                status: SupervisorStatus::Active,
                registration_date: "2024-01-01T00:00:00Z".to_string(),
            },
        )
        .await
        .expect("Update on missing id should not error");
    assert!(missing.is_none());
    let records_after = audit.list_for_table("supervisors").await.unwrap().len();
    assert_eq!(records_before, records_after);
}

#[tokio::test]
async fn test_supervisor_search_and_filters() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = SupervisorRepository::new(db.pool());

    repo.create(sample_supervisor("dana@example.com"))
        .await
        .expect("Failed to create supervisor");
    let mut other = sample_supervisor("mori@example.com");
    other.name = "Kenji Mori".to_string();
    other.permission = Permission::Auditor;
    other.status = SupervisorStatus::Inactive;
    repo.create(other).await.expect("Failed to create supervisor");

    // Case-insensitive substring match on name or email
    let hits = repo.search("kenji").await.expect("Search failed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Kenji Mori");

    let hits = repo.search("example.com").await.expect("Search failed");
    assert_eq!(hits.len(), 2);

    let none = repo.search("zzz-no-match").await.expect("Search failed");
    assert!(none.is_empty());

    let auditors = repo
        .filter_by_permission(Permission::Auditor)
        .await
        .expect("Filter failed");
    assert_eq!(auditors.len(), 1);

    let inactive = repo
        .filter_by_status(SupervisorStatus::Inactive)
        .await
        .expect("Filter failed");
    assert_eq!(inactive.len(), 1);
}

#[tokio::test]
async fn test_device_crud_roundtrip() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = DeviceRepository::new(db.pool());

    let created = repo
        .create(sample_device("Router A", Some("QR-001")))
        .await
        .expect("Failed to create device");
    assert!(created.id > 0);
    assert_eq!(created.status, DeviceStatus::Available);

    let found = repo
        .find_by_id(created.id)
        .await
        .expect("Failed to find device")
        .expect("Device should exist");
    assert_eq!(found, created);

    let by_code = repo
        .find_by_scan_code("QR-001")
        .await
        .expect("Failed to find device by scan code")
        .expect("Device should exist");
    assert_eq!(by_code.id, created.id);

    let updated = repo
        .update(
            created.id,
            UpdateDeviceRequest {
                name: "Router A".to_string(),
                category: "Networking".to_string(),
                status: DeviceStatus::Maintenance,
                location: Some("Lab".to_string()),
                last_maintenance: Some("2024-02-01".to_string()),
                scan_code: Some("QR-001".to_string()),
                supervisor_id: None,
            },
        )
        .await
        .expect("Failed to update device")
        .expect("Device should exist");
    assert_eq!(updated.category, "Networking");
    assert_eq!(updated.status, DeviceStatus::Maintenance);

    assert!(repo.delete(created.id).await.expect("Delete failed"));
    assert!(repo
        .find_by_id(created.id)
        .await
        .expect("Find failed")
        .is_none());

    // Deleting again reports not-found, not an error
    assert!(!repo.delete(created.id).await.expect("Delete failed"));
}

#[tokio::test]
async fn test_device_search_and_filters() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = DeviceRepository::new(db.pool());

    repo.create(sample_device("Router A", Some("QR-010")))
        .await
        .expect("Failed to create device");
    let mut drill = sample_device("Power Drill", Some("QR-011"));
    drill.category = "Tools".to_string();
    drill.status = DeviceStatus::Maintenance;
    repo.create(drill).await.expect("Failed to create device");

    let hits = repo.search("router").await.expect("Search failed");
    assert_eq!(hits.len(), 1);

    let empty = repo.search("no-such-device").await.expect("Search failed");
    assert!(empty.is_empty());

    let tools = repo.filter_by_category("Tools").await.expect("Filter failed");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "Power Drill");

    let available = repo
        .filter_by_status(DeviceStatus::Available)
        .await
        .expect("Filter failed");
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].name, "Router A");
}

#[tokio::test]
async fn test_devices_by_supervisor() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let supervisors = SupervisorRepository::new(db.pool());
    let devices = DeviceRepository::new(db.pool());

    let owner = supervisors
        .create(sample_supervisor("owner@example.com"))
        .await
        .expect("Failed to create supervisor");

    let mut owned = sample_device("Forklift", Some("QR-020"));
    owned.supervisor_id = Some(owner.id);
    devices.create(owned).await.expect("Failed to create device");
    devices
        .create(sample_device("Spare Scanner", None))
        .await
        .expect("Failed to create device");

    let assigned = devices
        .list_by_supervisor(owner.id)
        .await
        .expect("Failed to list devices");
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].name, "Forklift");
}

#[tokio::test]
async fn test_alert_resolve_is_idempotent() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let repo = AlertRepository::new(db.pool());

    let alert = repo
        .create(CreateAlertRequest {
            device_id: None,
            kind: "Maintenance".to_string(),
            description: "Belt inspection overdue".to_string(),
            date: "2024-03-01T08:00:00Z".to_string(),
        })
        .await
        .expect("Failed to create alert");
    assert!(!alert.resolved);

    assert!(repo.resolve(alert.id).await.expect("Resolve failed"));
    let resolved = repo
        .find_by_id(alert.id)
        .await
        .expect("Find failed")
        .expect("Alert should exist");
    assert!(resolved.resolved);

    // Second resolve: still true, state unchanged
    assert!(repo.resolve(alert.id).await.expect("Resolve failed"));
    let still = repo
        .find_by_id(alert.id)
        .await
        .expect("Find failed")
        .expect("Alert should exist");
    assert!(still.resolved);

    // Missing id reports not-found
    assert!(!repo.resolve(9999).await.expect("Resolve failed"));
}

#[tokio::test]
async fn test_alert_unresolved_listing_and_search() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let devices = DeviceRepository::new(db.pool());
    let repo = AlertRepository::new(db.pool());

    let device = devices
        .create(sample_device("Conveyor", Some("QR-030")))
        .await
        .expect("Failed to create device");

    let first = repo
        .create(CreateAlertRequest {
            device_id: Some(device.id),
            kind: "Fault".to_string(),
            description: "Motor stalled".to_string(),
            date: "2024-03-02T08:00:00Z".to_string(),
        })
        .await
        .expect("Failed to create alert");
    repo.create(CreateAlertRequest {
        device_id: None,
        kind: "Inventory".to_string(),
        description: "Cycle count pending".to_string(),
        date: "2024-03-02T09:00:00Z".to_string(),
    })
    .await
    .expect("Failed to create alert");

    repo.resolve(first.id).await.expect("Resolve failed");

    let unresolved = repo.list_unresolved().await.expect("List failed");
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].kind, "Inventory");

    // Joined device name comes back on reads
    let for_device = repo
        .list_for_device(device.id)
        .await
        .expect("List failed");
    assert_eq!(for_device.len(), 1);
    assert_eq!(for_device[0].device_name.as_deref(), Some("Conveyor"));

    let hits = repo.search("motor").await.expect("Search failed");
    assert_eq!(hits.len(), 1);

    let empty = repo.search("nothing-here").await.expect("Search failed");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_audit_trail_records_mutations() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");
    let devices = DeviceRepository::new(db.pool());
    let audit = AuditRepository::new(db.pool());

    let device = devices
        .create(sample_device("Router A", None))
        .await
        .expect("Failed to create device");
    devices
        .update(
            device.id,
            UpdateDeviceRequest {
                name: "Router A".to_string(),
                category: "Hardware".to_string(),
                status: DeviceStatus::Maintenance,
                location: None,
                last_maintenance: None,
                scan_code: None,
                supervisor_id: None,
            },
        )
        .await
        .expect("Failed to update device")
        .expect("Device should exist");

    let records = audit.list_for_table("devices").await.expect("List failed");
    assert_eq!(records.len(), 2);

    // Newest first
    assert_eq!(records[0].action, AuditAction::Update);
    assert!(records[0].before_json.is_some());
    assert!(records[0].after_json.is_some());

    assert_eq!(records[1].action, AuditAction::Create);
    assert!(records[1].before_json.is_none());
    let after: serde_json::Value =
        serde_json::from_str(records[1].after_json.as_ref().unwrap()).unwrap();
    assert_eq!(after["name"], "Router A");
    assert_eq!(after["status"], "Available");

    let recent = audit.list_recent(1).await.expect("List failed");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].action, AuditAction::Update);
}

#[tokio::test]
async fn test_flag_store_roundtrip() {
    let dir = test_support::temp_dir_path();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join(format!("flags_{}.json", Id::new()));
    let store = FlagStore::new(&path);

    assert!(!store.is_data_seeded().await.expect("Read failed"));
    assert_eq!(store.get("DB_INITIALIZED").await.expect("Read failed"), None);

    store.mark_data_seeded().await.expect("Write failed");
    assert!(store.is_data_seeded().await.expect("Read failed"));

    // Arbitrary keys ride along in the same file
    store.set("LAST_SYNC", "never").await.expect("Write failed");
    assert_eq!(
        store.get("LAST_SYNC").await.expect("Read failed").as_deref(),
        Some("never")
    );
    assert!(store.is_data_seeded().await.expect("Read failed"));
}

#[tokio::test]
async fn test_seed_sample_data_populates_tables() {
    let db = create_test_db()
        .await
        .expect("Failed to create test database");

    seed::seed_sample_data(&db).await.expect("Seeding failed");

    let stats = db.stats().await.expect("Stats should be available");
    assert_eq!(stats.table_counts["supervisors"], 2);
    assert_eq!(stats.table_counts["devices"], 3);
    assert_eq!(stats.table_counts["loans"], 1);
    assert_eq!(stats.table_counts["alerts"], 2);
    // Every seeded row went through the audited repositories
    assert_eq!(stats.table_counts["audit"], 8);

    // The seeded loan marked its device as in use
    let devices = DeviceRepository::new(db.pool());
    let in_use = devices
        .filter_by_status(DeviceStatus::InUse)
        .await
        .expect("Filter failed");
    assert_eq!(in_use.len(), 1);
}

#[test]
fn test_status_parsing_rejects_unknown_text() {
    assert!("Available".parse::<DeviceStatus>().is_ok());
    assert!("In Use".parse::<DeviceStatus>().is_ok());
    assert!("Broken".parse::<DeviceStatus>().is_err());

    assert!("Active".parse::<LoanStatus>().is_ok());
    assert!("Overdue".parse::<LoanStatus>().is_err());

    assert!("Auditor".parse::<Permission>().is_ok());
    assert!("Root".parse::<Permission>().is_err());

    assert!("resolve".parse::<AuditAction>().is_ok());
    assert!("upsert".parse::<AuditAction>().is_err());
}
