//! ABOUTME: End-to-end smoke test for the depot platform
//! ABOUTME: Tests the first-run flow from open through seeding to searches

use dp_db::{Db, DeviceRepository, DeviceStatus, FlagStore, LoanRepository, SupervisorRepository};
use tempfile::TempDir;
use test_support::create_test_id;

/// Smoke test setup that manages a temporary database and flag store
struct SmokeTestSetup {
    #[allow(dead_code)]
    temp_dir: TempDir,
    db: Db,
    flags: FlagStore,
}

impl SmokeTestSetup {
    async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let test_id = create_test_id();
        let temp_dir = TempDir::new()?;

        let db_path = temp_dir.path().join(format!("smoke_{}.db", test_id));
        let db = Db::open(&db_path.to_string_lossy(), 5, true).await?;

        let flags = FlagStore::new(temp_dir.path().join("flags.json"));

        Ok(Self { temp_dir, db, flags })
    }

    /// The first-run path the binary takes: seed once, then remember it
    async fn seed_once(&self) -> Result<bool, Box<dyn std::error::Error>> {
        if self.flags.is_data_seeded().await? {
            return Ok(false);
        }
        dp_db::seed::seed_sample_data(&self.db).await?;
        self.flags.mark_data_seeded().await?;
        Ok(true)
    }
}

#[tokio::test]
async fn test_first_run_seeds_exactly_once() {
    let setup = SmokeTestSetup::new().await.expect("Setup failed");

    setup.db.health_check().await.expect("Health check failed");

    assert!(setup.seed_once().await.expect("First seeding failed"));
    assert!(!setup.seed_once().await.expect("Second seeding check failed"));

    let stats = setup.db.stats().await.expect("Stats failed");
    assert_eq!(stats.table_counts["supervisors"], 2);
    assert_eq!(stats.table_counts["devices"], 3);
    assert_eq!(stats.table_counts["loans"], 1);
    assert_eq!(stats.table_counts["alerts"], 2);
}

#[tokio::test]
async fn test_seeded_data_supports_searches_and_returns() {
    let setup = SmokeTestSetup::new().await.expect("Setup failed");
    setup.seed_once().await.expect("Seeding failed");

    let supervisors = SupervisorRepository::new(setup.db.pool());
    let devices = DeviceRepository::new(setup.db.pool());
    let loans = LoanRepository::new(setup.db.pool());

    let hits = supervisors.search("warren").await.expect("Search failed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Alice Warren");

    let scanner = devices
        .find_by_scan_code("SCN-0001")
        .await
        .expect("Scan lookup failed")
        .expect("Seeded scanner should exist");
    assert_eq!(scanner.status, DeviceStatus::InUse);

    // The seeded loan can be returned like any other
    let active = loans
        .active_for_device(scanner.id)
        .await
        .expect("Active loan lookup failed");
    assert_eq!(active.len(), 1);

    assert!(loans
        .return_device(active[0].id)
        .await
        .expect("Return failed"));

    let scanner = devices
        .find_by_id(scanner.id)
        .await
        .expect("Find failed")
        .expect("Device should exist");
    assert_eq!(scanner.status, DeviceStatus::Available);
}
