//! End-to-end exercise of the operation surface through the `Ipam` facade.

use std::sync::Arc;
use warden_common::{AddressStatus, Assignment, HistoryAction, SearchFilter};
use warden_core::store::{MemoryStore, SqliteStore, Store};
use warden_core::{Config, Ipam};

fn memory_ipam() -> Ipam {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    Ipam::with_store(store, &Config::default())
}

fn owner(name: &str) -> Assignment {
    Assignment {
        allocated_to: name.to_string(),
        mac: Some("aa:bb:cc:dd:ee:ff".to_string()),
        device_type: Some("server".to_string()),
        notes: Some("build host".to_string()),
    }
}

#[tokio::test]
async fn full_lifecycle() {
    let ipam = memory_ipam();

    // Create: 256 addresses, 254 free, 2 reserved
    let created = ipam.create_subnet("192.168.1.0/24", "office", "192.168.1.1", "192.168.1.1").await;
    assert!(created.success, "{}", created.message);
    assert_eq!(created.total_addresses, 256);

    let details = ipam.subnet_details("192.168.1.0/24").await.unwrap().unwrap();
    assert_eq!(details.counts.free, 254);
    assert_eq!(details.counts.reserved, 2);

    // Duplicate creation fails and changes nothing
    let duplicate = ipam.create_subnet("192.168.1.0/24", "", "", "").await;
    assert!(!duplicate.success);
    let details = ipam.subnet_details("192.168.1.0/24").await.unwrap().unwrap();
    assert_eq!(details.counts.total, 256);

    // Allocate
    let allocated = ipam.allocate("192.168.1.10", &owner("srv01")).await;
    assert!(allocated.success, "{}", allocated.message);
    let history = ipam.history("192.168.1.10").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Allocate);
    assert_eq!(history[0].old_status, Some(AddressStatus::Free));
    assert_eq!(history[0].new_status, AddressStatus::Used);

    // Re-allocate fails; no extra audit row
    let again = ipam.allocate("192.168.1.10", &owner("srv02")).await;
    assert!(!again.success);
    assert_eq!(ipam.history("192.168.1.10").await.unwrap().len(), 1);

    // Search by keyword finds it with no other filters set
    let hits = ipam
        .search(&SearchFilter { keyword: Some("srv01".to_string()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].address.ip, "192.168.1.10");

    // Release restores the pre-allocation state apart from history
    let released = ipam.release("192.168.1.10", None).await;
    assert!(released.success);
    let rows = ipam.addresses_by_subnet("192.168.1.0/24", Some(AddressStatus::Free)).await.unwrap();
    assert_eq!(rows.len(), 254);
    let restored = rows.iter().find(|a| a.ip == "192.168.1.10").unwrap();
    assert!(restored.allocated_to.is_none());
    assert!(restored.mac.is_none());
    assert!(restored.allocated_at.is_none());
    assert_eq!(ipam.history("192.168.1.10").await.unwrap().len(), 2);

    // Reserve bumps the reserved count by exactly one, globally and per subnet
    let before = ipam.global_stats().await.unwrap();
    let reserved = ipam.reserve("192.168.1.20", Some("backup")).await;
    assert!(reserved.success);
    let after = ipam.global_stats().await.unwrap();
    assert_eq!(after.reserved, before.reserved + 1);
    let details = ipam.subnet_details("192.168.1.0/24").await.unwrap().unwrap();
    assert_eq!(details.counts.reserved, 3);

    // Delete cascades; stats listing forgets the subnet; history survives
    let deleted = ipam.delete_subnet("192.168.1.0/24").await;
    assert!(deleted.success, "{}", deleted.message);
    assert!(ipam.list_subnets_with_stats().await.unwrap().is_empty());
    assert_eq!(ipam.global_stats().await.unwrap().total, 0);
    assert_eq!(ipam.history("192.168.1.10").await.unwrap().len(), 2);
}

#[tokio::test]
async fn global_stats_empty_inventory_has_zero_rate() {
    let ipam = memory_ipam();
    let stats = ipam.global_stats().await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.usage_rate, 0.0);
}

#[tokio::test]
async fn bulk_allocate_keeps_going_past_failures() {
    let ipam = memory_ipam();
    assert!(ipam.create_subnet("10.0.0.0/29", "", "", "").await.success);
    assert!(ipam.allocate("10.0.0.2", &owner("taken")).await.success);

    let free = ipam.free_addresses("10.0.0.0/29").await.unwrap();
    assert_eq!(free.len(), 5);

    let ips: Vec<String> =
        ["10.0.0.1", "10.0.0.2", "10.0.0.3"].iter().map(|s| s.to_string()).collect();
    let outcome = ipam.bulk_allocate(&ips, &owner("batch")).await;
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.errors.len(), 1);
}

#[tokio::test]
async fn import_export_round() {
    let ipam = memory_ipam();

    let rows: Vec<Vec<String>> = vec![
        vec!["10.0.0.0/30".to_string(), "lab".to_string()],
        vec!["bogus".to_string()],
    ];
    let outcome = ipam.import_subnets(&rows).await;
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.errors.len(), 1);

    let patch_rows: Vec<Vec<String>> = vec![vec![
        "10.0.0.1".to_string(),
        "used".to_string(),
        "printer".to_string(),
        "00:11:22:33:44:55".to_string(),
    ]];
    let outcome = ipam.import_addresses(&patch_rows, Some("10.0.0.0/30")).await;
    assert_eq!(outcome.applied, 1);

    let records = ipam.export_all().await.unwrap();
    assert_eq!(records.len(), 4);
    let used: Vec<_> = records
        .iter()
        .filter_map(|r| r.address.as_ref())
        .filter(|a| a.status == AddressStatus::Used)
        .collect();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].allocated_to.as_deref(), Some("printer"));
}

#[tokio::test]
async fn sqlite_backed_facade() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        database_path: tmp.path().join("flow.db"),
        ..Config::default()
    };

    {
        let ipam = Ipam::open(&config).await.unwrap();
        assert!(ipam.create_subnet("192.168.7.0/29", "lab", "", "").await.success);
        assert!(ipam.allocate("192.168.7.1", &owner("srv01")).await.success);
        ipam.close().await;
    }

    // Same database, fresh process
    let ipam = Ipam::open(&config).await.unwrap();
    let hits = ipam
        .search(&SearchFilter { keyword: Some("srv01".to_string()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].address.ip, "192.168.7.1");
    ipam.close().await;
}

#[tokio::test]
async fn sqlite_open_via_store_factory() {
    let tmp = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(tmp.path().join("factory.db")).await.unwrap();
    let ipam = Ipam::with_store(Arc::new(store), &Config::default());
    assert!(ipam.create_subnet("10.5.0.0/30", "", "", "").await.success);
    assert_eq!(ipam.free_addresses("10.5.0.0/30").await.unwrap().len(), 2);
    ipam.close().await;
}
