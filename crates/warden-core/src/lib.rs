//! warden-core: the IPAM engine.
//!
//! Components own an injected `Arc<dyn Store>`; the `Ipam` facade wires
//! them together and exposes the operation surface consumed by front ends.
//! Mutating operations return outcome values with human-readable messages
//! instead of propagating errors to the caller.

pub mod config;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod query;
pub mod registry;
pub mod stats;
pub mod store;
pub mod transfer;

pub use config::Config;

use engine::AllocationEngine;
use inventory::Inventory;
use ledger::HistoryLedger;
use query::QueryEngine;
use registry::SubnetRegistry;
use stats::StatisticsAggregator;
use std::sync::Arc;
use store::{Store, StoreConfig};
use transfer::Transfer;
use warden_common::{
    ActionOutcome, Address, AddressStatus, AddressWithSubnet, Assignment, BulkOutcome,
    CreateSubnetOutcome, ExportRecord, GlobalStats, HistoryEntry, ImportOutcome, Result,
    SearchFilter, SubnetStats,
};

/// Facade over the IPAM components. One instance per process; the store is
/// opened once and shared by every component.
pub struct Ipam {
    store: Arc<dyn Store>,
    registry: SubnetRegistry,
    inventory: Inventory,
    engine: AllocationEngine,
    ledger: HistoryLedger,
    stats: StatisticsAggregator,
    query: QueryEngine,
    transfer: Transfer,
}

impl Ipam {
    /// Open the configured SQLite database and build the components
    pub async fn open(config: &Config) -> Result<Self> {
        let store = store::create_store(&StoreConfig::Sqlite {
            path: config.database_path.clone(),
        })
        .await?;
        Ok(Self::with_store(store, config))
    }

    /// Build the components over an existing store (tests, in-memory runs)
    pub fn with_store(store: Arc<dyn Store>, config: &Config) -> Self {
        let registry = SubnetRegistry::new(store.clone(), config);
        Self {
            inventory: Inventory::new(store.clone()),
            engine: AllocationEngine::new(store.clone()),
            ledger: HistoryLedger::new(store.clone()),
            stats: StatisticsAggregator::new(store.clone()),
            query: QueryEngine::new(store.clone()),
            transfer: Transfer::new(store.clone(), registry.clone()),
            registry,
            store,
        }
    }

    /// Release the underlying store
    pub async fn close(&self) {
        self.store.close().await;
    }

    // === Subnets ===

    pub async fn create_subnet(
        &self,
        cidr: &str,
        description: &str,
        gateway: &str,
        dns_server: &str,
    ) -> CreateSubnetOutcome {
        match self.registry.create(cidr, description, gateway, dns_server).await {
            Ok((subnet, total)) => CreateSubnetOutcome {
                success: true,
                message: format!("subnet {} created with {} addresses", subnet.cidr, total),
                total_addresses: total,
            },
            Err(e) => CreateSubnetOutcome {
                success: false,
                message: e.to_string(),
                total_addresses: 0,
            },
        }
    }

    pub async fn delete_subnet(&self, cidr: &str) -> ActionOutcome {
        match self.registry.delete(cidr).await {
            Ok(removed) => ActionOutcome::ok(format!(
                "subnet {cidr} deleted, {removed} addresses removed"
            )),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    pub async fn list_subnets_with_stats(&self) -> Result<Vec<SubnetStats>> {
        self.registry.list_with_stats().await
    }

    pub async fn subnet_details(&self, cidr: &str) -> Result<Option<SubnetStats>> {
        self.registry.stats_for(cidr).await
    }

    pub async fn addresses_by_subnet(
        &self,
        cidr: &str,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>> {
        self.inventory.by_subnet(cidr, status).await
    }

    // === Allocation ===

    pub async fn allocate(&self, ip: &str, assignment: &Assignment) -> ActionOutcome {
        match self.engine.allocate(ip, assignment).await {
            Ok(()) => ActionOutcome::ok(format!(
                "address {ip} allocated to {}",
                assignment.allocated_to
            )),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    pub async fn release(&self, ip: &str, notes: Option<&str>) -> ActionOutcome {
        match self.engine.release(ip, notes).await {
            Ok(_) => ActionOutcome::ok(format!("address {ip} released")),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    pub async fn reserve(&self, ip: &str, notes: Option<&str>) -> ActionOutcome {
        match self.engine.reserve(ip, notes).await {
            Ok(_) => ActionOutcome::ok(format!("address {ip} reserved")),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    pub async fn bulk_allocate(&self, ips: &[String], assignment: &Assignment) -> BulkOutcome {
        self.engine.bulk_allocate(ips, assignment).await
    }

    // === Queries ===

    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<AddressWithSubnet>> {
        self.query.search(filter).await
    }

    pub async fn free_addresses(&self, cidr: &str) -> Result<Vec<String>> {
        self.query.free_addresses(cidr).await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        self.stats.global().await
    }

    pub async fn history(&self, ip: &str) -> Result<Vec<HistoryEntry>> {
        self.ledger.for_ip(ip).await
    }

    // === Import / export ===

    pub async fn export_all(&self) -> Result<Vec<ExportRecord>> {
        self.transfer.export_all().await
    }

    pub async fn import_subnets(&self, rows: &[Vec<String>]) -> ImportOutcome {
        self.transfer.import_subnets(rows).await
    }

    pub async fn import_addresses(
        &self,
        rows: &[Vec<String>],
        target_subnet: Option<&str>,
    ) -> ImportOutcome {
        self.transfer.import_addresses(rows, target_subnet).await
    }
}
