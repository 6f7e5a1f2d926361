//! Storage layer for the address inventory.
//!
//! Backend-agnostic `Store` trait with two implementations: SQLite for
//! persistence and an in-memory store for tests. Both enforce the same
//! semantics: inventory-wide ip uniqueness, atomic status transitions with
//! their audit rows, and cascade deletion of a subnet's addresses.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use warden_common::{
    Address, AddressPatch, AddressStatus, AddressWithSubnet, Assignment, ExportRecord,
    HistoryEntry, NewAddress, NewSubnet, Result, SearchFilter, StatusCounts, Subnet,
};

/// Actor recorded on release and reserve audit rows
pub const SYSTEM_ACTOR: &str = "system";

/// Backend-agnostic storage interface.
///
/// All methods are async; mutating operations are serialized by the backend
/// (single connection for SQLite, one inventory-wide lock for memory), so a
/// transition's check-then-set can never interleave with another writer.
/// Result ordering is the caller's concern; the components sort by the
/// address codec's key.
#[async_trait]
pub trait Store: Send + Sync {
    // === Subnet operations ===

    /// Insert a subnet together with its generated address set in one
    /// atomic unit. Fails with Duplicate when the cidr or any generated ip
    /// already exists.
    async fn insert_subnet(&self, subnet: &NewSubnet, addresses: &[NewAddress]) -> Result<Subnet>;

    /// Get a subnet by exact cidr text
    async fn get_subnet(&self, cidr: &str) -> Result<Option<Subnet>>;

    /// List all subnets
    async fn list_subnets(&self) -> Result<Vec<Subnet>>;

    /// Remove a subnet and every address it owns in one atomic unit:
    /// addresses first, then the subnet. History rows are untouched.
    /// Returns the number of address rows removed; NotFound when the cidr
    /// is unknown.
    async fn remove_subnet(&self, cidr: &str) -> Result<u64>;

    /// Per-status counts for one subnet
    async fn subnet_counts(&self, subnet_id: i64) -> Result<StatusCounts>;

    /// Every subnet joined with its per-status counts
    async fn list_subnet_counts(&self) -> Result<Vec<(Subnet, StatusCounts)>>;

    // === Address operations ===

    /// Get an address by ip text
    async fn get_address(&self, ip: &str) -> Result<Option<Address>>;

    /// Addresses of one subnet, optionally restricted to a status
    async fn list_addresses(
        &self,
        subnet_id: i64,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>>;

    /// Filtered search joined with the owning subnet. Keyword matching is
    /// a substring match, ASCII-case-insensitive, across ip, allocated_to,
    /// mac, device_type, notes, subnet cidr and subnet description.
    async fn search_addresses(&self, filter: &SearchFilter) -> Result<Vec<AddressWithSubnet>>;

    /// Inventory-wide per-status counts
    async fn count_addresses(&self) -> Result<StatusCounts>;

    // === Status transitions ===
    //
    // Each transition is an atomic check-then-set; the matching audit row
    // commits in the same unit, and a failed transition writes nothing.

    /// Free -> Used. NotFound for an unknown ip, InvalidTransition when the
    /// current status is not Free.
    async fn allocate_address(&self, ip: &str, assignment: &Assignment) -> Result<()>;

    /// Any status -> Free; clears the assignment fields and notes. Returns
    /// the prior status. NotFound for an unknown ip.
    async fn release_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus>;

    /// Any status -> Reserved; the audit row records the actual prior
    /// status. Returns the prior status. NotFound for an unknown ip.
    async fn reserve_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus>;

    /// Direct field application for imports. No audit row, no status
    /// precondition. NotFound for an unknown ip.
    async fn apply_patch(&self, ip: &str, patch: &AddressPatch) -> Result<()>;

    // === History ===

    /// Audit rows for one ip, newest first
    async fn history_for_ip(&self, ip: &str) -> Result<Vec<HistoryEntry>>;

    // === Export ===

    /// Every subnet joined with each of its addresses; a subnet with no
    /// addresses yields one record with the address side unset.
    async fn export_records(&self) -> Result<Vec<ExportRecord>>;

    /// Release backend resources
    async fn close(&self);
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// In-memory storage (for testing)
    Memory,

    /// SQLite database file
    Sqlite { path: PathBuf },
}

/// Create a store from configuration
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::open(path).await?;
            Ok(Arc::new(store))
        }
    }
}
