//! In-memory storage backend
//!
//! Simple storage for testing and development. A single RwLock guards the
//! whole inventory, so every mutating operation — including a transition's
//! check-then-set plus audit row — runs under one lock scope.

use super::{Store, SYSTEM_ACTOR};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use warden_common::{
    Address, AddressPatch, AddressStatus, AddressWithSubnet, Assignment, Error, ExportRecord,
    HistoryAction, HistoryEntry, NewAddress, NewSubnet, Result, SearchFilter, StatusCounts,
    Subnet,
};

#[derive(Default)]
struct Inner {
    /// subnet id -> subnet
    subnets: HashMap<i64, Subnet>,
    /// ip -> address (ip uniqueness falls out of the key)
    addresses: HashMap<String, Address>,
    history: Vec<HistoryEntry>,
    next_subnet_id: i64,
    next_address_id: i64,
    next_history_id: i64,
}

impl Inner {
    fn subnet_by_cidr(&self, cidr: &str) -> Option<&Subnet> {
        self.subnets.values().find(|s| s.cidr == cidr)
    }

    fn counts_for(&self, subnet_id: Option<i64>) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for address in self.addresses.values() {
            if let Some(id) = subnet_id {
                if address.subnet_id != id {
                    continue;
                }
            }
            counts.total += 1;
            match address.status {
                AddressStatus::Free => counts.free += 1,
                AddressStatus::Used => counts.used += 1,
                AddressStatus::Reserved => counts.reserved += 1,
            }
        }
        counts
    }

    fn push_history(
        &mut self,
        ip: &str,
        action: HistoryAction,
        old_status: Option<AddressStatus>,
        new_status: AddressStatus,
        actor: &str,
        notes: Option<&str>,
    ) {
        self.next_history_id += 1;
        self.history.push(HistoryEntry {
            id: self.next_history_id,
            ip: ip.to_string(),
            action,
            old_status,
            new_status,
            actor: actor.to_string(),
            notes: notes.map(str::to_string),
            changed_at: Utc::now(),
        });
    }
}

/// In-memory storage backend. See the module docs for the locking model.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| Error::Lock(format!("write lock poisoned: {}", e)))
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| Error::Lock(format!("read lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive substring match; `None` fields never match
fn field_contains(field: Option<&str>, needle: &str) -> bool {
    field
        .map(|value| value.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

#[async_trait]
impl Store for MemoryStore {
    // === Subnet operations ===

    async fn insert_subnet(&self, subnet: &NewSubnet, addresses: &[NewAddress]) -> Result<Subnet> {
        let mut inner = self.write_lock()?;

        if inner.subnet_by_cidr(&subnet.cidr).is_some() {
            return Err(Error::Duplicate(format!("subnet {} already exists", subnet.cidr)));
        }
        for address in addresses {
            if inner.addresses.contains_key(&address.ip) {
                return Err(Error::Duplicate(format!("address {} already exists", address.ip)));
            }
        }

        let now = Utc::now();
        inner.next_subnet_id += 1;
        let record = Subnet {
            id: inner.next_subnet_id,
            cidr: subnet.cidr.clone(),
            description: subnet.description.clone(),
            gateway: subnet.gateway.clone(),
            dns_server: subnet.dns_server.clone(),
            created_at: now,
        };
        inner.subnets.insert(record.id, record.clone());

        for address in addresses {
            inner.next_address_id += 1;
            let id = inner.next_address_id;
            inner.addresses.insert(
                address.ip.clone(),
                Address {
                    id,
                    ip: address.ip.clone(),
                    subnet_id: record.id,
                    status: address.status,
                    allocated_to: None,
                    mac: None,
                    device_type: None,
                    allocated_at: None,
                    notes: address.notes.clone(),
                    last_updated: now,
                },
            );
        }

        Ok(record)
    }

    async fn get_subnet(&self, cidr: &str) -> Result<Option<Subnet>> {
        let inner = self.read_lock()?;
        Ok(inner.subnet_by_cidr(cidr).cloned())
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        let inner = self.read_lock()?;
        Ok(inner.subnets.values().cloned().collect())
    }

    async fn remove_subnet(&self, cidr: &str) -> Result<u64> {
        let mut inner = self.write_lock()?;

        let Some(subnet_id) = inner.subnet_by_cidr(cidr).map(|s| s.id) else {
            return Err(Error::NotFound(format!("subnet {cidr}")));
        };

        let before = inner.addresses.len();
        inner.addresses.retain(|_, address| address.subnet_id != subnet_id);
        let removed = (before - inner.addresses.len()) as u64;
        inner.subnets.remove(&subnet_id);

        Ok(removed)
    }

    async fn subnet_counts(&self, subnet_id: i64) -> Result<StatusCounts> {
        let inner = self.read_lock()?;
        Ok(inner.counts_for(Some(subnet_id)))
    }

    async fn list_subnet_counts(&self) -> Result<Vec<(Subnet, StatusCounts)>> {
        let inner = self.read_lock()?;
        Ok(inner
            .subnets
            .values()
            .map(|subnet| (subnet.clone(), inner.counts_for(Some(subnet.id))))
            .collect())
    }

    // === Address operations ===

    async fn get_address(&self, ip: &str) -> Result<Option<Address>> {
        let inner = self.read_lock()?;
        Ok(inner.addresses.get(ip).cloned())
    }

    async fn list_addresses(
        &self,
        subnet_id: i64,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>> {
        let inner = self.read_lock()?;
        Ok(inner
            .addresses
            .values()
            .filter(|address| address.subnet_id == subnet_id)
            .filter(|address| status.map(|s| address.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn search_addresses(&self, filter: &SearchFilter) -> Result<Vec<AddressWithSubnet>> {
        let inner = self.read_lock()?;
        let keyword = filter
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_ascii_lowercase);

        let mut result = Vec::new();
        for address in inner.addresses.values() {
            let subnet = inner.subnets.get(&address.subnet_id);

            if let Some(wanted) = filter.subnet.as_deref() {
                if subnet.map(|s| s.cidr.as_str()) != Some(wanted) {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if address.status != status {
                    continue;
                }
            }
            if let Some(needle) = keyword.as_deref() {
                let hit = field_contains(Some(address.ip.as_str()), needle)
                    || field_contains(address.allocated_to.as_deref(), needle)
                    || field_contains(address.mac.as_deref(), needle)
                    || field_contains(address.device_type.as_deref(), needle)
                    || field_contains(address.notes.as_deref(), needle)
                    || field_contains(subnet.map(|s| s.cidr.as_str()), needle)
                    || field_contains(subnet.map(|s| s.description.as_str()), needle);
                if !hit {
                    continue;
                }
            }

            result.push(AddressWithSubnet {
                address: address.clone(),
                subnet_cidr: subnet.map(|s| s.cidr.clone()),
                subnet_description: subnet.map(|s| s.description.clone()),
            });
        }
        Ok(result)
    }

    async fn count_addresses(&self) -> Result<StatusCounts> {
        let inner = self.read_lock()?;
        Ok(inner.counts_for(None))
    }

    // === Status transitions ===

    async fn allocate_address(&self, ip: &str, assignment: &Assignment) -> Result<()> {
        let mut inner = self.write_lock()?;

        let Some(address) = inner.addresses.get(ip) else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        if address.status != AddressStatus::Free {
            return Err(Error::InvalidTransition(format!(
                "address {ip} is {}, cannot allocate",
                address.status
            )));
        }

        let now = Utc::now();
        if let Some(address) = inner.addresses.get_mut(ip) {
            address.status = AddressStatus::Used;
            address.allocated_to = Some(assignment.allocated_to.clone());
            address.mac = assignment.mac.clone();
            address.device_type = assignment.device_type.clone();
            address.allocated_at = Some(now);
            address.notes = assignment.notes.clone();
            address.last_updated = now;
        }
        inner.push_history(
            ip,
            HistoryAction::Allocate,
            Some(AddressStatus::Free),
            AddressStatus::Used,
            &assignment.allocated_to,
            assignment.notes.as_deref(),
        );
        Ok(())
    }

    async fn release_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let mut inner = self.write_lock()?;

        let Some(address) = inner.addresses.get(ip) else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        let prior = address.status;

        let now = Utc::now();
        if let Some(address) = inner.addresses.get_mut(ip) {
            address.status = AddressStatus::Free;
            address.allocated_to = None;
            address.mac = None;
            address.device_type = None;
            address.allocated_at = None;
            address.notes = None;
            address.last_updated = now;
        }
        inner.push_history(
            ip,
            HistoryAction::Release,
            Some(prior),
            AddressStatus::Free,
            SYSTEM_ACTOR,
            notes,
        );
        Ok(prior)
    }

    async fn reserve_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let mut inner = self.write_lock()?;

        let Some(address) = inner.addresses.get(ip) else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        let prior = address.status;

        let now = Utc::now();
        if let Some(address) = inner.addresses.get_mut(ip) {
            address.status = AddressStatus::Reserved;
            address.notes = notes.map(str::to_string);
            address.last_updated = now;
        }
        inner.push_history(
            ip,
            HistoryAction::Reserve,
            Some(prior),
            AddressStatus::Reserved,
            SYSTEM_ACTOR,
            notes,
        );
        Ok(prior)
    }

    async fn apply_patch(&self, ip: &str, patch: &AddressPatch) -> Result<()> {
        let mut inner = self.write_lock()?;

        let now = Utc::now();
        let Some(address) = inner.addresses.get_mut(ip) else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        address.status = patch.status;
        if let Some(assignment) = &patch.assignment {
            address.allocated_to = Some(assignment.allocated_to.clone());
            address.mac = assignment.mac.clone();
            address.device_type = assignment.device_type.clone();
            address.notes = assignment.notes.clone();
        }
        address.last_updated = now;
        Ok(())
    }

    // === History ===

    async fn history_for_ip(&self, ip: &str) -> Result<Vec<HistoryEntry>> {
        let inner = self.read_lock()?;
        Ok(inner
            .history
            .iter()
            .rev()
            .filter(|entry| entry.ip == ip)
            .cloned()
            .collect())
    }

    // === Export ===

    async fn export_records(&self) -> Result<Vec<ExportRecord>> {
        let inner = self.read_lock()?;
        let mut records = Vec::new();
        for subnet in inner.subnets.values() {
            let owned: Vec<&Address> = inner
                .addresses
                .values()
                .filter(|address| address.subnet_id == subnet.id)
                .collect();
            if owned.is_empty() {
                records.push(ExportRecord { subnet: subnet.clone(), address: None });
            } else {
                for address in owned {
                    records.push(ExportRecord {
                        subnet: subnet.clone(),
                        address: Some(address.clone()),
                    });
                }
            }
        }
        Ok(records)
    }

    async fn close(&self) {}
}
