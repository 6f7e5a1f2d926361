//! Filtered and keyword search across the inventory.

use crate::store::Store;
use std::sync::Arc;
use warden_common::addr;
use warden_common::{AddressStatus, AddressWithSubnet, Error, Result, SearchFilter};

#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn Store>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Filtered search joined with the owning subnet. Results are always in
    /// ascending numeric ip order, whatever filters applied.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<AddressWithSubnet>> {
        let mut hits = self.store.search_addresses(filter).await?;
        hits.sort_by_key(|hit| addr::sort_key(&hit.address.ip));
        Ok(hits)
    }

    /// Free addresses of one subnet, sorted; candidates for allocation.
    /// NotFound when the cidr is unknown.
    pub async fn free_addresses(&self, cidr: &str) -> Result<Vec<String>> {
        let subnet = self
            .store
            .get_subnet(cidr)
            .await?
            .ok_or_else(|| Error::NotFound(format!("subnet {cidr}")))?;
        let mut ips: Vec<String> = self
            .store
            .list_addresses(subnet.id, Some(AddressStatus::Free))
            .await?
            .into_iter()
            .map(|address| address.ip)
            .collect();
        ips.sort_by_key(|ip| addr::sort_key(ip));
        Ok(ips)
    }
}
