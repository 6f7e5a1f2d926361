//! Address inventory: expansion of a subnet into its tracked address set,
//! and sorted listing over the store.

use crate::store::Store;
use ipnetwork::Ipv4Network;
use std::sync::Arc;
use warden_common::addr;
use warden_common::{Address, AddressStatus, Error, NewAddress, Result};

pub const NETWORK_NOTE: &str = "network address";
pub const BROADCAST_NOTE: &str = "broadcast address";

#[derive(Clone)]
pub struct Inventory {
    store: Arc<dyn Store>,
}

impl Inventory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The generated record set for a network: every usable host Free, the
    /// network address Reserved, and — when the prefix admits one — the
    /// broadcast address Reserved.
    pub fn expand(net: Ipv4Network) -> Vec<NewAddress> {
        let mut records: Vec<NewAddress> = addr::expand_hosts(net)
            .into_iter()
            .map(|ip| NewAddress { ip, status: AddressStatus::Free, notes: None })
            .collect();

        records.push(NewAddress {
            ip: net.network().to_string(),
            status: AddressStatus::Reserved,
            notes: Some(NETWORK_NOTE.to_string()),
        });
        if net.prefix() < 31 {
            records.push(NewAddress {
                ip: net.broadcast().to_string(),
                status: AddressStatus::Reserved,
                notes: Some(BROADCAST_NOTE.to_string()),
            });
        }
        records
    }

    /// Addresses of one subnet in ascending numeric ip order, optionally
    /// restricted to a status. NotFound when the cidr is unknown.
    pub async fn by_subnet(
        &self,
        cidr: &str,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>> {
        let subnet = self
            .store
            .get_subnet(cidr)
            .await?
            .ok_or_else(|| Error::NotFound(format!("subnet {cidr}")))?;
        let mut addresses = self.store.list_addresses(subnet.id, status).await?;
        addresses.sort_by_key(|address| addr::sort_key(&address.ip));
        Ok(addresses)
    }

    /// Get one address record by ip text
    pub async fn get(&self, ip: &str) -> Result<Option<Address>> {
        self.store.get_address(ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_slash_24() {
        let records = Inventory::expand(addr::parse_cidr("192.168.1.0/24").unwrap());
        assert_eq!(records.len(), 256);
        let free = records.iter().filter(|r| r.status == AddressStatus::Free).count();
        let reserved = records.iter().filter(|r| r.status == AddressStatus::Reserved).count();
        assert_eq!(free, 254);
        assert_eq!(reserved, 2);
    }

    #[test]
    fn test_expand_slash_31_has_no_broadcast() {
        let records = Inventory::expand(addr::parse_cidr("10.0.0.0/31").unwrap());
        assert_eq!(records.len(), 2);
        let reserved: Vec<_> =
            records.iter().filter(|r| r.status == AddressStatus::Reserved).collect();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].ip, "10.0.0.0");
        assert_eq!(reserved[0].notes.as_deref(), Some(NETWORK_NOTE));
    }

    #[test]
    fn test_expand_slash_32_is_single_reserved() {
        let records = Inventory::expand(addr::parse_cidr("10.0.0.7/32").unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, "10.0.0.7");
        assert_eq!(records[0].status, AddressStatus::Reserved);
    }
}
