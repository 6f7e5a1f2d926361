//! Subnet registry: creation with full address generation, cascade
//! deletion, and usage statistics.

use crate::config::Config;
use crate::inventory::Inventory;
use crate::store::Store;
use std::sync::Arc;
use tracing::info;
use warden_common::addr;
use warden_common::{Error, NewSubnet, Result, StatusCounts, Subnet, SubnetStats, SubnetUsage};

#[derive(Clone)]
pub struct SubnetRegistry {
    store: Arc<dyn Store>,
    high_threshold: f64,
    medium_threshold: f64,
}

impl SubnetRegistry {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            high_threshold: config.high_usage_threshold,
            medium_threshold: config.medium_usage_threshold,
        }
    }

    /// Create a subnet and generate its full address set. Fails with
    /// Validation on malformed cidr text, Duplicate when the cidr already
    /// exists or its range overlaps an existing subnet. Returns the created
    /// subnet and the number of addresses generated.
    pub async fn create(
        &self,
        cidr: &str,
        description: &str,
        gateway: &str,
        dns_server: &str,
    ) -> Result<(Subnet, u64)> {
        let net = addr::parse_cidr(cidr)?;
        let cidr_text = net.to_string();

        if self.store.get_subnet(&cidr_text).await?.is_some() {
            return Err(Error::Duplicate(format!("subnet {cidr_text} already exists")));
        }
        for existing in self.store.list_subnets().await? {
            if let Ok(other) = addr::parse_cidr(&existing.cidr) {
                if addr::overlaps(net, other) {
                    return Err(Error::Duplicate(format!(
                        "subnet {cidr_text} overlaps existing subnet {}",
                        existing.cidr
                    )));
                }
            }
        }

        let records = Inventory::expand(net);
        let total = records.len() as u64;
        let subnet = self
            .store
            .insert_subnet(
                &NewSubnet {
                    cidr: cidr_text,
                    description: description.trim().to_string(),
                    gateway: gateway.trim().to_string(),
                    dns_server: dns_server.trim().to_string(),
                },
                &records,
            )
            .await?;

        info!("subnet {} created with {} addresses", subnet.cidr, total);
        Ok((subnet, total))
    }

    /// Delete a subnet and every address it owns. History rows referencing
    /// the removed addresses are retained. Returns the number of address
    /// rows removed.
    pub async fn delete(&self, cidr: &str) -> Result<u64> {
        let removed = self.store.remove_subnet(cidr).await?;
        info!("subnet {} deleted, {} addresses removed", cidr, removed);
        Ok(removed)
    }

    /// Stats for one subnet, or None when the cidr is unknown
    pub async fn stats_for(&self, cidr: &str) -> Result<Option<SubnetStats>> {
        match self.store.get_subnet(cidr).await? {
            Some(subnet) => {
                let counts = self.store.subnet_counts(subnet.id).await?;
                Ok(Some(self.stats(subnet, counts)))
            }
            None => Ok(None),
        }
    }

    /// Every subnet with its stats, ordered by network address
    pub async fn list_with_stats(&self) -> Result<Vec<SubnetStats>> {
        let mut rows = self.store.list_subnet_counts().await?;
        rows.sort_by_key(|(subnet, _)| addr::cidr_sort_key(&subnet.cidr));
        Ok(rows.into_iter().map(|(subnet, counts)| self.stats(subnet, counts)).collect())
    }

    fn stats(&self, subnet: Subnet, counts: StatusCounts) -> SubnetStats {
        SubnetStats {
            usage_rate: counts.usage_rate(),
            usage: SubnetUsage::classify(&counts, self.high_threshold, self.medium_threshold),
            subnet,
            counts,
        }
    }
}
