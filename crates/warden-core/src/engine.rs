//! Allocation engine: the address status state machine.
//!
//! Transitions: allocate (Free -> Used), release (any -> Free), reserve
//! (any -> Reserved). Each is an atomic check-then-set delegated to the
//! store, which commits the matching audit row in the same unit; a failed
//! transition changes nothing and logs nothing. Bulk operations apply the
//! single-row transitions independently — no rollback across rows.

use crate::store::Store;
use std::sync::Arc;
use tracing::{info, warn};
use warden_common::{AddressStatus, Assignment, BulkOutcome, Error, Result};

#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn Store>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Allocate a Free address to an owner. NotFound for an unknown ip,
    /// InvalidTransition when the address is not Free.
    pub async fn allocate(&self, ip: &str, assignment: &Assignment) -> Result<()> {
        if assignment.allocated_to.trim().is_empty() {
            return Err(Error::Validation("allocation target is required".to_string()));
        }
        self.store.allocate_address(ip, assignment).await?;
        info!("address {} allocated to {}", ip, assignment.allocated_to);
        Ok(())
    }

    /// Release an address back to Free from any prior status, clearing its
    /// assignment fields. Returns the prior status.
    pub async fn release(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let prior = self.store.release_address(ip, notes).await?;
        info!("address {} released (was {})", ip, prior);
        Ok(prior)
    }

    /// Reserve an address from any prior status. The audit row records the
    /// actual prior status. Returns the prior status.
    pub async fn reserve(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let prior = self.store.reserve_address(ip, notes).await?;
        info!("address {} reserved (was {})", ip, prior);
        Ok(prior)
    }

    /// Allocate a list of addresses to one owner. Rows are applied
    /// independently: a failure is recorded and the batch continues.
    pub async fn bulk_allocate(&self, ips: &[String], assignment: &Assignment) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for ip in ips {
            match self.allocate(ip, assignment).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    warn!("bulk allocate {}: {}", ip, e);
                    outcome.errors.push(format!("{ip}: {e}"));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;
    use crate::store::MemoryStore;
    use warden_common::addr;
    use warden_common::{NewAddress, NewSubnet};

    async fn engine_with_subnet(cidr: &str) -> AllocationEngine {
        let store = Arc::new(MemoryStore::new());
        let records: Vec<NewAddress> = Inventory::expand(addr::parse_cidr(cidr).unwrap());
        store
            .insert_subnet(
                &NewSubnet {
                    cidr: cidr.to_string(),
                    description: String::new(),
                    gateway: String::new(),
                    dns_server: String::new(),
                },
                &records,
            )
            .await
            .unwrap();
        AllocationEngine::new(store)
    }

    fn owner(name: &str) -> Assignment {
        Assignment { allocated_to: name.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_allocate_requires_owner() {
        let engine = engine_with_subnet("10.0.0.0/30").await;
        let result = engine.allocate("10.0.0.1", &owner("   ")).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_allocate_release_round_trip() {
        let engine = engine_with_subnet("10.0.0.0/30").await;
        engine.allocate("10.0.0.1", &owner("srv01")).await.unwrap();

        let result = engine.allocate("10.0.0.1", &owner("srv02")).await;
        assert!(matches!(result, Err(Error::InvalidTransition(_))));

        let prior = engine.release("10.0.0.1", Some("done")).await.unwrap();
        assert_eq!(prior, AddressStatus::Used);

        // Free again, so a fresh allocate succeeds
        engine.allocate("10.0.0.1", &owner("srv02")).await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_allocate_partial_failure() {
        let engine = engine_with_subnet("10.0.0.0/29").await;
        engine.allocate("10.0.0.3", &owner("taken")).await.unwrap();

        let ips: Vec<String> = ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcome = engine.bulk_allocate(&ips, &owner("batch")).await;

        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("10.0.0.3:"));

        // Earlier and later rows both persisted
        let prior = engine.release("10.0.0.4", None).await.unwrap();
        assert_eq!(prior, AddressStatus::Used);
    }
}
