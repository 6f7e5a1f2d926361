//! Inventory-wide usage statistics.

use crate::store::Store;
use std::sync::Arc;
use warden_common::{GlobalStats, Result};

#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn Store>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Counts across the entire inventory. The usage rate is 0 when the
    /// inventory is empty.
    pub async fn global(&self) -> Result<GlobalStats> {
        let counts = self.store.count_addresses().await?;
        Ok(GlobalStats {
            total: counts.total,
            used: counts.used,
            free: counts.free,
            reserved: counts.reserved,
            usage_rate: counts.usage_rate(),
        })
    }
}
