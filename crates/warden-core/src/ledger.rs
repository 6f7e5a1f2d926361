//! History ledger: the read view over the audit trail.
//!
//! Rows are written only inside store transitions, so every entry commits
//! atomically with the status change it records. Entries outlive the
//! address and subnet they reference.

use crate::store::Store;
use std::sync::Arc;
use warden_common::{HistoryEntry, Result};

#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<dyn Store>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Audit rows for one ip, newest first
    pub async fn for_ip(&self, ip: &str) -> Result<Vec<HistoryEntry>> {
        self.store.history_for_ip(ip).await
    }
}
