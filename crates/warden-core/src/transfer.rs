//! Row-based import/export.
//!
//! Rows are plain string vectors; file formats (CSV quoting, encodings) are
//! the presentation layer's concern. Imports apply rows independently with
//! no batch transaction: a failed row is recorded and the rest proceed.

use crate::registry::SubnetRegistry;
use crate::store::Store;
use std::sync::Arc;
use tracing::warn;
use warden_common::addr;
use warden_common::{
    AddressPatch, AddressStatus, Assignment, Error, ExportRecord, ImportOutcome, Result, Subnet,
};

#[derive(Clone)]
pub struct Transfer {
    store: Arc<dyn Store>,
    registry: SubnetRegistry,
}

fn cell(row: &[String], index: usize) -> Option<String> {
    row.get(index).map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

impl Transfer {
    pub fn new(store: Arc<dyn Store>, registry: SubnetRegistry) -> Self {
        Self { store, registry }
    }

    /// Every subnet joined with each of its addresses, ordered by network
    /// address then numeric ip
    pub async fn export_all(&self) -> Result<Vec<ExportRecord>> {
        let mut records = self.store.export_records().await?;
        records.sort_by_key(|record| {
            (
                addr::cidr_sort_key(&record.subnet.cidr),
                record
                    .address
                    .as_ref()
                    .map(|address| addr::sort_key(&address.ip))
                    .unwrap_or_default(),
            )
        });
        Ok(records)
    }

    /// Import subnet rows `[cidr, description?, gateway?, dns?]`. Each row
    /// goes through the full creation path (validation, duplicate and
    /// overlap checks, address generation). Empty rows are skipped.
    pub async fn import_subnets(&self, rows: &[Vec<String>]) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for row in rows {
            if row.is_empty() {
                continue;
            }
            let cidr = row[0].trim();
            let description = cell(row, 1).unwrap_or_default();
            let gateway = cell(row, 2).unwrap_or_default();
            let dns_server = cell(row, 3).unwrap_or_default();

            match self.registry.create(cidr, &description, &gateway, &dns_server).await {
                Ok(_) => outcome.applied += 1,
                Err(e) => {
                    warn!("subnet import row {:?}: {}", cidr, e);
                    outcome.errors.push(e.to_string());
                }
            }
        }
        outcome
    }

    /// Import address rows `[ip, status, allocated_to?, mac?, device_type?,
    /// notes?]`. Unknown status text falls back to free. A used row that
    /// carries at least the allocated_to and mac columns also applies the
    /// assignment fields; any other row updates status only. Rows for
    /// unknown ips — or, when `target_subnet` is given, for ips outside
    /// that subnet — fail individually. No audit rows are written.
    pub async fn import_addresses(
        &self,
        rows: &[Vec<String>],
        target_subnet: Option<&str>,
    ) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();

        let target: Option<Subnet> = match target_subnet {
            Some(cidr) => match self.store.get_subnet(cidr).await {
                Ok(Some(subnet)) => Some(subnet),
                Ok(None) => {
                    outcome.errors.push(format!("subnet {cidr} not found"));
                    return outcome;
                }
                Err(e) => {
                    outcome.errors.push(e.to_string());
                    return outcome;
                }
            },
            None => None,
        };

        for row in rows {
            if row.len() < 2 {
                continue;
            }
            let ip = row[0].trim();
            let status = AddressStatus::parse(&row[1]).unwrap_or(AddressStatus::Free);

            if let Some(subnet) = &target {
                match self.store.get_address(ip).await {
                    Ok(Some(address)) if address.subnet_id != subnet.id => {
                        outcome
                            .errors
                            .push(format!("address {ip} is not in subnet {}, skipped", subnet.cidr));
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        outcome.errors.push(format!("{ip}: {e}"));
                        continue;
                    }
                }
            }

            let assignment = if status == AddressStatus::Used && row.len() >= 4 {
                Some(Assignment {
                    allocated_to: row[2].trim().to_string(),
                    mac: cell(row, 3),
                    device_type: cell(row, 4),
                    notes: cell(row, 5),
                })
            } else {
                None
            };

            match self.store.apply_patch(ip, &AddressPatch { status, assignment }).await {
                Ok(()) => outcome.applied += 1,
                Err(Error::NotFound(_)) => {
                    outcome.errors.push(format!("address {ip} not found, skipped"));
                }
                Err(e) => {
                    warn!("address import row {:?}: {}", ip, e);
                    outcome.errors.push(format!("{ip}: {e}"));
                }
            }
        }
        outcome
    }
}
