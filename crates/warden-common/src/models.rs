use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A managed subnet. Owns the address records generated from its CIDR at
/// creation time; deleting the subnet removes them with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet {
    pub id: i64,
    pub cidr: String,
    pub description: String,
    pub gateway: String,
    pub dns_server: String,
    pub created_at: DateTime<Utc>,
}

/// Address ownership status
///
/// - `Free`: available for allocation
/// - `Used`: allocated to a device or owner
/// - `Reserved`: excluded from allocation, structurally (network/broadcast)
///   or administratively
///
/// There is no "unknown" or "deleted" status; removal is row deletion.
/// Transitions happen only through the allocation engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    Free,
    Used,
    Reserved,
}

impl AddressStatus {
    /// Machine-readable status string, as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressStatus::Free => "free",
            AddressStatus::Used => "used",
            AddressStatus::Reserved => "reserved",
        }
    }

    /// Parse a persisted or imported status string (case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "free" => Some(AddressStatus::Free),
            "used" => Some(AddressStatus::Used),
            "reserved" => Some(AddressStatus::Reserved),
            _ => None,
        }
    }
}

impl fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked IP address. `ip` is unique across the whole inventory, not
/// just within the owning subnet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: i64,
    pub ip: String,
    pub subnet_id: i64,
    pub status: AddressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Audit trail action kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Allocate,
    Release,
    Reserve,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Allocate => "allocate",
            HistoryAction::Release => "release",
            HistoryAction::Reserve => "reserve",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "allocate" => Some(HistoryAction::Allocate),
            "release" => Some(HistoryAction::Release),
            "reserve" => Some(HistoryAction::Reserve),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit trail row. Append-only; never updated or deleted, and retained
/// after the address or subnet it references is gone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub ip: String,
    pub action: HistoryAction,
    pub old_status: Option<AddressStatus>,
    pub new_status: AddressStatus,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Per-status address counts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub reserved: u64,
}

impl StatusCounts {
    /// Percentage of addresses in Used status; 0 when the total is 0
    pub fn usage_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        }
    }
}

/// Usage classification of a subnet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubnetUsage {
    Empty,
    High,
    MediumHigh,
    Idle,
    Normal,
}

impl SubnetUsage {
    /// Classify counts against the configured thresholds (percentages).
    /// Empty wins over everything; High and MediumHigh are checked before
    /// Idle, so a subnet above a threshold never reads as idle.
    pub fn classify(counts: &StatusCounts, high_threshold: f64, medium_threshold: f64) -> Self {
        if counts.total == 0 {
            return SubnetUsage::Empty;
        }
        let rate = counts.usage_rate();
        if rate >= high_threshold {
            SubnetUsage::High
        } else if rate >= medium_threshold {
            SubnetUsage::MediumHigh
        } else if counts.used == 0 {
            SubnetUsage::Idle
        } else {
            SubnetUsage::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetUsage::Empty => "empty",
            SubnetUsage::High => "high",
            SubnetUsage::MediumHigh => "medium_high",
            SubnetUsage::Idle => "idle",
            SubnetUsage::Normal => "normal",
        }
    }
}

/// A subnet joined with its aggregated address counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetStats {
    pub subnet: Subnet,
    pub counts: StatusCounts,
    pub usage_rate: f64,
    pub usage: SubnetUsage,
}

/// Inventory-wide counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GlobalStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub reserved: u64,
    pub usage_rate: f64,
}

/// Search result row: an address joined with its owning subnet. The subnet
/// side is optional because the subnet reference is weak.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressWithSubnet {
    pub address: Address,
    pub subnet_cidr: Option<String>,
    pub subnet_description: Option<String>,
}

/// One row of the full export: a subnet and one of its addresses. A subnet
/// with no addresses still yields a single record with `address` unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRecord {
    pub subnet: Subnet,
    pub address: Option<Address>,
}

/// Fields describing a pending subnet insert
#[derive(Debug, Clone)]
pub struct NewSubnet {
    pub cidr: String,
    pub description: String,
    pub gateway: String,
    pub dns_server: String,
}

/// One generated address record, before it has an id
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub ip: String,
    pub status: AddressStatus,
    pub notes: Option<String>,
}

/// Allocation metadata attached to an address when it becomes Used
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub allocated_to: String,
    pub mac: Option<String>,
    pub device_type: Option<String>,
    pub notes: Option<String>,
}

/// Direct field application for imports: status plus, for used rows that
/// carry them, the assignment fields
#[derive(Debug, Clone)]
pub struct AddressPatch {
    pub status: AddressStatus,
    pub assignment: Option<Assignment>,
}

/// Search criteria. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub subnet: Option<String>,
    pub status: Option<AddressStatus>,
    pub keyword: Option<String>,
}

/// Outcome of a single mutating operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Outcome of subnet creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubnetOutcome {
    pub success: bool,
    pub message: String,
    pub total_addresses: u64,
}

/// Outcome of a bulk allocation: per-row results, no rollback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub errors: Vec<String>,
}

/// Outcome of a row-based import: per-row results, no rollback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub applied: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [AddressStatus::Free, AddressStatus::Used, AddressStatus::Reserved] {
            assert_eq!(AddressStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AddressStatus::parse("RESERVED"), Some(AddressStatus::Reserved));
        assert_eq!(AddressStatus::parse("deleted"), None);
    }

    #[test]
    fn test_usage_rate_zero_total() {
        let counts = StatusCounts::default();
        assert_eq!(counts.usage_rate(), 0.0);
    }

    #[test]
    fn test_classify_boundaries() {
        let make = |total, used| StatusCounts { total, used, free: total - used, reserved: 0 };
        assert_eq!(SubnetUsage::classify(&make(0, 0), 80.0, 60.0), SubnetUsage::Empty);
        assert_eq!(SubnetUsage::classify(&make(100, 80), 80.0, 60.0), SubnetUsage::High);
        assert_eq!(SubnetUsage::classify(&make(100, 60), 80.0, 60.0), SubnetUsage::MediumHigh);
        assert_eq!(SubnetUsage::classify(&make(100, 0), 80.0, 60.0), SubnetUsage::Idle);
        assert_eq!(SubnetUsage::classify(&make(100, 30), 80.0, 60.0), SubnetUsage::Normal);
    }

    #[test]
    fn test_address_serde_roundtrip() {
        let addr = Address {
            id: 7,
            ip: "192.168.1.10".to_string(),
            subnet_id: 1,
            status: AddressStatus::Used,
            allocated_to: Some("srv01".to_string()),
            mac: None,
            device_type: Some("server".to_string()),
            allocated_at: Some(Utc::now()),
            notes: None,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string(&addr).unwrap();
        let restored: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, restored);
        assert!(json.contains("\"status\":\"used\""));
    }
}
