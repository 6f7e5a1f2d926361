//! Presentation mapping: the only place display labels live. Core code and
//! the persisted format use the machine names from `AddressStatus::as_str`.

use warden_common::{AddressStatus, SubnetUsage};

/// Display label for an address status
pub fn status_label(status: AddressStatus) -> &'static str {
    match status {
        AddressStatus::Free => "Free",
        AddressStatus::Used => "Used",
        AddressStatus::Reserved => "Reserved",
    }
}

/// Display label for a subnet usage classification
pub fn usage_label(usage: SubnetUsage) -> &'static str {
    match usage {
        SubnetUsage::Empty => "Empty",
        SubnetUsage::High => "High usage",
        SubnetUsage::MediumHigh => "Medium-high usage",
        SubnetUsage::Idle => "Idle",
        SubnetUsage::Normal => "Normal",
    }
}

/// Parse a user-supplied status argument: machine name or display label,
/// case-insensitive
pub fn parse_status_arg(text: &str) -> Option<AddressStatus> {
    AddressStatus::parse(text)
}

/// Column headers for address tables and CSV exports. The order is
/// compatibility-significant for exports.
pub const ADDRESS_COLUMNS: [&str; 7] =
    ["IP", "Status", "Allocated to", "MAC", "Device type", "Allocated at", "Notes"];

/// Column headers for subnet tables and CSV exports
pub const SUBNET_COLUMNS: [&str; 11] = [
    "Subnet",
    "Description",
    "Gateway",
    "DNS",
    "Total",
    "Used",
    "Free",
    "Reserved",
    "Usage",
    "Status",
    "Created",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_arg() {
        assert_eq!(parse_status_arg("free"), Some(AddressStatus::Free));
        assert_eq!(parse_status_arg("Reserved"), Some(AddressStatus::Reserved));
        assert_eq!(parse_status_arg("USED"), Some(AddressStatus::Used));
        assert_eq!(parse_status_arg("busy"), None);
    }

    #[test]
    fn test_labels_cover_every_status() {
        for status in [AddressStatus::Free, AddressStatus::Used, AddressStatus::Reserved] {
            assert!(!status_label(status).is_empty());
        }
    }
}
