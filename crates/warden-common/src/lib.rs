pub mod addr;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    ActionOutcome, Address, AddressPatch, AddressStatus, AddressWithSubnet, Assignment,
    BulkOutcome, CreateSubnetOutcome, ExportRecord, GlobalStats, HistoryAction, HistoryEntry,
    ImportOutcome, NewAddress, NewSubnet, SearchFilter, StatusCounts, Subnet, SubnetStats,
    SubnetUsage,
};
