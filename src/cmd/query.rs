//! Read-side subcommands: address listings, search, statistics, history.

use super::{format_opt_time, format_time, opt_str};
use crate::labels;
use clap::Args;
use color_eyre::eyre::{eyre, Result};
use warden_common::{AddressStatus, SearchFilter};
use warden_core::Ipam;

#[derive(Args, Debug)]
pub struct AddrArgs {
    /// Subnet to list
    pub cidr: String,

    /// Restrict to one status: free, used or reserved
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Keyword matched against ip, owner, MAC, device type, notes, subnet
    /// and description
    pub keyword: Option<String>,

    /// Exact subnet filter
    #[arg(long)]
    pub subnet: Option<String>,

    /// Status filter: free, used or reserved
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Address whose audit trail to show
    pub ip: String,
}

fn status_filter(arg: Option<&str>) -> Result<Option<AddressStatus>> {
    match arg {
        None => Ok(None),
        Some(text) => labels::parse_status_arg(text)
            .map(Some)
            .ok_or_else(|| eyre!("unknown status {:?}, expected free, used or reserved", text)),
    }
}

pub async fn run_addr_list(ipam: &Ipam, args: AddrArgs) -> Result<i32> {
    let status = status_filter(args.status.as_deref())?;
    match ipam.addresses_by_subnet(&args.cidr, status).await {
        Ok(addresses) => {
            println!(
                "{:<16} {:<9} {:<18} {:<18} {:<12} {:<20} {}",
                "IP", "Status", "Allocated to", "MAC", "Device type", "Allocated at", "Notes"
            );
            for address in &addresses {
                println!(
                    "{:<16} {:<9} {:<18} {:<18} {:<12} {:<20} {}",
                    address.ip,
                    labels::status_label(address.status),
                    opt_str(&address.allocated_to),
                    opt_str(&address.mac),
                    opt_str(&address.device_type),
                    format_opt_time(&address.allocated_at),
                    opt_str(&address.notes),
                );
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(1)
        }
    }
}

pub async fn run_search(ipam: &Ipam, args: SearchArgs) -> Result<i32> {
    let filter = SearchFilter {
        subnet: args.subnet,
        status: status_filter(args.status.as_deref())?,
        keyword: args.keyword,
    };
    let hits = ipam.search(&filter).await.map_err(|e| eyre!("{e}"))?;
    if hits.is_empty() {
        println!("no matches");
        return Ok(0);
    }
    println!(
        "{:<16} {:<9} {:<18} {:<18} {:<18} {}",
        "IP", "Status", "Allocated to", "MAC", "Subnet", "Notes"
    );
    for hit in &hits {
        println!(
            "{:<16} {:<9} {:<18} {:<18} {:<18} {}",
            hit.address.ip,
            labels::status_label(hit.address.status),
            opt_str(&hit.address.allocated_to),
            opt_str(&hit.address.mac),
            hit.subnet_cidr.as_deref().unwrap_or(""),
            opt_str(&hit.address.notes),
        );
    }
    println!("{} matches", hits.len());
    Ok(0)
}

pub async fn run_stats(ipam: &Ipam) -> Result<i32> {
    let stats = ipam.global_stats().await.map_err(|e| eyre!("{e}"))?;
    println!("Total addresses: {}", stats.total);
    println!("Used:            {}", stats.used);
    println!("Free:            {}", stats.free);
    println!("Reserved:        {}", stats.reserved);
    println!("Usage rate:      {:.1}%", stats.usage_rate);
    Ok(0)
}

pub async fn run_history(ipam: &Ipam, args: HistoryArgs) -> Result<i32> {
    let entries = ipam.history(&args.ip).await.map_err(|e| eyre!("{e}"))?;
    if entries.is_empty() {
        println!("no history for {}", args.ip);
        return Ok(0);
    }
    println!(
        "{:<20} {:<9} {:<9} {:<9} {:<14} {}",
        "Changed at", "Action", "From", "To", "Actor", "Notes"
    );
    for entry in &entries {
        println!(
            "{:<20} {:<9} {:<9} {:<9} {:<14} {}",
            format_time(&entry.changed_at),
            entry.action,
            entry
                .old_status
                .map(labels::status_label)
                .unwrap_or(""),
            labels::status_label(entry.new_status),
            entry.actor,
            opt_str(&entry.notes),
        );
    }
    Ok(0)
}
