//! Allocation subcommands: allocate, bulk allocate, release, reserve, and
//! the free-address listing used to pick candidates.

use super::{finish, finish_batch};
use clap::Args;
use color_eyre::eyre::{eyre, Result};
use std::net::Ipv4Addr;
use warden_common::{addr, Assignment};
use warden_core::Ipam;

#[derive(Args, Debug)]
pub struct AllocateArgs {
    /// Address to allocate
    pub ip: String,

    /// Owner the address is allocated to
    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub mac: Option<String>,

    #[arg(long = "device-type")]
    pub device_type: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct BulkAllocateArgs {
    /// Subnet whose free addresses are candidates
    #[arg(long)]
    pub subnet: String,

    /// Owner every allocated address is assigned to
    #[arg(long)]
    pub to: String,

    /// Restrict candidates to an inclusive range, e.g. 192.168.1.10-192.168.1.20
    #[arg(long)]
    pub range: Option<String>,

    /// Allocate at most this many addresses
    #[arg(long)]
    pub count: Option<usize>,

    #[arg(long)]
    pub mac: Option<String>,

    #[arg(long = "device-type")]
    pub device_type: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    pub ip: String,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReserveArgs {
    pub ip: String,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct FreeArgs {
    /// Subnet to list free addresses for
    pub cidr: String,
}

/// Parse an inclusive "start-end" address range
fn parse_range(text: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| eyre!("range must be start-end, got {:?}", text))?;
    let start: Ipv4Addr = start
        .trim()
        .parse()
        .map_err(|_| eyre!("invalid range start {:?}", start.trim()))?;
    let end: Ipv4Addr = end
        .trim()
        .parse()
        .map_err(|_| eyre!("invalid range end {:?}", end.trim()))?;
    if u32::from(start) > u32::from(end) {
        return Err(eyre!("range start {} is above range end {}", start, end));
    }
    Ok((start, end))
}

pub async fn run_allocate(ipam: &Ipam, args: AllocateArgs) -> Result<i32> {
    let assignment = Assignment {
        allocated_to: args.to,
        mac: args.mac,
        device_type: args.device_type,
        notes: args.notes,
    };
    Ok(finish(&ipam.allocate(&args.ip, &assignment).await))
}

pub async fn run_bulk_allocate(ipam: &Ipam, args: BulkAllocateArgs) -> Result<i32> {
    let mut candidates = ipam
        .free_addresses(&args.subnet)
        .await
        .map_err(|e| eyre!("{e}"))?;

    if let Some(range) = args.range.as_deref() {
        let (start, end) = parse_range(range)?;
        let bounds = (start.octets(), end.octets());
        candidates.retain(|ip| {
            let key = addr::sort_key(ip);
            key >= bounds.0 && key <= bounds.1
        });
    }
    if let Some(count) = args.count {
        candidates.truncate(count);
    }
    if candidates.is_empty() {
        eprintln!("error: no free addresses match in {}", args.subnet);
        return Ok(1);
    }

    let assignment = Assignment {
        allocated_to: args.to,
        mac: args.mac,
        device_type: args.device_type,
        notes: args.notes,
    };
    let outcome = ipam.bulk_allocate(&candidates, &assignment).await;
    Ok(finish_batch(
        format!("allocated {} of {} addresses", outcome.succeeded, candidates.len()),
        &outcome.errors,
    ))
}

pub async fn run_release(ipam: &Ipam, args: ReleaseArgs) -> Result<i32> {
    Ok(finish(&ipam.release(&args.ip, args.notes.as_deref()).await))
}

pub async fn run_reserve(ipam: &Ipam, args: ReserveArgs) -> Result<i32> {
    Ok(finish(&ipam.reserve(&args.ip, args.notes.as_deref()).await))
}

pub async fn run_free(ipam: &Ipam, args: FreeArgs) -> Result<i32> {
    match ipam.free_addresses(&args.cidr).await {
        Ok(ips) => {
            for ip in ips {
                println!("{ip}");
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_valid() {
        let (start, end) = parse_range("192.168.1.10-192.168.1.20").unwrap();
        assert_eq!(start, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(end, Ipv4Addr::new(192, 168, 1, 20));

        // whitespace around the separator is fine
        assert!(parse_range("10.0.0.1 - 10.0.0.9").is_ok());
    }

    #[test]
    fn test_parse_range_invalid() {
        let cases = vec![
            "192.168.1.10",              // no separator
            "192.168.1.300-192.168.1.5", // bad start
            "192.168.1.20-192.168.1.10", // backwards
            "a-b",
        ];
        for text in cases {
            assert!(parse_range(text).is_err(), "should reject {:?}", text);
        }
    }
}
