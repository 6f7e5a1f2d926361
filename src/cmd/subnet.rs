//! Subnet management subcommands.

use super::{finish, format_time};
use crate::labels;
use clap::{Args, Subcommand};
use color_eyre::eyre::Result;
use warden_core::Ipam;

#[derive(Subcommand, Debug)]
pub enum SubnetCommands {
    /// Create a subnet and generate its address inventory
    Add(AddArgs),
    /// Delete a subnet and every address it owns
    Delete(DeleteArgs),
    /// List all subnets with usage statistics
    List,
    /// Show one subnet in detail
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Subnet in CIDR notation, e.g. 192.168.1.0/24
    pub cidr: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub gateway: String,

    /// DNS server for hosts in this subnet
    #[arg(long, default_value = "")]
    pub dns: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub cidr: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub cidr: String,
}

pub async fn run(ipam: &Ipam, command: SubnetCommands) -> Result<i32> {
    match command {
        SubnetCommands::Add(args) => {
            let outcome = ipam
                .create_subnet(&args.cidr, &args.description, &args.gateway, &args.dns)
                .await;
            if outcome.success {
                println!("{}", outcome.message);
                Ok(0)
            } else {
                eprintln!("error: {}", outcome.message);
                Ok(1)
            }
        }
        SubnetCommands::Delete(args) => Ok(finish(&ipam.delete_subnet(&args.cidr).await)),
        SubnetCommands::List => {
            let all = ipam.list_subnets_with_stats().await?;
            if all.is_empty() {
                println!("no subnets");
                return Ok(0);
            }
            println!(
                "{:<20} {:<20} {:>7} {:>6} {:>6} {:>9} {:>7}  {}",
                "Subnet", "Description", "Total", "Used", "Free", "Reserved", "Usage", "Status"
            );
            for stats in &all {
                println!(
                    "{:<20} {:<20} {:>7} {:>6} {:>6} {:>9} {:>6.1}%  {}",
                    stats.subnet.cidr,
                    stats.subnet.description,
                    stats.counts.total,
                    stats.counts.used,
                    stats.counts.free,
                    stats.counts.reserved,
                    stats.usage_rate,
                    labels::usage_label(stats.usage),
                );
            }
            Ok(0)
        }
        SubnetCommands::Show(args) => {
            let Some(stats) = ipam.subnet_details(&args.cidr).await? else {
                eprintln!("error: subnet {} not found", args.cidr);
                return Ok(1);
            };
            println!("Subnet:      {}", stats.subnet.cidr);
            println!("Description: {}", stats.subnet.description);
            println!("Gateway:     {}", stats.subnet.gateway);
            println!("DNS:         {}", stats.subnet.dns_server);
            println!("Created:     {}", format_time(&stats.subnet.created_at));
            println!(
                "Addresses:   {} total, {} used, {} free, {} reserved",
                stats.counts.total, stats.counts.used, stats.counts.free, stats.counts.reserved
            );
            println!(
                "Usage:       {:.1}% ({})",
                stats.usage_rate,
                labels::usage_label(stats.usage)
            );
            Ok(0)
        }
    }
}
