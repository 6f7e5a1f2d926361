//! CSV import/export subcommands. File formats live here; the core only
//! sees row vectors.

use super::{finish_batch, format_opt_time, format_time, opt_str};
use crate::labels;
use clap::{Args, Subcommand};
use color_eyre::eyre::Result;
use csv::{ReaderBuilder, Writer};
use std::io;
use std::path::{Path, PathBuf};
use warden_core::Ipam;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export the subnet table with statistics instead of address rows
    #[arg(long)]
    pub subnets: bool,
}

#[derive(Subcommand, Debug)]
pub enum ImportCommands {
    /// Import subnets from a CSV of [cidr, description, gateway, dns] rows
    Subnets(ImportFileArgs),
    /// Import address updates from a CSV of
    /// [ip, status, allocated_to, mac, device_type, notes] rows
    Addresses(ImportAddressArgs),
}

#[derive(Args, Debug)]
pub struct ImportFileArgs {
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportAddressArgs {
    pub file: PathBuf,

    /// Only apply rows belonging to this subnet
    #[arg(long)]
    pub subnet: Option<String>,
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

fn write_csv<W, R, const N: usize>(writer: W, header: [&str; N], rows: &[R]) -> Result<()>
where
    W: io::Write,
    R: AsRef<[String]>,
{
    let mut csv = Writer::from_writer(writer);
    csv.write_record(header)?;
    for row in rows {
        csv.write_record(row.as_ref())?;
    }
    csv.flush()?;
    Ok(())
}

pub async fn run_export(ipam: &Ipam, args: ExportArgs) -> Result<i32> {
    if args.subnets {
        let stats = ipam.list_subnets_with_stats().await?;
        let rows: Vec<[String; 11]> = stats
            .iter()
            .map(|s| {
                [
                    s.subnet.cidr.clone(),
                    s.subnet.description.clone(),
                    s.subnet.gateway.clone(),
                    s.subnet.dns_server.clone(),
                    s.counts.total.to_string(),
                    s.counts.used.to_string(),
                    s.counts.free.to_string(),
                    s.counts.reserved.to_string(),
                    format!("{:.1}%", s.usage_rate),
                    labels::usage_label(s.usage).to_string(),
                    format_time(&s.subnet.created_at),
                ]
            })
            .collect();
        match &args.output {
            Some(path) => write_csv(std::fs::File::create(path)?, labels::SUBNET_COLUMNS, &rows)?,
            None => write_csv(io::stdout(), labels::SUBNET_COLUMNS, &rows)?,
        }
        return Ok(0);
    }

    let records = ipam.export_all().await?;
    let rows: Vec<[String; 7]> = records
        .iter()
        .filter_map(|record| record.address.as_ref())
        .map(|address| {
            [
                address.ip.clone(),
                labels::status_label(address.status).to_string(),
                opt_str(&address.allocated_to).to_string(),
                opt_str(&address.mac).to_string(),
                opt_str(&address.device_type).to_string(),
                format_opt_time(&address.allocated_at),
                opt_str(&address.notes).to_string(),
            ]
        })
        .collect();
    match &args.output {
        Some(path) => write_csv(std::fs::File::create(path)?, labels::ADDRESS_COLUMNS, &rows)?,
        None => write_csv(io::stdout(), labels::ADDRESS_COLUMNS, &rows)?,
    }
    Ok(0)
}

pub async fn run_import(ipam: &Ipam, command: ImportCommands) -> Result<i32> {
    match command {
        ImportCommands::Subnets(args) => {
            let rows = read_rows(&args.file)?;
            let outcome = ipam.import_subnets(&rows).await;
            Ok(finish_batch(
                format!("imported {} subnets", outcome.applied),
                &outcome.errors,
            ))
        }
        ImportCommands::Addresses(args) => {
            let rows = read_rows(&args.file)?;
            let outcome = ipam.import_addresses(&rows, args.subnet.as_deref()).await;
            Ok(finish_batch(
                format!("updated {} addresses", outcome.applied),
                &outcome.errors,
            ))
        }
    }
}
