// Main binary: parses the command line, initializes logging, opens the
// store once and dispatches to the subcommand implementations.

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::stderr;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};
use warden_core::{Config, Ipam};

mod cmd;
mod labels;

#[derive(Parser, Debug)]
#[command(author, version, about = "Warden IP address management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file path (overrides WARDEN_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage subnets
    Subnet {
        #[command(subcommand)]
        command: cmd::subnet::SubnetCommands,
    },
    /// List the addresses of one subnet
    Addr(cmd::query::AddrArgs),
    /// Allocate a free address to an owner
    Allocate(cmd::alloc::AllocateArgs),
    /// Allocate several free addresses of a subnet at once
    BulkAllocate(cmd::alloc::BulkAllocateArgs),
    /// Release an address back to the free pool
    Release(cmd::alloc::ReleaseArgs),
    /// Reserve an address so it cannot be allocated
    Reserve(cmd::alloc::ReserveArgs),
    /// List the free addresses of one subnet
    Free(cmd::alloc::FreeArgs),
    /// Search the inventory by subnet, status and keyword
    Search(cmd::query::SearchArgs),
    /// Inventory-wide usage statistics
    Stats,
    /// Audit trail of one address
    History(cmd::query::HistoryArgs),
    /// Export addresses (or subnets) as CSV
    Export(cmd::transfer::ExportArgs),
    /// Import subnets or address updates from CSV
    Import {
        #[command(subcommand)]
        command: cmd::transfer::ImportCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let default_directives =
        format!("warden={level},warden_core={level},sqlx=warn", level = default_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    let mut config = Config::from_env();
    if let Some(db) = cli.db.clone() {
        config.database_path = db;
    }
    debug!("using database {}", config.database_path.display());

    let ipam = match Ipam::open(&config).await {
        Ok(ipam) => ipam,
        Err(e) => {
            eprintln!("error: cannot open {}: {}", config.database_path.display(), e);
            std::process::exit(1);
        }
    };

    let exit_code = dispatch(&ipam, cli.command).await?;
    ipam.close().await;

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn dispatch(ipam: &Ipam, command: Commands) -> Result<i32> {
    match command {
        Commands::Subnet { command } => cmd::subnet::run(ipam, command).await,
        Commands::Addr(args) => cmd::query::run_addr_list(ipam, args).await,
        Commands::Allocate(args) => cmd::alloc::run_allocate(ipam, args).await,
        Commands::BulkAllocate(args) => cmd::alloc::run_bulk_allocate(ipam, args).await,
        Commands::Release(args) => cmd::alloc::run_release(ipam, args).await,
        Commands::Reserve(args) => cmd::alloc::run_reserve(ipam, args).await,
        Commands::Free(args) => cmd::alloc::run_free(ipam, args).await,
        Commands::Search(args) => cmd::query::run_search(ipam, args).await,
        Commands::Stats => cmd::query::run_stats(ipam).await,
        Commands::History(args) => cmd::query::run_history(ipam, args).await,
        Commands::Export(args) => cmd::transfer::run_export(ipam, args).await,
        Commands::Import { command } => cmd::transfer::run_import(ipam, command).await,
    }
}
