use std::io;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pin_pool::config::{PoolArgs, ServiceConfig, StoreArgs};
use pin_pool::telemetry::init_tracing;
use pin_pool::{
    all_possible, all_valid, parse_code, Pin, PinService, PinStore, RuleEngine, SqliteStore,
};

#[derive(Parser, Debug)]
#[command(name = "pin-pool", version, about = "Manage a pool of hard-to-guess 4-digit PINs")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    pool: PoolArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the valid PIN pool into an empty database
    Init,

    /// Issue PINs, recycling the pool when it runs out
    Get {
        count: usize,

        /// Print as CSV instead of one code per line
        #[arg(long)]
        csv: bool,
    },

    /// Explain whether a code would be accepted into the pool
    Check { code: String },

    /// Show pool counts and recent events
    Stats,

    /// Mark every PIN unallocated
    Reset,

    /// Print every code in the universe
    Universe {
        /// Only the codes that pass the validity rules
        #[arg(long)]
        valid: bool,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing()?;

    let Cli {
        store,
        pool,
        command,
    } = cli;
    let open_service = move || -> Result<PinService<SqliteStore>> {
        let config = ServiceConfig::try_from((store, pool))?;
        let store = config.open_store().context("Failed to open PIN store")?;
        Ok(PinService::with_limits(store, config.limits))
    };

    match command {
        Command::Init => {
            let service = open_service()?;
            if !service.initialize()? {
                bail!("PIN pool initialization did not complete");
            }
            let stats = service.store().stats()?;
            println!("✓ PIN pool ready: {} PINs", stats.total);
        }
        Command::Get { count, csv } => {
            let pins = open_service()?.get_pins(count)?;
            print_pins(&pins, csv)?;
        }
        Command::Check { code } => run_check(&code)?,
        Command::Stats => {
            let service = open_service()?;
            let stats = service.store().stats()?;
            println!("Total:       {}", stats.total);
            println!("Allocated:   {}", stats.allocated);
            println!("Unallocated: {}", stats.unallocated);

            let events = service.store().events(5)?;
            if !events.is_empty() {
                println!("\nRecent events:");
                for event in events {
                    println!(
                        "  {}  {:<18} {}",
                        event.timestamp.to_rfc3339(),
                        event.event_type,
                        event.data
                    );
                }
            }
        }
        Command::Reset => {
            let changed = open_service()?.store().reset_allocations()?;
            if changed {
                println!("✓ Allocations reset, pool recycled");
            } else {
                println!("Nothing to reset: the pool is empty");
            }
        }
        Command::Universe { valid } => run_universe(valid)?,
    }

    Ok(())
}

fn run_check(input: &str) -> Result<()> {
    let code = parse_code(input)?;
    let report = RuleEngine::new().check(&code);

    if report.is_valid() {
        println!("✓ {} is a valid PIN", report.code);
    } else {
        println!("✗ {} is too easy to guess:", report.code);
        for rule in &report.violations {
            println!("  - {}: {}", rule.name(), rule.description());
        }
    }

    Ok(())
}

fn run_universe(valid_only: bool) -> Result<()> {
    let codes: Box<dyn Iterator<Item = String>> = if valid_only {
        Box::new(all_valid(all_possible()))
    } else {
        Box::new(all_possible())
    };

    for code in codes {
        println!("{}", code);
    }

    Ok(())
}

fn print_pins(pins: &[Pin], as_csv: bool) -> Result<()> {
    if as_csv {
        let mut writer = csv::Writer::from_writer(io::stdout());
        for pin in pins {
            writer.serialize(pin)?;
        }
        writer.flush()?;
    } else {
        for pin in pins {
            println!("{}", pin.code);
        }
    }

    Ok(())
}
