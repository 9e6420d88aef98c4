#[path = "checkmail/args.rs"]
mod args;
#[path = "checkmail/output.rs"]
mod output;
#[path = "checkmail/tiers.rs"]
mod tiers;

use anyhow::{Context, Result};
use checkmail::Checker;
use tracing_subscriber::EnvFilter;

use std::io::{self, BufRead};

use crate::args::{Cli, Commands};
use crate::output::OutputRow;
use crate::tiers::Check;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };
    let filter = match level {
        Some(level) => EnvFilter::new(format!("checkmail={level}")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (tier, addresses) = if cli.stdin {
        let mut addresses = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            let address = line.trim();
            if !address.is_empty() {
                addresses.push(address.to_string());
            }
        }
        (cli.tier, addresses)
    } else {
        match &cli.cmd {
            Some(Commands::Format { email }) => (args::Tier::Format, vec![email.clone()]),
            Some(Commands::Mx { email }) => (args::Tier::Mx, vec![email.clone()]),
            Some(Commands::Host { email }) => (args::Tier::Host, vec![email.clone()]),
            Some(Commands::User { email }) => (args::Tier::User, vec![email.clone()]),
            None => {
                Cli::clap_command().print_help()?;
                println!();
                return Ok(());
            }
        }
    };

    let check = Check::new(tier, &cli)?;
    let checker = Checker::new(cli.check_options());
    let rows: Vec<OutputRow> = addresses
        .iter()
        .map(|address| OutputRow::new(address, tier, &check.run(&checker, address)))
        .collect();

    output::write_reports(&rows, &cli)?;

    // exit codes: 0 all passed, 2 some failed, 1 fatal
    if output::any_invalid(&rows) {
        std::process::exit(2);
    }
    Ok(())
}
