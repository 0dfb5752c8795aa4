//! # Tabsmith command-line entry point
//!
//! Each subcommand prints one JSON envelope to stdout; logs go to stderr and
//! the log directory.
//!
//! ```bash
//! tabsmith plan sales.csv --level aggressive
//! tabsmith guided sales.csv --goal "churn drivers" -i correlation -i outliers
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // JSON results go to stdout

use anyhow::Result;
use clap::Parser as _;
use tabsmith::cli::{Cli, run_command};

fn main() -> Result<()> {
    tabsmith::logging::init()?;

    let cli = Cli::parse();
    let output = run_command(cli)?;
    println!("{output}");
    Ok(())
}
