//! Sealframe command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create alice.key (password-protected) and alice.pub
//! sealframe keygen --out alice --password-file pw.txt
//!
//! # Encrypt for two recipients
//! sealframe encrypt -i report.pdf -o report.sf -r alice.pub -r bob.pub
//!
//! # Decrypt
//! sealframe decrypt -i report.sf -o report.pdf -k alice.key --key-password-file pw.txt
//! ```

use std::io;

use clap::Parser;
use sealframe_cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    sealframe_cli::run(cli, &mut io::stdout().lock())?;

    Ok(())
}
