// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tipflow - tip settlement and QR authorization engine.
//!
//! Binary entry point: loads configuration, then dispatches to the
//! subcommand implementations.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;
mod status;
mod summary;
mod token;

/// Tipflow - tip settlement and QR authorization engine.
#[derive(Parser, Debug)]
#[command(name = "tipflow", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the settlement engine HTTP server.
    Serve,
    /// Manage QR tokens.
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Manage summary rollups.
    Summary {
        #[command(subcommand)]
        command: SummaryCommands,
    },
    /// Show counts and unprocessed webhook events.
    Status,
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    /// Mint a token for a staff member.
    Issue {
        #[arg(long)]
        staff: String,
        #[arg(long)]
        business: String,
        #[arg(long)]
        location: Option<String>,
        /// SHIFT, DAILY, or PERSISTENT.
        #[arg(long, default_value = "SHIFT")]
        kind: String,
        #[arg(long)]
        shift_id: Option<String>,
        /// Hours until expiry; omit for no expiry.
        #[arg(long)]
        valid_hours: Option<i64>,
        #[arg(long)]
        max_scans: Option<u32>,
    },
    /// Deactivate one token by id.
    Revoke { token_id: String },
    /// Deactivate every token a staff member owns.
    RevokeStaff { staff_id: String },
}

#[derive(Subcommand, Debug)]
enum SummaryCommands {
    /// Rebuild a rollup from the ledger.
    Rebuild {
        /// business, location, or staff.
        kind: String,
        scope_id: String,
        /// Settlement date, YYYY-MM-DD.
        date: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match tipflow_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tipflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Token { command } => token::run(config, command).await,
        Commands::Summary { command } => summary::run(config, command).await,
        Commands::Status => status::run(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
