// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dsctl - command-line client for dserver
//!
//! # Usage
//!
//! ```bash
//! # What does the server offer?
//! dsctl info
//!
//! # Take three rows from a CSV source, split on its delimiter
//! dsctl next Address -n 3 --fields
//!
//! # Keyed and hashed lookups
//! dsctl keyed Customers VIC --random
//! dsctl hash Names alice
//!
//! # Put rows back
//! dsctl store Address "1 High St,Melbourne"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dserver_client::{ClientError, Record, Registration, Session, SessionOptions};
use dserver_proto::{DEFAULT_HOST, DEFAULT_PORT};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// dsctl - query a running dserver
#[derive(Parser, Debug)]
#[command(name = "dsctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Socket timeout in seconds (0 disables)
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Split rows on the source delimiter and print them tab-separated
    #[arg(short, long, global = true)]
    fields: bool,

    /// Increase verbosity (-d debug, -dd trace)
    #[arg(short = 'd', action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the server and its sources
    Info,

    /// Show a source's handle and attributes
    Register { source: String },

    /// Take rows from a source
    Next {
        source: String,

        /// Number of rows
        #[arg(short, default_value = "1")]
        n: usize,
    },

    /// Take a row from a group of a keyed source
    Keyed {
        source: String,
        group: String,

        /// Pick a random row instead of the next one
        #[arg(short, long)]
        random: bool,
    },

    /// Next value for a tag of a keyed sequence
    Seq { source: String, tag: String },

    /// Look up a key in a hashed source
    Hash { source: String, key: String },

    /// Row of an indexed source (0-based)
    Index { source: String, index: usize },

    /// Append rows to a source
    Store {
        source: String,
        #[arg(required = true)]
        rows: Vec<String>,
    },

    /// Append rows to a group of a keyed source
    StoreKeyed {
        source: String,
        group: String,
        #[arg(required = true)]
        rows: Vec<String>,
    },
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<ClientError>() {
                Some(ClientError::Status(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let options = match args.timeout {
        0 => SessionOptions::rust(),
        secs => SessionOptions::rust().with_timeout(Duration::from_secs(secs)),
    };
    let mut session = Session::connect_with(&args.host, args.port, &options)
        .with_context(|| format!("cannot reach dserver at {}:{}", args.host, args.port))?;
    debug!("connected to {}:{}", args.host, args.port);

    let printer = Printer {
        fields: args.fields,
    };

    match &args.command {
        Commands::Info => cmd_info(&session),
        Commands::Register { source } => {
            let reg = session.register(source)?;
            cmd_register(source, &reg);
        }
        Commands::Next { source, n } => {
            let reg = session.register(source)?;
            for taken in 0..*n {
                match session.get_next(reg.handle) {
                    Ok(row) => printer.print(&reg, &row),
                    Err(e) if e.is_exhausted() && taken > 0 => {
                        debug!("{} exhausted after {} rows", source, taken);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Commands::Keyed {
            source,
            group,
            random,
        } => {
            let reg = session.register(source)?;
            let row = if *random {
                session.get_random_keyed(reg.handle, group)?
            } else {
                session.get_keyed(reg.handle, group)?
            };
            printer.print(&reg, &row);
        }
        Commands::Seq { source, tag } => {
            let reg = session.register(source)?;
            let value = session.get_keyed_sequence(reg.handle, tag)?;
            printer.print(&reg, &value);
        }
        Commands::Hash { source, key } => {
            let reg = session.register(source)?;
            let row = session.get_hashed(reg.handle, key)?;
            printer.print(&reg, &row);
        }
        Commands::Index { source, index } => {
            let reg = session.register(source)?;
            let row = session.get_indexed(reg.handle, *index)?;
            printer.print(&reg, &row);
        }
        Commands::Store { source, rows } => {
            let reg = session.register(source)?;
            for row in rows {
                session.store(reg.handle, row)?;
            }
            println!("stored {} row(s) in {}", rows.len(), source);
        }
        Commands::StoreKeyed {
            source,
            group,
            rows,
        } => {
            let reg = session.register(source)?;
            for row in rows {
                session.store_keyed(reg.handle, group, row)?;
            }
            println!("stored {} row(s) in {}[{}]", rows.len(), source, group);
        }
    }

    session.close()?;
    Ok(())
}

fn cmd_info(session: &Session) {
    let Some(info) = session.server_info() else {
        println!("(server sent no description)");
        return;
    };

    println!("Service:     {}", info.service);
    println!("Version:     {}", info.version);
    println!("Environment: {}", info.environment);
    println!("Sources:     {}", info.sources.len());
    for (handle, name) in info.sources.iter().enumerate() {
        println!("  {:>3}  {}", handle, name);
    }
}

fn cmd_register(source: &str, reg: &Registration) {
    println!("Source:    {}", source);
    println!("Handle:    {}", reg.handle);
    if let Some(attrs) = &reg.attributes {
        println!("Type:      {}", attrs.kind);
        println!("Delimiter: {:?}", attrs.delimiter);
        println!("Size:      {}", attrs.size);
    }
}

struct Printer {
    fields: bool,
}

impl Printer {
    fn print(&self, reg: &Registration, row: &Record) {
        if self.fields {
            println!("{}", row.fields(reg.delimiter()).join("\t"));
        } else {
            println!("{}", row);
        }
    }
}
