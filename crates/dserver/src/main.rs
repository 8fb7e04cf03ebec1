// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dserver - test-data server
//!
//! # Usage
//!
//! ```bash
//! # Serve the sources configured in $DSERVER_DIR (or ./DATA)
//! dserver
//!
//! # Explicit data directory and port
//! dserver -w /srv/testdata -p 9580
//!
//! # Is a server running? Stop it and wait for the flush.
//! dserver --check
//! dserver --terminate --wait
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use dserver::config::DATA_DIR_ENV;
use dserver::pidfile::{self, PidFile};
use dserver::{DataServer, ServerConfig, SourceRegistry};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name inside the data directory.
const LOG_FILE: &str = "dserver.log";

/// Fallback data directory when neither `-w` nor `$DSERVER_DIR` is set.
const DEFAULT_DATA_DIR: &str = "./DATA";

/// dserver - hands out unique test data rows over TCP
#[derive(Parser, Debug)]
#[command(name = "dserver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory (default: $DSERVER_DIR, then ./DATA)
    #[arg(short = 'w', long)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: dserver.toml, then dserver.ini in the data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Report whether a server is running and exit (status 0 either way)
    #[arg(short = 'C', long, conflicts_with = "terminate")]
    check: bool,

    /// Stop the running server and exit
    #[arg(short = 'T', long)]
    terminate: bool,

    /// Process to terminate (default: the pid file)
    #[arg(long, requires = "terminate")]
    pid: Option<i32>,

    /// With --terminate, wait up to SECS for the server to exit
    #[arg(
        short = 'W',
        long,
        value_name = "SECS",
        num_args = 0..=1,
        default_missing_value = "30",
        requires = "terminate"
    )]
    wait: Option<u64>,

    /// Increase verbosity (-d debug, -dd trace)
    #[arg(short = 'd', action = clap::ArgAction::Count)]
    debug: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not write dserver.log in the data directory
    #[arg(long)]
    no_log_file: bool,
}

impl Args {
    fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    fn level(&self) -> &str {
        match self.debug {
            0 => self.log_level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_logging(args: &Args, data_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = if args.no_log_file {
        None
    } else {
        let path = data_dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("cannot install log subscriber")?;
    Ok(())
}

/// Status line for `--check`. Not running is a normal answer, not an error.
fn check(pidfile: &PidFile) -> Result<String> {
    Ok(match pidfile.check_running()? {
        Some(pid) => format!("dserver is running (pid {})", pid),
        None => "Server not running".to_string(),
    })
}

fn terminate(pidfile: &PidFile, pid: Option<i32>, wait: Option<u64>) -> Result<()> {
    let pid = match pid {
        Some(pid) => pid,
        None => pidfile
            .read()?
            .ok_or_else(|| pidfile::PidFileError::NotRunning(pidfile.path().to_path_buf()))?,
    };

    pidfile::terminate(pid, wait.map(Duration::from_secs))?;
    match wait {
        Some(_) => println!("dserver (pid {}) stopped", pid),
        None => println!("sent SIGTERM to pid {}", pid),
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.ok();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let data_dir = args.data_dir();
    let pidfile = PidFile::in_dir(&data_dir);

    if args.check {
        println!("{}", check(&pidfile)?);
        return Ok(());
    }
    if args.terminate {
        return terminate(&pidfile, args.pid, args.wait);
    }

    if !data_dir.is_dir() {
        bail!("data directory {} does not exist", data_dir.display());
    }

    init_logging(&args, &data_dir)?;

    let (mut config, config_path) = ServerConfig::discover(&data_dir, args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("+----------------------------------------------------+");
    info!(
        "|       dserver v{}                                |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Bind:    {:40} |", config.listen_addr());
    info!("|  Data:    {:40} |", data_dir.display());
    info!("|  Config:  {:40} |", config_path.display());
    info!("|  Env:     {:40} |", config.server.environment);
    info!("|  Sources: {:40} |", config.sources.len());
    info!("+----------------------------------------------------+");

    let registry = SourceRegistry::load(&config, &data_dir).context("failed to load sources")?;

    pidfile.create()?;

    let server = match DataServer::new(config, registry) {
        Ok(server) => server,
        Err(e) => {
            pidfile.remove();
            return Err(e.into());
        }
    };

    let server_handle = server.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, stopping server...");
        server_handle.shutdown();
    });

    let result = server.run().await;
    pidfile.remove();
    result?;

    info!("dserver stopped");
    Ok(())
}
