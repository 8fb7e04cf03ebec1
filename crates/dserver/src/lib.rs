// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dserver - test-data server.
//!
//! Loads named data sources from `<data_dir>/<environment>/<name>.dat` and
//! hands their rows out over TCP so that concurrent test clients never see
//! the same row twice. Unconsumed rows are written back on shutdown.
//!
//! # Embedding
//!
//! ```no_run
//! use dserver::{DataServer, ServerConfig, SourceRegistry};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let data_dir = Path::new("DATA");
//! let (config, _) = ServerConfig::discover(data_dir, None)?;
//! let registry = SourceRegistry::load(&config, data_dir)?;
//! let server = DataServer::new(config, registry)?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pidfile;
pub mod registry;
pub mod server;
pub mod source;

pub use config::{ConfigError, ServerConfig, ServerSettings, SourceDefinition};
pub use pidfile::{PidFile, PidFileError};
pub use registry::SourceRegistry;
pub use server::{DataServer, ServerError};
pub use source::{DataSource, SourceError};
