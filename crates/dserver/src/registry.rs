// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Source registry.
//!
//! Holds every configured [`DataSource`] at the position it was declared in,
//! which is also its registration handle. Each source sits behind its own
//! lock so requests on different sources never contend.

use crate::config::ServerConfig;
use crate::source::flush::FlushOutcome;
use crate::source::{DataSource, SourceError};
use dserver_proto::{ServerInfo, SourceAttributes, Status, SERVICE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info};

/// All loaded sources, indexed by handle.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: Vec<Mutex<DataSource>>,
    names: HashMap<String, usize>,
    environment: String,
}

impl SourceRegistry {
    /// Load every configured source from `<data_dir>/<environment>/`.
    ///
    /// Fails on the first source that cannot be loaded.
    pub fn load(config: &ServerConfig, data_dir: &Path) -> Result<Self, SourceError> {
        let env_dir = config.environment_dir(data_dir);
        let mut sources = Vec::with_capacity(config.sources.len());
        let mut names = HashMap::with_capacity(config.sources.len());

        for (handle, def) in config.sources.iter().enumerate() {
            let source = DataSource::load(def, &env_dir)?;
            info!(
                "Loaded source {} [{}] as handle {} ({} entries)",
                source.name,
                source.kind,
                handle,
                source.attributes().size
            );
            names.insert(def.name.clone(), handle);
            sources.push(Mutex::new(source));
        }

        Ok(Self {
            sources,
            names,
            environment: config.server.environment.clone(),
        })
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Handle of a source by name.
    pub fn handle_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Registration attributes of a source.
    pub fn attributes(&self, handle: usize) -> Option<SourceAttributes> {
        self.sources.get(handle).map(|s| s.lock().attributes())
    }

    /// Description returned to Rust clients at `INIT`.
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            service: SERVICE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.environment.clone(),
            sources: self.sources.iter().map(|s| s.lock().name.clone()).collect(),
        }
    }

    fn with<T>(
        &self,
        handle: usize,
        op: impl FnOnce(&mut DataSource) -> Result<T, Status>,
    ) -> Result<T, Status> {
        let source = self.sources.get(handle).ok_or(Status::BadSourceIndex)?;
        let mut guard = source.lock();
        op(&mut *guard)
    }

    pub fn next(&self, handle: usize) -> Result<String, Status> {
        self.with(handle, |s| s.next())
    }

    pub fn next_in_group(&self, handle: usize, group: &str) -> Result<String, Status> {
        self.with(handle, |s| s.next_in_group(group))
    }

    pub fn random_in_group(&self, handle: usize, group: &str) -> Result<String, Status> {
        self.with(handle, |s| s.random_in_group(group))
    }

    pub fn next_in_sequence(&self, handle: usize, tag: &str) -> Result<String, Status> {
        self.with(handle, |s| s.next_in_sequence(tag))
    }

    pub fn lookup(&self, handle: usize, key: &str) -> Result<String, Status> {
        self.with(handle, |s| s.lookup(key))
    }

    pub fn at_index(&self, handle: usize, index: &str) -> Result<String, Status> {
        self.with(handle, |s| s.at_index(index))
    }

    pub fn append(&self, handle: usize, data: &str) -> Result<(), Status> {
        self.with(handle, |s| s.append(data))
    }

    pub fn append_to_group(&self, handle: usize, group: &str, data: &str) -> Result<(), Status> {
        self.with(handle, |s| s.append_to_group(group, data))
    }

    /// Write every source back to disk.
    ///
    /// A failing source is logged and skipped. Returns the number of
    /// sources that failed.
    pub fn flush_all(&self) -> usize {
        let mut failures = 0;
        for source in &self.sources {
            let source = source.lock();
            match source.flush() {
                Ok(FlushOutcome::Written { backup }) => {
                    info!("Saved {}", source.name);
                    if let Some(backup) = backup {
                        debug!("  backup: {}", backup.display());
                    }
                }
                Ok(FlushOutcome::Skipped) => {
                    debug!("Nothing to save for {} [{}]", source.name, source.kind);
                }
                Err(e) => {
                    error!("Failed to save {}: {}", source.name, e);
                    failures += 1;
                }
            }
        }
        failures
    }
}
