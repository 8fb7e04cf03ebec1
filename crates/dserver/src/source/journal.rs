// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Audit journals for handed-out and stored data.
//!
//! Every row a client receives is appended to `tmp/<name>.used`, every row a
//! client stores to `tmp/<name>.stored`. Each line is prefixed with a local
//! `%Y%m%d%H%M%S` timestamp.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Timestamp format shared by journals and backups.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Current local time as a compact timestamp.
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Append-only used/stored journal pair for one source.
#[derive(Debug)]
pub struct Journal {
    used: File,
    stored: File,
}

impl Journal {
    /// Open (creating if needed) both journal files in append mode.
    pub fn open(used: &Path, stored: &Path) -> io::Result<Self> {
        Ok(Self {
            used: append(used)?,
            stored: append(stored)?,
        })
    }

    /// Record a value handed out to a client.
    pub fn record_used(&mut self, key: Option<&str>, reply: &str) {
        if let Err(e) = write_entry(&mut self.used, key, reply) {
            tracing::warn!("Failed to write used journal: {}", e);
        }
    }

    /// Record a value stored by a client.
    pub fn record_stored(&mut self, key: Option<&str>, data: &str) {
        if let Err(e) = write_entry(&mut self.stored, key, data) {
            tracing::warn!("Failed to write stored journal: {}", e);
        }
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn write_entry(file: &mut File, key: Option<&str>, value: &str) -> io::Result<()> {
    let line = match key {
        Some(key) => format!("{} - {}::{}\n", timestamp(), key, value),
        None => format!("{} - {}\n", timestamp(), value),
    };
    file.write_all(line.as_bytes())?;
    file.flush()
}
