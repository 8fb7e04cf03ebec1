// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writing sources back to disk at shutdown.

use super::journal::timestamp;
use super::{DataSource, SourceData, SourceError};
use dserver_proto::SourceKind;
use std::fmt::Write as _;
use std::path::PathBuf;

/// What a flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The kind is never written back.
    Skipped,
    /// The data file was rewritten, optionally after a backup copy.
    Written { backup: Option<PathBuf> },
}

impl DataSource {
    /// Render the on-disk representation of the current state.
    ///
    /// `None` for kinds that are never written back.
    pub fn render(&self) -> Option<String> {
        let mut out = String::new();
        for comment in &self.comments {
            let _ = writeln!(out, "{}", comment);
        }

        match (&self.kind, &self.data) {
            (SourceKind::Csv, SourceData::Rows { rows, cursor }) => {
                for row in rows.iter().skip(*cursor) {
                    let _ = writeln!(out, "{}", row);
                }
            }
            (SourceKind::Sequence, SourceData::Value(next)) => {
                let _ = writeln!(out, "{}", next);
            }
            (SourceKind::Counter, SourceData::Value(value)) => {
                let _ = writeln!(out, "{}", value + 1);
            }
            (SourceKind::KeyedSequence, SourceData::Tagged(tags)) => {
                for (tag, next) in tags {
                    let _ = writeln!(out, "{}{}{}", tag, self.tag_delimiter, next);
                }
            }
            (SourceKind::Keyed, SourceData::Groups(groups)) => {
                for (name, group) in groups {
                    let _ = writeln!(out, "[{}]", name);
                    for comment in &group.comments {
                        let _ = writeln!(out, "{}", comment);
                    }
                    for row in group.rows.iter().skip(group.cursor) {
                        let _ = writeln!(out, "{}", row);
                    }
                    out.push('\n');
                }
            }
            _ => return None,
        }

        Some(out)
    }

    /// Write the source back to its data file.
    ///
    /// Every kind except `Counter` copies the previous file to
    /// `tmp/<timestamp>_<name>.bak` first.
    pub fn flush(&self) -> Result<FlushOutcome, SourceError> {
        let Some(content) = self.render() else {
            return Ok(FlushOutcome::Skipped);
        };

        let backup = if self.kind != SourceKind::Counter && self.paths.data.exists() {
            let backup = self
                .paths
                .tmp_dir
                .join(format!("{}_{}.bak", timestamp(), self.name));
            std::fs::copy(&self.paths.data, &backup)
                .map_err(|e| SourceError::io(&backup, e))?;
            Some(backup)
        } else {
            None
        };

        std::fs::write(&self.paths.data, content)
            .map_err(|e| SourceError::io(&self.paths.data, e))?;

        tracing::debug!("Flushed {} to {}", self.name, self.paths.data.display());
        Ok(FlushOutcome::Written { backup })
    }
}
