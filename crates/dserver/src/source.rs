// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data sources.
//!
//! A [`DataSource`] owns the in-memory state loaded from `<name>.dat`, the
//! journals under `tmp/`, and the kind-specific operations the protocol
//! exposes. Callers serialise access (see [`crate::registry`]).

pub mod flush;
pub mod journal;
pub mod load;

use dserver_proto::{SourceAttributes, SourceKind, Status};
use journal::Journal;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::SourceDefinition;

/// Name of the journal and backup directory inside an environment.
pub const TMP_DIR: &str = "tmp";

/// Source loading and flushing errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl SourceError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Kind-specific state.
#[derive(Debug)]
pub enum SourceData {
    /// `CSV` and `Indexed`.
    Rows { rows: Vec<String>, cursor: usize },
    /// `Sequence`, `Counter` and `Indexer`.
    Value(i64),
    /// `KeyedSequence`.
    Tagged(BTreeMap<String, i64>),
    /// `Hashed`.
    Hashed(HashMap<String, String>),
    /// `Keyed`.
    Groups(BTreeMap<String, Group>),
}

/// One `[group]` of a keyed source.
#[derive(Debug, Default)]
pub struct Group {
    pub rows: Vec<String>,
    pub comments: Vec<String>,
    pub cursor: usize,
}

/// On-disk locations for one source.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub data: PathBuf,
    pub tmp_dir: PathBuf,
    pub used: PathBuf,
    pub stored: PathBuf,
}

impl SourcePaths {
    fn new(env_dir: &Path, name: &str) -> Self {
        let tmp_dir = env_dir.join(TMP_DIR);
        Self {
            data: env_dir.join(format!("{}.dat", name)),
            used: tmp_dir.join(format!("{}.used", name)),
            stored: tmp_dir.join(format!("{}.stored", name)),
            tmp_dir,
        }
    }
}

/// A loaded data source.
#[derive(Debug)]
pub struct DataSource {
    pub name: String,
    pub kind: SourceKind,
    pub delimiter: String,
    pub tag_delimiter: String,
    pub paths: SourcePaths,
    comments: Vec<String>,
    data: SourceData,
    size: usize,
    journal: Journal,
}

impl DataSource {
    /// Load a source from `<env_dir>/<name>.dat` and open its journals.
    pub fn load(def: &SourceDefinition, env_dir: &Path) -> Result<Self, SourceError> {
        let paths = SourcePaths::new(env_dir, &def.name);
        std::fs::create_dir_all(&paths.tmp_dir).map_err(|e| SourceError::io(&paths.tmp_dir, e))?;

        let content = if def.kind.has_file() {
            std::fs::read_to_string(&paths.data).map_err(|e| SourceError::io(&paths.data, e))?
        } else {
            String::new()
        };

        let parsed = load::parse(def.kind, &content, &def.tag_delimiter).map_err(|e| {
            SourceError::Parse {
                path: paths.data.clone(),
                line: e.line,
                reason: e.reason,
            }
        })?;

        let journal =
            Journal::open(&paths.used, &paths.stored).map_err(|e| SourceError::io(&paths.used, e))?;

        let size = match &parsed.data {
            SourceData::Rows { rows, .. } => rows.len(),
            SourceData::Value(_) => 1,
            SourceData::Tagged(tags) => tags.len(),
            SourceData::Hashed(map) => map.len(),
            SourceData::Groups(groups) => groups.len(),
        };

        Ok(Self {
            name: def.name.clone(),
            kind: def.kind,
            delimiter: def.delimiter.clone(),
            tag_delimiter: def.tag_delimiter.clone(),
            paths,
            comments: parsed.comments,
            data: parsed.data,
            size,
            journal,
        })
    }

    /// Attributes reported at registration.
    pub fn attributes(&self) -> SourceAttributes {
        SourceAttributes {
            kind: self.kind,
            delimiter: self.delimiter.clone(),
            size: self.size,
        }
    }

    /// `GETN`: next row or value.
    pub fn next(&mut self) -> Result<String, Status> {
        let result = match (self.kind, &mut self.data) {
            (SourceKind::Csv, SourceData::Rows { rows, cursor }) => match rows.get(*cursor) {
                Some(row) => {
                    *cursor += 1;
                    Ok(row.clone())
                }
                None => Err(Status::Exhausted),
            },
            (SourceKind::Sequence | SourceKind::Indexer, SourceData::Value(value)) => {
                let current = *value;
                *value += 1;
                Ok(current.to_string())
            }
            (SourceKind::Counter, SourceData::Value(value)) => Ok(value.to_string()),
            _ => Err(Status::UnknownSourceType),
        };
        self.used(None, result)
    }

    /// `GETK`: next row of a group.
    pub fn next_in_group(&mut self, group: &str) -> Result<String, Status> {
        let result = match &mut self.data {
            SourceData::Groups(groups) => match groups.get_mut(group) {
                Some(g) => match g.rows.get(g.cursor) {
                    Some(row) => {
                        g.cursor += 1;
                        Ok(row.clone())
                    }
                    None => Err(Status::GroupExhausted),
                },
                None => Err(Status::InvalidGroup),
            },
            _ => Err(Status::UnknownSourceType),
        };
        self.used(Some(group), result)
    }

    /// `GETKR`: random row of a group, cursor untouched.
    pub fn random_in_group(&mut self, group: &str) -> Result<String, Status> {
        let result = match &self.data {
            SourceData::Groups(groups) => match groups.get(group) {
                Some(g) if g.rows.is_empty() => Err(Status::Exhausted),
                Some(g) => Ok(g.rows[fastrand::usize(..g.rows.len())].clone()),
                None => Err(Status::InvalidGroup),
            },
            _ => Err(Status::UnknownSourceType),
        };
        self.used(Some(group), result)
    }

    /// `GETKS`: next value of a tag.
    pub fn next_in_sequence(&mut self, tag: &str) -> Result<String, Status> {
        let result = match &mut self.data {
            SourceData::Tagged(tags) => match tags.get_mut(tag) {
                Some(value) => {
                    let current = *value;
                    *value += 1;
                    Ok(current.to_string())
                }
                None => Err(Status::InvalidGroup),
            },
            _ => Err(Status::UnknownSourceType),
        };
        self.used(Some(tag), result)
    }

    /// `GETH`: value for a key.
    pub fn lookup(&mut self, key: &str) -> Result<String, Status> {
        let result = match &self.data {
            SourceData::Hashed(map) => map.get(key).cloned().ok_or(Status::UndefinedHash),
            _ => Err(Status::UnknownSourceType),
        };
        self.used(Some(key), result)
    }

    /// `GETI`: row by 0-based index.
    pub fn at_index(&mut self, index: &str) -> Result<String, Status> {
        let result = match (self.kind, &self.data) {
            (SourceKind::Indexed, SourceData::Rows { rows, .. }) => index
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| rows.get(i))
                .cloned()
                .ok_or(Status::InvalidIndex),
            _ => Err(Status::UnknownSourceType),
        };
        self.used(Some(index), result)
    }

    /// `STOC`: append a row.
    pub fn append(&mut self, data: &str) -> Result<(), Status> {
        match (self.kind, &mut self.data) {
            (SourceKind::Csv | SourceKind::Indexed, SourceData::Rows { rows, .. }) => {
                rows.push(data.to_string());
            }
            _ => return Err(Status::UnknownSourceType),
        }
        self.journal.record_stored(None, data);
        Ok(())
    }

    /// `STOK`: append a row to a group, creating the group if needed.
    pub fn append_to_group(&mut self, group: &str, data: &str) -> Result<(), Status> {
        match &mut self.data {
            SourceData::Groups(groups) => {
                groups
                    .entry(group.to_string())
                    .or_default()
                    .rows
                    .push(data.to_string());
            }
            _ => return Err(Status::UnknownSourceType),
        }
        self.journal.record_stored(Some(group), data);
        Ok(())
    }

    fn used(&mut self, key: Option<&str>, result: Result<String, Status>) -> Result<String, Status> {
        match &result {
            Ok(value) => self.journal.record_used(key, value),
            Err(status) => self.journal.record_used(key, status.as_str()),
        }
        result
    }
}
