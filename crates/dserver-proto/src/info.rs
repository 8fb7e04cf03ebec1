// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metadata exchanged with Rust clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a data source stores and hands out its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Rows handed out once each, in file order.
    #[serde(rename = "CSV", alias = "Csv")]
    Csv,
    /// Persistent increasing integer.
    Sequence,
    /// Independent increasing integer per tag.
    KeyedSequence,
    /// Read-only key/value lookup.
    Hashed,
    /// Read-only random access by row number.
    Indexed,
    /// Named groups of rows, each handed out once.
    Keyed,
    /// Integer counter that restarts at 0 on every server run.
    Indexer,
    /// Fixed integer for a run, bumped on disk at shutdown.
    Counter,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Sequence => "Sequence",
            Self::KeyedSequence => "KeyedSequence",
            Self::Hashed => "Hashed",
            Self::Indexed => "Indexed",
            Self::Keyed => "Keyed",
            Self::Indexer => "Indexer",
            Self::Counter => "Counter",
        }
    }

    /// Whether the kind is backed by a `.dat` file.
    pub fn has_file(self) -> bool {
        !matches!(self, Self::Indexer)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = UnknownSourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CSV" | "Csv" => Ok(Self::Csv),
            "Sequence" => Ok(Self::Sequence),
            "KeyedSequence" => Ok(Self::KeyedSequence),
            "Hashed" => Ok(Self::Hashed),
            "Indexed" => Ok(Self::Indexed),
            "Keyed" => Ok(Self::Keyed),
            "Indexer" => Ok(Self::Indexer),
            "Counter" => Ok(Self::Counter),
            other => Err(UnknownSourceKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source type: {0:?}")]
pub struct UnknownSourceKind(pub String);

/// Attributes of a registered source (reply to `REG` for Rust clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttributes {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub delimiter: String,
    /// Rows, groups or keys at load time (1 for counters).
    pub size: usize,
}

/// Server description (reply to `INIT` for Rust clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub service: String,
    pub version: String,
    pub environment: String,
    /// Source names in handle order.
    #[serde(default)]
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("CSV".parse::<SourceKind>().unwrap(), SourceKind::Csv);
        assert_eq!(
            " KeyedSequence ".parse::<SourceKind>().unwrap(),
            SourceKind::KeyedSequence
        );
        assert!("Barcodes".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_attributes_json_uses_type_key() {
        let attrs = SourceAttributes {
            kind: SourceKind::Csv,
            delimiter: ",".into(),
            size: 12,
        };
        let json = serde_json::to_string(&attrs).unwrap();
        assert!(json.contains("\"type\":\"CSV\""));

        let parsed: SourceAttributes = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, attrs);
    }

    #[test]
    fn test_indexer_has_no_file() {
        assert!(!SourceKind::Indexer.has_file());
        assert!(SourceKind::Counter.has_file());
    }
}
