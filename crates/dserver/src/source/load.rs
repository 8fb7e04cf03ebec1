// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `.dat` file parsing.

use super::{Group, SourceData};
use dserver_proto::SourceKind;
use std::collections::{BTreeMap, HashMap};

/// Result of parsing one data file.
#[derive(Debug)]
pub struct Parsed {
    pub data: SourceData,
    /// Source-level comment lines, in file order.
    pub comments: Vec<String>,
}

/// A data file line that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number (0 when the error concerns the whole file).
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn at(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// Trimmed, non-blank lines with their 1-based line numbers.
fn lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// Parse file content for a source of the given kind.
pub fn parse(kind: SourceKind, content: &str, tag_delimiter: &str) -> Result<Parsed, ParseError> {
    match kind {
        SourceKind::Csv => Ok(rows(content)),
        SourceKind::Indexed => {
            let parsed = rows(content);
            match &parsed.data {
                SourceData::Rows { rows, .. } if rows.is_empty() => {
                    Err(ParseError::at(0, "indexed source has no rows"))
                }
                _ => Ok(parsed),
            }
        }
        SourceKind::Sequence | SourceKind::Counter => Ok(value(content)),
        SourceKind::Indexer => Ok(Parsed {
            data: SourceData::Value(0),
            comments: Vec::new(),
        }),
        SourceKind::KeyedSequence => tagged(content, tag_delimiter),
        SourceKind::Hashed => hashed(content, tag_delimiter),
        SourceKind::Keyed => groups(content),
    }
}

fn rows(content: &str) -> Parsed {
    let mut comments = Vec::new();
    let mut rows = Vec::new();
    for (_, line) in lines(content) {
        if is_comment(line) {
            comments.push(line.to_string());
        } else {
            rows.push(line.to_string());
        }
    }
    Parsed {
        data: SourceData::Rows { rows, cursor: 0 },
        comments,
    }
}

fn value(content: &str) -> Parsed {
    let mut comments = Vec::new();
    let mut current = 0;
    for (_, line) in lines(content) {
        if is_comment(line) {
            comments.push(line.to_string());
        } else {
            current = line.parse().unwrap_or(0);
        }
    }
    Parsed {
        data: SourceData::Value(current),
        comments,
    }
}

fn split_tag<'a>(
    line: &'a str,
    lineno: usize,
    tag_delimiter: &str,
) -> Result<(&'a str, &'a str), ParseError> {
    line.split_once(tag_delimiter)
        .map(|(tag, rest)| (tag.trim(), rest))
        .ok_or_else(|| ParseError::at(lineno, format!("missing tag delimiter '{}'", tag_delimiter)))
}

fn tagged(content: &str, tag_delimiter: &str) -> Result<Parsed, ParseError> {
    let mut comments = Vec::new();
    let mut tags = BTreeMap::new();
    for (lineno, line) in lines(content) {
        if is_comment(line) {
            comments.push(line.to_string());
            continue;
        }
        let (tag, serial) = split_tag(line, lineno, tag_delimiter)?;
        let serial = serial
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseError::at(lineno, format!("'{}' is not an integer", serial)))?;
        tags.insert(tag.to_string(), serial);
    }
    Ok(Parsed {
        data: SourceData::Tagged(tags),
        comments,
    })
}

fn hashed(content: &str, tag_delimiter: &str) -> Result<Parsed, ParseError> {
    let mut comments = Vec::new();
    let mut map = HashMap::new();
    for (lineno, line) in lines(content) {
        if is_comment(line) {
            comments.push(line.to_string());
            continue;
        }
        let (key, value) = split_tag(line, lineno, tag_delimiter)?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(Parsed {
        data: SourceData::Hashed(map),
        comments,
    })
}

fn groups(content: &str) -> Result<Parsed, ParseError> {
    let mut comments = Vec::new();
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (lineno, line) in lines(content) {
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            groups.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let group = current.as_ref().and_then(|name| groups.get_mut(name));
        match (group, is_comment(line)) {
            (Some(group), true) => group.comments.push(line.to_string()),
            (Some(group), false) => group.rows.push(line.to_string()),
            (None, true) => comments.push(line.to_string()),
            (None, false) => {
                return Err(ParseError::at(lineno, "row before first [group] header"));
            }
        }
    }

    Ok(Parsed {
        data: SourceData::Groups(groups),
        comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_and_comments() {
        let parsed = parse(
            SourceKind::Csv,
            "# header\n  a,1  \n\nb,2\n# trailer\n",
            ":",
        )
        .unwrap();

        assert_eq!(parsed.comments, vec!["# header", "# trailer"]);
        match parsed.data {
            SourceData::Rows { rows, cursor } => {
                assert_eq!(rows, vec!["a,1", "b,2"]);
                assert_eq!(cursor, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_indexed_requires_rows() {
        let err = parse(SourceKind::Indexed, "# only a comment\n", ":").unwrap_err();
        assert_eq!(err.line, 0);
    }

    #[test]
    fn test_sequence_last_integer_wins() {
        let parsed = parse(SourceKind::Sequence, "# seq\n100\n250\n", ":").unwrap();
        assert!(matches!(parsed.data, SourceData::Value(250)));
        assert_eq!(parsed.comments.len(), 1);
    }

    #[test]
    fn test_counter_non_integer_is_zero() {
        let parsed = parse(SourceKind::Counter, "abc\n", ":").unwrap();
        assert!(matches!(parsed.data, SourceData::Value(0)));
    }

    #[test]
    fn test_indexer_ignores_content() {
        let parsed = parse(SourceKind::Indexer, "999\n", ":").unwrap();
        assert!(matches!(parsed.data, SourceData::Value(0)));
    }

    #[test]
    fn test_keyed_sequence() {
        let parsed = parse(SourceKind::KeyedSequence, "VIC : 1000\nNSW:2000\n", ":").unwrap();
        match parsed.data {
            SourceData::Tagged(tags) => {
                assert_eq!(tags.get("VIC"), Some(&1000));
                assert_eq!(tags.get("NSW"), Some(&2000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keyed_sequence_errors() {
        let err = parse(SourceKind::KeyedSequence, "VIC=1000\n", ":").unwrap_err();
        assert_eq!(err.line, 1);

        let err = parse(SourceKind::KeyedSequence, "# c\nVIC:abc\n", ":").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_hashed_custom_delimiter() {
        let parsed = parse(SourceKind::Hashed, "alice=1 Main St,Springfield\n", "=").unwrap();
        match parsed.data {
            SourceData::Hashed(map) => {
                assert_eq!(
                    map.get("alice").map(String::as_str),
                    Some("1 Main St,Springfield")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keyed_groups() {
        let parsed = parse(
            SourceKind::Keyed,
            "# top\n[VIC]\n# vic comment\nv1\nv2\n\n[NSW]\nn1\n[EMPTY]\n",
            ":",
        )
        .unwrap();

        assert_eq!(parsed.comments, vec!["# top"]);
        match parsed.data {
            SourceData::Groups(groups) => {
                assert_eq!(groups.len(), 3);
                let vic = &groups["VIC"];
                assert_eq!(vic.rows, vec!["v1", "v2"]);
                assert_eq!(vic.comments, vec!["# vic comment"]);
                assert_eq!(groups["NSW"].rows, vec!["n1"]);
                assert!(groups["EMPTY"].rows.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keyed_row_before_header() {
        let err = parse(SourceKind::Keyed, "orphan\n[VIC]\n", ":").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
