// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Legacy `dserver.ini` reader.
//!
//! ```text
//! [Config]
//! Port=9572
//! Environment=SVT
//!
//! [Data]
//! Description=Address:CSV:{'delimiter': '|'}
//! Description=Serial:KeyedSequence:{'tag_delimiter': '='}
//! ```
//!
//! Any line containing `#` is ignored. Section headers are informational.

use super::{ConfigError, ServerConfig, SourceDefinition};
use std::collections::HashMap;

const DELIMITER: &str = "delimiter";
const TAG_DELIMITER: &str = "tag_delimiter";

/// Parse the contents of a legacy INI file.
pub fn parse(content: &str) -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.contains('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        match key.trim() {
            "Port" => {
                config.server.port = value.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("line {}: bad port '{}'", lineno + 1, value))
                })?;
            }
            "Environment" => {
                config.server.environment = value.trim().to_string();
            }
            "Description" => {
                config.sources.push(description(value, lineno + 1)?);
            }
            _ => {}
        }
    }

    Ok(config)
}

fn description(value: &str, lineno: usize) -> Result<SourceDefinition, ConfigError> {
    let mut parts = value.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let kind = parts.next().ok_or_else(|| {
        ConfigError::Invalid(format!("line {}: Description needs name:Type", lineno))
    })?;
    let attrs = parse_attributes(parts.next().unwrap_or_default());

    let kind = kind
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("line {}: {}", lineno, e)))?;

    let mut source = SourceDefinition::new(name, kind);
    if let Some(delimiter) = attrs.get(DELIMITER) {
        source.delimiter = delimiter.clone();
    }
    if let Some(tag_delimiter) = attrs.get(TAG_DELIMITER) {
        source.tag_delimiter = tag_delimiter.clone();
    }
    Ok(source)
}

/// Parse a `{'key': 'value', ...}` attribute literal.
///
/// Anything that is not of that shape yields no attributes.
pub fn parse_attributes(literal: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();

    let literal = literal.trim();
    let Some(body) = literal
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return attrs;
    };

    let mut rest = body.trim();
    while !rest.is_empty() {
        let Some((key, after_key)) = quoted(rest) else {
            return HashMap::new();
        };
        let Some(after_colon) = after_key.trim_start().strip_prefix(':') else {
            return HashMap::new();
        };
        let Some((value, after_value)) = quoted(after_colon.trim_start()) else {
            return HashMap::new();
        };
        attrs.insert(key.to_string(), value.to_string());

        rest = after_value.trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    attrs
}

/// Split a leading `'...'` or `"..."` token off `s`.
fn quoted(s: &str) -> Option<(&str, &str)> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &s[1..];
    let end = body.find(quote)?;
    Some((&body[..end], &body[end + 1..]))
}
