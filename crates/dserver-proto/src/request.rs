// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request grammar.
//!
//! ```text
//! INIT|<client>            REG|<name>            REGK|<name>|<key>
//! REGI|<name>              GETN|<hdl>            GETK|<hdl>|<group>
//! GETKR|<hdl>|<group>      GETKS|<hdl>|<tag>     GETH|<hdl>|<key>
//! GETI|<hdl>|<index>       STOC|<hdl>|<data>     STOK|<hdl>|<group>|<data>
//! ```
//!
//! The last field of `STOC` and `STOK` runs to the end of the line; every
//! other command must have exactly its field count.

use crate::status::Status;
use crate::FIELD_SEPARATOR;
use std::fmt;
use thiserror::Error;

/// Client flavour announced in `INIT`.
///
/// C clients get bare replies; Rust clients also receive JSON metadata with
/// `INIT` and `REG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientKind {
    #[default]
    C,
    Rust,
}

impl ClientKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Rust => "Rust",
        }
    }

    /// Anything other than `Rust` is treated as a plain C client.
    pub fn from_token(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("rust") {
            Self::Rust
        } else {
            Self::C
        }
    }
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Init { client: ClientKind },
    Register { name: String },
    RegisterKeyed { name: String, key: String },
    RegisterIndexed { name: String },
    GetNext { handle: usize },
    GetKeyed { handle: usize, group: String },
    GetRandomKeyed { handle: usize, group: String },
    GetKeyedSequence { handle: usize, tag: String },
    GetHashed { handle: usize, key: String },
    GetIndexed { handle: usize, index: String },
    Store { handle: usize, data: String },
    StoreKeyed { handle: usize, group: String, data: String },
}

impl Request {
    /// Parse one request line (without its line terminator).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let command = line.split(FIELD_SEPARATOR).next().unwrap_or_default();

        let req = match command {
            "INIT" => {
                let f = exact(line, 2)?;
                Self::Init {
                    client: ClientKind::from_token(f[1]),
                }
            }
            "REG" => {
                let f = exact(line, 2)?;
                Self::Register {
                    name: f[1].trim().to_string(),
                }
            }
            "REGK" => {
                let f = exact(line, 3)?;
                Self::RegisterKeyed {
                    name: f[1].trim().to_string(),
                    key: f[2].to_string(),
                }
            }
            "REGI" => {
                let f = exact(line, 2)?;
                Self::RegisterIndexed {
                    name: f[1].trim().to_string(),
                }
            }
            "GETN" => {
                let f = exact(line, 2)?;
                Self::GetNext {
                    handle: handle(f[1])?,
                }
            }
            "GETK" => {
                let f = exact(line, 3)?;
                Self::GetKeyed {
                    handle: handle(f[1])?,
                    group: f[2].to_string(),
                }
            }
            "GETKR" => {
                let f = exact(line, 3)?;
                Self::GetRandomKeyed {
                    handle: handle(f[1])?,
                    group: f[2].to_string(),
                }
            }
            "GETKS" => {
                let f = exact(line, 3)?;
                Self::GetKeyedSequence {
                    handle: handle(f[1])?,
                    tag: f[2].to_string(),
                }
            }
            "GETH" => {
                let f = exact(line, 3)?;
                Self::GetHashed {
                    handle: handle(f[1])?,
                    key: f[2].to_string(),
                }
            }
            "GETI" => {
                let f = exact(line, 3)?;
                Self::GetIndexed {
                    handle: handle(f[1])?,
                    index: f[2].to_string(),
                }
            }
            "STOC" => {
                let f = leading(line, 3)?;
                Self::Store {
                    handle: handle(f[1])?,
                    data: f[2].to_string(),
                }
            }
            "STOK" => {
                let f = leading(line, 4)?;
                Self::StoreKeyed {
                    handle: handle(f[1])?,
                    group: f[2].to_string(),
                    data: f[3].to_string(),
                }
            }
            "" => return Err(ProtocolError::BadMessage(line.to_string())),
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        Ok(req)
    }

    /// Command word on the wire.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Init { .. } => "INIT",
            Self::Register { .. } => "REG",
            Self::RegisterKeyed { .. } => "REGK",
            Self::RegisterIndexed { .. } => "REGI",
            Self::GetNext { .. } => "GETN",
            Self::GetKeyed { .. } => "GETK",
            Self::GetRandomKeyed { .. } => "GETKR",
            Self::GetKeyedSequence { .. } => "GETKS",
            Self::GetHashed { .. } => "GETH",
            Self::GetIndexed { .. } => "GETI",
            Self::Store { .. } => "STOC",
            Self::StoreKeyed { .. } => "STOK",
        }
    }

    /// Source handle targeted by the request, if any.
    pub fn handle(&self) -> Option<usize> {
        match self {
            Self::GetNext { handle }
            | Self::GetKeyed { handle, .. }
            | Self::GetRandomKeyed { handle, .. }
            | Self::GetKeyedSequence { handle, .. }
            | Self::GetHashed { handle, .. }
            | Self::GetIndexed { handle, .. }
            | Self::Store { handle, .. }
            | Self::StoreKeyed { handle, .. } => Some(*handle),
            _ => None,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = self.command();
        match self {
            Self::Init { client } => write!(f, "{cmd}|{}", client.as_str()),
            Self::Register { name } | Self::RegisterIndexed { name } => write!(f, "{cmd}|{name}"),
            Self::RegisterKeyed { name, key } => write!(f, "{cmd}|{name}|{key}"),
            Self::GetNext { handle } => write!(f, "{cmd}|{handle}"),
            Self::GetKeyed { handle, group } | Self::GetRandomKeyed { handle, group } => {
                write!(f, "{cmd}|{handle}|{group}")
            }
            Self::GetKeyedSequence { handle, tag } => write!(f, "{cmd}|{handle}|{tag}"),
            Self::GetHashed { handle, key } => write!(f, "{cmd}|{handle}|{key}"),
            Self::GetIndexed { handle, index } => write!(f, "{cmd}|{handle}|{index}"),
            Self::Store { handle, data } => write!(f, "{cmd}|{handle}|{data}"),
            Self::StoreKeyed {
                handle,
                group,
                data,
            } => write!(f, "{cmd}|{handle}|{group}|{data}"),
        }
    }
}

fn exact(line: &str, count: usize) -> Result<Vec<&str>, ProtocolError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != count {
        return Err(ProtocolError::BadMessage(line.to_string()));
    }
    Ok(fields)
}

fn leading(line: &str, count: usize) -> Result<Vec<&str>, ProtocolError> {
    let fields: Vec<&str> = line.splitn(count, FIELD_SEPARATOR).collect();
    if fields.len() != count {
        return Err(ProtocolError::BadMessage(line.to_string()));
    }
    Ok(fields)
}

fn handle(field: &str) -> Result<usize, ProtocolError> {
    field
        .trim()
        .parse::<usize>()
        .map_err(|_| ProtocolError::BadHandle(field.to_string()))
}

/// Reasons a request line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("bad message: {0:?}")]
    BadMessage(String),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("bad source handle: {0:?}")]
    BadHandle(String),
}

impl ProtocolError {
    /// Sentinel the server replies with.
    pub fn status(&self) -> Status {
        match self {
            Self::BadMessage(_) => Status::BadMessage,
            Self::UnknownCommand(_) => Status::UnknownCommand,
            Self::BadHandle(_) => Status::BadSourceIndex,
        }
    }
}
