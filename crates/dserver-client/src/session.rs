// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client sessions.

use crate::{ClientError, Result};
use dserver_proto::{
    ClientKind, Request, ServerInfo, SourceAttributes, Status, FIELD_SEPARATOR, STORED,
    UNREGISTERED,
};
use log::debug;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Connection settings.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Flavour announced in `INIT`. Rust clients receive server and source
    /// metadata; C clients receive bare replies.
    pub client: ClientKind,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn rust() -> Self {
        Self {
            client: ClientKind::Rust,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }
}

/// A registered data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub handle: usize,
    /// Present for sessions opened as [`ClientKind::Rust`].
    pub attributes: Option<SourceAttributes>,
}

impl Registration {
    /// Field delimiter of the source (`,` when unknown).
    pub fn delimiter(&self) -> &str {
        self.attributes
            .as_ref()
            .map_or(",", |a| a.delimiter.as_str())
    }
}

/// One row or value handed out by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(String);

impl Record {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split the row on the source's field delimiter.
    pub fn fields<'a>(&'a self, delimiter: &str) -> Vec<&'a str> {
        if delimiter.is_empty() {
            return vec![self.0.as_str()];
        }
        self.0.split(delimiter).collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open connection to a data server.
pub struct Session {
    reader: BufReader<TcpStream>,
    client: ClientKind,
    info: Option<ServerInfo>,
}

impl Session {
    /// Connect as a Rust client.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with(host, port, &SessionOptions::rust())
    }

    /// Connect with explicit options and send `INIT`.
    pub fn connect_with(host: &str, port: u16, options: &SessionOptions) -> Result<Self> {
        let stream = open(host, port, options.connect_timeout)?;
        stream.set_read_timeout(options.read_timeout)?;
        stream.set_write_timeout(options.write_timeout)?;
        stream.set_nodelay(true)?;

        let mut session = Self {
            reader: BufReader::new(stream),
            client: options.client,
            info: None,
        };

        let reply = session.request(&Request::Init {
            client: options.client,
        })?;
        match options.client {
            ClientKind::Rust => {
                let info: ServerInfo = serde_json::from_str(&reply)
                    .map_err(|_| ClientError::Protocol(reply.clone()))?;
                debug!(
                    "Connected to {} {} ({}, {} sources)",
                    info.service,
                    info.version,
                    info.environment,
                    info.sources.len()
                );
                session.info = Some(info);
            }
            ClientKind::C => {
                if let Some(status) = Status::from_reply(&reply) {
                    return Err(ClientError::Status(status));
                }
            }
        }

        Ok(session)
    }

    /// Server description (Rust sessions only).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.info.as_ref()
    }

    pub fn client_kind(&self) -> ClientKind {
        self.client
    }

    /// Send one request and return the raw reply line, sentinels included.
    pub fn request(&mut self, request: &Request) -> Result<String> {
        let line = request.to_string();
        debug!("-> {}", line);

        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(ClientError::Closed);
        }
        let reply = reply.trim_end_matches(['\r', '\n']).to_string();
        debug!("<- {}", reply);
        Ok(reply)
    }

    /// Look up a source handle by name.
    pub fn register(&mut self, name: &str) -> Result<Registration> {
        check_field(name)?;
        let reply = self.request(&Request::Register {
            name: name.to_string(),
        })?;

        let (handle, attributes) = match reply.split_once(FIELD_SEPARATOR) {
            Some((handle, json)) => {
                let attrs: SourceAttributes = serde_json::from_str(json)
                    .map_err(|_| ClientError::Protocol(reply.clone()))?;
                (handle, Some(attrs))
            }
            None => (reply.as_str(), None),
        };

        match handle.trim().parse::<i64>() {
            Ok(h) if h == i64::from(UNREGISTERED) => {
                Err(ClientError::UnknownSource(name.to_string()))
            }
            Ok(h) if h >= 0 => Ok(Registration {
                handle: h as usize,
                attributes,
            }),
            _ => Err(reply_error(&reply)),
        }
    }

    /// `GETN`: next row or value.
    pub fn get_next(&mut self, handle: usize) -> Result<Record> {
        self.get(&Request::GetNext { handle })
    }

    /// `GETK`: next row of a keyed group.
    pub fn get_keyed(&mut self, handle: usize, group: &str) -> Result<Record> {
        check_field(group)?;
        self.get(&Request::GetKeyed {
            handle,
            group: group.to_string(),
        })
    }

    /// `GETKR`: random row of a keyed group.
    pub fn get_random_keyed(&mut self, handle: usize, group: &str) -> Result<Record> {
        check_field(group)?;
        self.get(&Request::GetRandomKeyed {
            handle,
            group: group.to_string(),
        })
    }

    /// `GETKS`: next value of a keyed sequence.
    pub fn get_keyed_sequence(&mut self, handle: usize, tag: &str) -> Result<Record> {
        check_field(tag)?;
        self.get(&Request::GetKeyedSequence {
            handle,
            tag: tag.to_string(),
        })
    }

    /// `GETH`: value for a key.
    pub fn get_hashed(&mut self, handle: usize, key: &str) -> Result<Record> {
        check_field(key)?;
        self.get(&Request::GetHashed {
            handle,
            key: key.to_string(),
        })
    }

    /// `GETI`: row by 0-based index.
    pub fn get_indexed(&mut self, handle: usize, index: usize) -> Result<Record> {
        self.get(&Request::GetIndexed {
            handle,
            index: index.to_string(),
        })
    }

    /// `STOC`: append a row.
    pub fn store(&mut self, handle: usize, data: &str) -> Result<()> {
        check_line(data)?;
        self.put(&Request::Store {
            handle,
            data: data.to_string(),
        })
    }

    /// `STOK`: append a row to a keyed group.
    pub fn store_keyed(&mut self, handle: usize, group: &str, data: &str) -> Result<()> {
        check_field(group)?;
        check_line(data)?;
        self.put(&Request::StoreKeyed {
            handle,
            group: group.to_string(),
            data: data.to_string(),
        })
    }

    /// Close the connection.
    pub fn close(self) -> Result<()> {
        match self.reader.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&mut self, request: &Request) -> Result<Record> {
        let reply = self.request(request)?;
        match Status::from_reply(&reply) {
            Some(status) => Err(ClientError::Status(status)),
            None => Ok(Record(reply)),
        }
    }

    fn put(&mut self, request: &Request) -> Result<()> {
        let reply = self.request(request)?;
        if reply == STORED {
            Ok(())
        } else {
            Err(reply_error(&reply))
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.reader.get_ref().peer_addr().ok())
            .field("client", &self.client)
            .finish()
    }
}

fn open(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let addrs: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|_| ClientError::Resolve(format!("{}:{}", host, port)))?
        .collect();

    let mut last_err = None;
    for addr in &addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                debug!("Connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => e.into(),
        None => ClientError::Resolve(format!("{}:{}", host, port)),
    })
}

fn reply_error(reply: &str) -> ClientError {
    match Status::from_reply(reply) {
        Some(status) => ClientError::Status(status),
        None => ClientError::Protocol(reply.to_string()),
    }
}

fn check_field(field: &str) -> Result<()> {
    if field.contains(FIELD_SEPARATOR) {
        return Err(ClientError::InvalidField(field.to_string()));
    }
    check_line(field)
}

fn check_line(field: &str) -> Result<()> {
    if field.contains(['\n', '\r']) {
        return Err(ClientError::InvalidField(field.to_string()));
    }
    Ok(())
}
