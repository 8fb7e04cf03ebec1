// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client connection handling for the data server.

use dserver_proto::ClientKind;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// A connected client.
pub struct ClientConnection {
    reader: BufReader<TcpStream>,
    peer_addr: SocketAddr,
    max_message_size: usize,
    client: ClientKind,
    line: Vec<u8>,
}

impl ClientConnection {
    /// Create a new client connection.
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self {
            reader: BufReader::new(stream),
            peer_addr,
            max_message_size,
            client: ClientKind::default(),
            line: Vec::with_capacity(256),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Client flavour announced by `INIT` (C until then).
    pub fn client_mut(&mut self) -> &mut ClientKind {
        &mut self.client
    }

    /// Read one request line, without its terminator.
    ///
    /// Returns `Ok(None)` if the connection is closed gracefully.
    pub async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        self.line.clear();

        // One extra byte for the newline itself.
        let limit = self.max_message_size as u64 + 1;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)
            .await?;

        if n == 0 {
            return Ok(None);
        }
        if self.line.last() != Some(&b'\n') && n as u64 == limit {
            return Err(ConnectionError::TooLarge(self.max_message_size));
        }

        let text = String::from_utf8_lossy(&self.line);
        Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Send one reply line.
    pub async fn send_reply(&mut self, reply: &str) -> Result<(), ConnectionError> {
        let stream = self.reader.get_mut();
        stream.write_all(reply.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shutdown the write half.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Connection error types.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: request line exceeds {0} bytes")]
    TooLarge(usize),
}
