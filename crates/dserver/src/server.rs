// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data server core implementation.

use crate::config::{ConfigError, ServerConfig};
use crate::registry::SourceRegistry;
use dserver_proto::Status;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub mod connection;
pub mod dispatch;

pub use connection::{ClientConnection, ConnectionError};
pub use dispatch::dispatch;

/// Data server - hands out rows from the loaded sources.
#[derive(Clone)]
pub struct DataServer {
    config: Arc<ServerConfig>,
    registry: Arc<SourceRegistry>,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl DataServer {
    /// Create a new data server over already loaded sources.
    pub fn new(config: ServerConfig, registry: SourceRegistry) -> Result<Self, ServerError> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            shutdown: Arc::new(Notify::new()),
            stopping: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.listen_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.run_on(listener).await
    }

    /// Serve on an existing listener until shutdown, then flush every source.
    pub async fn run_on(&self, listener: TcpListener) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        info!("Data server listening on {}", listener.local_addr()?);

        let mut connections = JoinSet::new();

        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.stopping.load(Ordering::SeqCst) {
                info!("Shutdown signal received");
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!("New connection from {}", peer_addr);

                            let registry = self.registry.clone();
                            let max_message_size = self.config.server.max_message_size;
                            let shutdown = self.shutdown.clone();
                            let stopping = self.stopping.clone();

                            connections.spawn(async move {
                                let conn = ClientConnection::new(stream, peer_addr, max_message_size);
                                if let Err(e) = Self::handle_connection(conn, registry, shutdown, stopping).await {
                                    warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut notified => {}
            }
        }

        drop(listener);
        while connections.join_next().await.is_some() {}

        let failures = self.registry.flush_all();
        if failures > 0 {
            warn!("{} source(s) could not be saved", failures);
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Handle a client connection.
    async fn handle_connection(
        mut conn: ClientConnection,
        registry: Arc<SourceRegistry>,
        shutdown: Arc<Notify>,
        stopping: Arc<AtomicBool>,
    ) -> Result<(), ConnectionError> {
        let peer_addr = conn.peer_addr();

        loop {
            let notified = shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if stopping.load(Ordering::SeqCst) {
                debug!("Connection handler shutting down: {}", peer_addr);
                break;
            }

            let line = tokio::select! {
                result = conn.read_line() => match result {
                    Err(e @ ConnectionError::TooLarge(_)) => {
                        conn.send_reply(Status::BadMessage.as_str()).await?;
                        conn.shutdown().await?;
                        return Err(e);
                    }
                    other => other?,
                },
                _ = &mut notified => continue,
            };

            let Some(line) = line else {
                info!("Connection closed: {}", peer_addr);
                break;
            };

            let reply = dispatch(&registry, conn.client_mut(), &line);

            // Shutdown wins over a client that stopped reading.
            tokio::select! {
                result = conn.send_reply(&reply) => result?,
                _ = &mut notified => {
                    debug!("Dropping reply to {} on shutdown", peer_addr);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal the server to shutdown.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Check if server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Loaded sources.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
