// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking client for the dserver test-data server.
//!
//! ```no_run
//! use dserver_client::{ClientError, Session};
//! use dserver_proto::{DEFAULT_HOST, DEFAULT_PORT};
//!
//! # fn main() -> Result<(), ClientError> {
//! let mut session = Session::connect(DEFAULT_HOST, DEFAULT_PORT)?;
//! let address = session.register("Address")?;
//!
//! loop {
//!     match session.get_next(address.handle) {
//!         Ok(row) => println!("{:?}", row.fields(address.delimiter())),
//!         Err(e) if e.is_exhausted() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod session;

pub use session::{Record, Registration, Session, SessionOptions};

use dserver_proto::Status;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("server closed the connection")]
    Closed,

    /// The server answered with a sentinel.
    #[error("server replied {0}")]
    Status(Status),

    #[error("unknown data source {0:?}")]
    UnknownSource(String),

    #[error("field {0:?} contains a separator or line break")]
    InvalidField(String),

    #[error("unexpected reply {0:?}")]
    Protocol(String),
}

impl ClientError {
    /// True when the source or group ran out of rows.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Status(s) if s.is_exhausted())
    }

    /// The sentinel, if the server sent one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status(s) => Some(*s),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
