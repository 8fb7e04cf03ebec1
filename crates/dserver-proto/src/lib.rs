// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dserver wire vocabulary.
//!
//! The data server speaks a line-oriented text protocol. Every request is a
//! single line of `|`-separated fields, every reply a single line:
//!
//! ```text
//! client                         server
//!   INIT|Rust            ---->
//!                        <----   {"service":"dserver",...}
//!   REG|Address          ---->
//!                        <----   0|{"type":"CSV","delimiter":",","size":120}
//!   GETN|0               ---->
//!                        <----   12 High Street,Springfield,3000
//! ```
//!
//! Conditions that are not data (an exhausted source, an unknown group, a
//! malformed request) come back as reserved `*WORDS*` sentinels, see
//! [`Status`].

pub mod info;
pub mod request;
pub mod status;

pub use info::{ServerInfo, SourceAttributes, SourceKind, UnknownSourceKind};
pub use request::{ClientKind, ProtocolError, Request};
pub use status::Status;

/// Default TCP port of the data server.
pub const DEFAULT_PORT: u16 = 9572;

/// Default host clients connect to.
pub const DEFAULT_HOST: &str = "localhost";

/// Service name token.
pub const SERVICE: &str = "dserver";

/// Separator between request fields.
pub const FIELD_SEPARATOR: char = '|';

/// Default upper bound for a single request or reply line (bytes).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Reply to a successful `STOC`/`STOK`.
pub const STORED: &str = "1";

/// Registration handle returned for an unknown source name.
pub const UNREGISTERED: i32 = -1;
