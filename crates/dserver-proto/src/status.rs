// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply sentinels.

use std::fmt;

/// A reserved reply that reports a condition instead of data.
///
/// The strings are part of the wire contract: C callers compare against them
/// directly, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Every row of the source (or an empty group) has been handed out.
    Exhausted,
    /// Every row of a keyed group has been handed out.
    GroupExhausted,
    /// The named group or tag does not exist.
    InvalidGroup,
    /// The hash key does not exist.
    UndefinedHash,
    /// The index is not an integer or lies outside the source.
    InvalidIndex,
    /// The handle does not name a loaded source.
    BadSourceIndex,
    /// The operation does not apply to the source kind.
    UnknownSourceType,
    /// Wrong number of fields for the command.
    BadMessage,
    /// The command word is not recognised.
    UnknownCommand,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Exhausted,
        Status::GroupExhausted,
        Status::InvalidGroup,
        Status::UndefinedHash,
        Status::InvalidIndex,
        Status::BadSourceIndex,
        Status::UnknownSourceType,
        Status::BadMessage,
        Status::UnknownCommand,
    ];

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exhausted => "*Exhausted*",
            Self::GroupExhausted => "*GROUP*EXHAUSTED*",
            Self::InvalidGroup => "*INVALID*GROUP*",
            Self::UndefinedHash => "*UNDEFINED*HASH*",
            Self::InvalidIndex => "*INVALID*INDEX*",
            Self::BadSourceIndex => "*BAD*SOURCE*INDEX*",
            Self::UnknownSourceType => "*UNKNOWN*SOURCE*TYPE*",
            Self::BadMessage => "*BAD*MESSAGE*",
            Self::UnknownCommand => "*UNKNOWN*COMMAND*",
        }
    }

    /// Recognise a sentinel reply. Data rows yield `None`.
    pub fn from_reply(reply: &str) -> Option<Self> {
        if !(reply.len() > 2 && reply.starts_with('*') && reply.ends_with('*')) {
            return None;
        }
        Self::ALL.into_iter().find(|s| s.as_str() == reply)
    }

    /// True for the "ran out of data" family.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Exhausted | Self::GroupExhausted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
