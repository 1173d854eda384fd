// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The rewrite-operation and match-condition wire types.
//!
//! These are the payloads an operator attaches to actions and rules.
//! They cross the command boundary verbatim and are stored by the
//! engine as-is, so they live here rather than in the engine crate.

use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// A single byte-level rewrite applied to a packet buffer.
///
/// Offsets are relative to the start of the buffer *at the time the
/// operation executes*. An action's operations run in stored order
/// and earlier Insert/Remove operations shift the bytes later
/// operations see; the engine does not adjust offsets to compensate.
/// Operators compose offsets accordingly.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RewriteOp {
    /// Grow the buffer by `bytes.len()`, shifting the tail at
    /// `offset` forward, and write `bytes` at `offset`.
    Insert { offset: u16, bytes: Vec<u8> },

    /// Overwrite `bytes.len()` bytes starting at `offset`. Buffer
    /// length is unchanged.
    Replace { offset: u16, bytes: Vec<u8> },

    /// Shrink the buffer by deleting `len` bytes starting at
    /// `offset`, shifting the tail backward.
    Remove { offset: u16, len: u16 },
}

impl Display for RewriteOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Insert { offset, bytes } => {
                write!(f, "insert@{}={}", offset, hex(bytes))
            }
            Self::Replace { offset, bytes } => {
                write!(f, "replace@{}={}", offset, hex(bytes))
            }
            Self::Remove { offset, len } => {
                write!(f, "remove@{}+{}", offset, len)
            }
        }
    }
}

/// A byte-equality match at a fixed buffer offset.
///
/// The condition holds iff the buffer contains exactly `bytes` at
/// `[offset, offset + bytes.len())`. A buffer too short for the
/// comparison is a non-match, not an error.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MatchCondition {
    pub offset: u16,
    pub bytes: Vec<u8>,
}

impl Display for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pkt@{}={}", self.offset, hex(&self.bytes))
    }
}

fn hex(bytes: &[u8]) -> alloc::string::String {
    use core::fmt::Write;

    let mut s = alloc::string::String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes {
        // Writing to a String cannot fail.
        let _ = write!(s, "{:02x}", b);
    }
    s
}
