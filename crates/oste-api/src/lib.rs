// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cmd;
pub mod rewrite;

pub use cmd::*;
pub use rewrite::*;

/// The overall version of the API. Anytime an API is added, removed,
/// or modified, this number should increment. Currently we attach no
/// semantic meaning to the number other than as a means to verify
/// that the client and engine are compiled for the same API. A u64 is
/// used to give future wiggle room to play bit games if needed.
pub const API_VERSION: u64 = 3;

/// Major version of the OSTE package.
pub const MAJOR_VERSION: u64 = 0;

/// The direction of traffic on an interface, from the point of view
/// of the device: `In` is ingress (packets arriving from the wire),
/// `Out` is egress (packets headed to the wire).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    In = 1,
    Out = 2,
}

impl core::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" | "ingress" => Ok(Direction::In),
            "out" | "egress" => Ok(Direction::Out),
            _ => Err(format!("invalid direction: {}", s)),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dirstr = match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        };

        write!(f, "{}", dirstr)
    }
}

/// An opaque interface identifier, handed to the engine by the host's
/// interface-resolution layer. The engine never parses interface
/// names; it only ever sees this index.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct IfIndex(pub u32);

impl From<u32> for IfIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// An output port, used by an action to override the destination
/// already chosen by upstream routing. An action with no override is
/// modeled as `Option<PortId>::None`; there is no in-band sentinel
/// value.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct PortId(pub u32);

impl From<u32> for PortId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}
