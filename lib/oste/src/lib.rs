// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg_attr(feature = "engine", macro_use)]
extern crate alloc;

#[cfg(any(feature = "engine", test))]
#[macro_use]
extern crate cfg_if;

#[cfg(any(feature = "api", test))]
pub mod api;
#[cfg(any(feature = "engine", test))]
pub mod engine;
