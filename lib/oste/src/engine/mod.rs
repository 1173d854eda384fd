// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The engine in OSTE.
//!
//! All code under this namespace is guarded by the `engine` feature
//! flag. The entry point is [`node::SteerNode`], which owns the
//! action/policy stores, the interface binding table, and the
//! per-packet match/rewrite path.
pub mod action;
pub mod bind;
pub mod ioctl;
pub mod node;
pub mod packet;
pub mod policy;
pub mod rewrite;

pub use oste_api::Direction;

cfg_if! {
    if #[cfg(any(feature = "std", test))] {
        #[macro_export]
        macro_rules! dbg_macro {
            ($s:tt) => {
                println!($s);
            };
            ($s:tt, $($arg:tt)*) => {
                println!($s, $($arg)*);
            };
        }

        #[macro_export]
        macro_rules! err_macro {
            ($s:tt) => {
                println!(concat!("ERROR: ", $s));
            };
            ($s:tt, $($arg:tt)*) => {
                println!(concat!("ERROR: ", $s), $($arg)*);
            };
        }
    } else {
        // Without std there is nowhere to write; evaluate the
        // arguments so the call sites typecheck identically and let
        // the host wire up a sink if it wants one.
        #[macro_export]
        macro_rules! dbg_macro {
            ($s:tt) => {};
            ($s:tt, $($arg:tt)*) => {
                { let _ = ::core::format_args!($s, $($arg)*); }
            };
        }

        #[macro_export]
        macro_rules! err_macro {
            ($s:tt) => {};
            ($s:tt, $($arg:tt)*) => {
                { let _ = ::core::format_args!($s, $($arg)*); }
            };
        }
    }
}

pub use dbg_macro as dbg;
pub use err_macro as err;
