// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The rewrite engine.
//!
//! Applies an action's rewrite operations to a packet buffer, in
//! stored order, then applies the out-port override if the action
//! carries one.
//!
//! Offsets are taken against the buffer as it stands when each
//! operation executes: an earlier Insert shifts the bytes a later
//! operation addresses, and the engine does not compensate. Operators
//! compose offsets with that in mind; tests pin the behavior.
//!
//! Every operation is bounds-checked against the current buffer
//! length before any splice. A violation aborts the action with
//! [`RewriteError::OutOfRange`]; the caller drops the packet and
//! counts a fault. Nothing here can write past the buffer.

use super::action::Action;
use super::packet::PacketBuf;
use core::fmt;
use core::fmt::Display;
use oste_api::RewriteOp;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RewriteError {
    /// An operation addressed bytes outside the buffer as it stood
    /// when the operation executed.
    OutOfRange { offset: usize, len: usize, buf_len: usize },
}

impl Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OutOfRange { offset, len, buf_len } => write!(
                f,
                "rewrite out of range: offset {} len {} in {}-byte buffer",
                offset, len, buf_len
            ),
        }
    }
}

pub type Result<T> = core::result::Result<T, RewriteError>;

/// Apply `action` to `pkt`: every rewrite operation in stored order,
/// then the out-port override. On error the buffer may hold the
/// partial result of the earlier operations, but it is never
/// corrupted past its own bounds; the caller is expected to drop it.
pub fn apply(action: &Action, pkt: &mut impl PacketBuf) -> Result<()> {
    for op in action.ops() {
        match op {
            RewriteOp::Insert { offset, bytes } => {
                let offset = usize::from(*offset);
                // Inserting at len() appends.
                if offset > pkt.len() {
                    return Err(RewriteError::OutOfRange {
                        offset,
                        len: bytes.len(),
                        buf_len: pkt.len(),
                    });
                }
                pkt.insert(offset, bytes);
            }

            RewriteOp::Replace { offset, bytes } => {
                let offset = usize::from(*offset);
                if offset + bytes.len() > pkt.len() {
                    return Err(RewriteError::OutOfRange {
                        offset,
                        len: bytes.len(),
                        buf_len: pkt.len(),
                    });
                }
                pkt.overwrite(offset, bytes);
            }

            RewriteOp::Remove { offset, len } => {
                let offset = usize::from(*offset);
                let len = usize::from(*len);
                if offset + len > pkt.len() {
                    return Err(RewriteError::OutOfRange {
                        offset,
                        len,
                        buf_len: pkt.len(),
                    });
                }
                pkt.remove(offset, len);
            }
        }
    }

    if let Some(port) = action.out_port() {
        pkt.set_out_port(port);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::action::ActionStore;
    use crate::engine::packet::VecPacket;
    use oste_api::PortId;

    fn action_with(ops: Vec<RewriteOp>, port: Option<PortId>) -> ActionStore {
        let mut store = ActionStore::new();
        let mut first = true;
        for op in ops {
            store.set("a", Some(op), if first { port } else { None });
            first = false;
        }
        if first {
            store.set("a", None, port);
        }
        store
    }

    #[test]
    fn insert_grows_and_shifts() {
        let store = action_with(
            vec![RewriteOp::Insert { offset: 4, bytes: vec![0xAA, 0xBB] }],
            None,
        );
        let mut pkt = VecPacket::copy(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();

        assert_eq!(pkt.len(), 12);
        assert_eq!(&pkt.bytes()[4..6], &[0xAA, 0xBB]);
        // Original tail [4, 10) now lives at [6, 12).
        assert_eq!(&pkt.bytes()[6..12], &[4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn remove_shrinks_and_shifts() {
        let store = action_with(
            vec![RewriteOp::Remove { offset: 2, len: 3 }],
            None,
        );
        let mut pkt = VecPacket::copy(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();

        assert_eq!(pkt.len(), 7);
        // Bytes [2, 7) equal the original [5, 10).
        assert_eq!(&pkt.bytes()[2..7], &[5, 6, 7, 8, 9]);
    }

    #[test]
    fn replace_in_place() {
        let store = action_with(
            vec![RewriteOp::Replace { offset: 0, bytes: vec![0x01, 0x02] }],
            None,
        );
        let mut pkt = VecPacket::copy(&[9, 9, 9, 9]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();

        assert_eq!(pkt.bytes(), &[0x01, 0x02, 9, 9]);
    }

    // Chained inserts see the post-insert buffer; offsets are not
    // adjusted for earlier operations. Operators depend on this.
    #[test]
    fn chained_insert_offsets_not_adjusted() {
        let store = action_with(
            vec![
                RewriteOp::Insert { offset: 0, bytes: vec![0xAA] },
                RewriteOp::Insert { offset: 0, bytes: vec![0xBB] },
            ],
            None,
        );
        let mut pkt = VecPacket::copy(&[1, 2]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();

        // The second insert lands in front of the first.
        assert_eq!(pkt.bytes(), &[0xBB, 0xAA, 1, 2]);
    }

    #[test]
    fn out_port_applied_after_ops() {
        let store = action_with(vec![], Some(PortId(7)));
        let mut pkt = VecPacket::copy(&[0]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();
        assert_eq!(pkt.out_port(), Some(PortId(7)));
    }

    #[test]
    fn replace_past_end_faults() {
        let store = action_with(
            vec![RewriteOp::Replace { offset: 8, bytes: vec![1, 2, 3] }],
            Some(PortId(7)),
        );
        let mut pkt = VecPacket::copy(&[0u8; 9]);
        let err = apply(store.get("a").unwrap(), &mut pkt).unwrap_err();

        assert_eq!(
            err,
            RewriteError::OutOfRange { offset: 8, len: 3, buf_len: 9 }
        );
        // A faulted action does not redirect.
        assert_eq!(pkt.out_port(), None);
        // And never grows the buffer.
        assert_eq!(pkt.len(), 9);
    }

    #[test]
    fn remove_past_end_faults() {
        let store = action_with(
            vec![RewriteOp::Remove { offset: 4, len: 10 }],
            None,
        );
        let mut pkt = VecPacket::copy(&[0u8; 8]);
        assert!(apply(store.get("a").unwrap(), &mut pkt).is_err());
        assert_eq!(pkt.len(), 8);
    }

    #[test]
    fn insert_at_end_is_append() {
        let store = action_with(
            vec![RewriteOp::Insert { offset: 3, bytes: vec![0xEE] }],
            None,
        );
        let mut pkt = VecPacket::copy(&[1, 2, 3]);
        apply(store.get("a").unwrap(), &mut pkt).unwrap();
        assert_eq!(pkt.bytes(), &[1, 2, 3, 0xEE]);
    }
}
