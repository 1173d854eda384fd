// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The buffer-service seam.
//!
//! The host's packet I/O owns the physical buffers; the engine only
//! needs the four primitives below plus the settable output
//! destination. [`VecPacket`] is the heap-backed implementation used
//! by tests and std hosts; a kernel host wraps its own buffer type
//! instead.

use alloc::vec::Vec;
use oste_api::PortId;

/// Read and splice access to a single packet buffer.
///
/// The splice methods take offsets the caller has already validated
/// against `len()`; the rewrite engine performs that validation
/// before every call, so implementations may treat out-of-range
/// arguments as a contract violation (panic in debug builds is
/// acceptable, silent corruption is not).
pub trait PacketBuf {
    /// Current buffer length in bytes.
    fn len(&self) -> usize;

    /// The full buffer contents.
    fn bytes(&self) -> &[u8];

    /// Grow the buffer by `bytes.len()`, shifting the tail at
    /// `offset` forward, and write `bytes` at `offset`.
    /// `offset <= len()`.
    fn insert(&mut self, offset: usize, bytes: &[u8]);

    /// Shrink the buffer by `len` bytes at `offset`, shifting the
    /// tail backward. `offset + len <= len()`.
    fn remove(&mut self, offset: usize, len: usize);

    /// Overwrite `bytes.len()` bytes at `offset` in place.
    /// `offset + bytes.len() <= len()`.
    fn overwrite(&mut self, offset: usize, bytes: &[u8]);

    /// Override the destination already chosen by upstream routing.
    fn set_out_port(&mut self, port: PortId);

    /// The current destination override, if any.
    fn out_port(&self) -> Option<PortId>;
}

/// A `Vec`-backed packet buffer.
#[derive(Clone, Debug, Default)]
pub struct VecPacket {
    data: Vec<u8>,
    out_port: Option<PortId>,
}

impl VecPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec(), out_port: None }
    }
}

impl From<Vec<u8>> for VecPacket {
    fn from(data: Vec<u8>) -> Self {
        Self { data, out_port: None }
    }
}

impl PacketBuf for VecPacket {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn insert(&mut self, offset: usize, bytes: &[u8]) {
        let _ = self.data.splice(offset..offset, bytes.iter().copied());
    }

    fn remove(&mut self, offset: usize, len: usize) {
        let _ = self.data.drain(offset..offset + len);
    }

    fn overwrite(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn set_out_port(&mut self, port: PortId) {
        self.out_port = Some(port);
    }

    fn out_port(&self) -> Option<PortId> {
        self.out_port
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splice_primitives() {
        let mut pkt = VecPacket::copy(&[0, 1, 2, 3, 4]);

        pkt.insert(2, &[0xAA, 0xBB]);
        assert_eq!(pkt.bytes(), &[0, 1, 0xAA, 0xBB, 2, 3, 4]);

        pkt.remove(0, 2);
        assert_eq!(pkt.bytes(), &[0xAA, 0xBB, 2, 3, 4]);

        pkt.overwrite(3, &[9]);
        assert_eq!(pkt.bytes(), &[0xAA, 0xBB, 2, 9, 4]);

        // Insert at the very end is append.
        pkt.insert(5, &[7]);
        assert_eq!(pkt.bytes(), &[0xAA, 0xBB, 2, 9, 4, 7]);
    }

    #[test]
    fn out_port_override() {
        let mut pkt = VecPacket::copy(&[0]);
        assert_eq!(pkt.out_port(), None);
        pkt.set_out_port(PortId(7));
        assert_eq!(pkt.out_port(), Some(PortId(7)));
    }
}
