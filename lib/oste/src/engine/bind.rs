// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The interface binding table.
//!
//! One slot per (interface, direction), holding the id of the bound
//! policy or `None` for unbound. The table is a pair of vectors
//! indexed by interface index, grown on demand: an interface the
//! engine has never seen resolves to unbound rather than failing, and
//! unbind never fails either.

use super::policy::PolicyId;
use alloc::vec::Vec;
use oste_api::Direction;
use oste_api::IfIndex;

#[derive(Debug, Default)]
pub struct BindingTable {
    ingress: Vec<Option<PolicyId>>,
    egress: Vec<Option<PolicyId>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, ifidx: IfIndex, dir: Direction, pid: PolicyId) {
        *self.slot_mut(ifidx, dir) = Some(pid);
    }

    pub fn unbind(&mut self, ifidx: IfIndex, dir: Direction) {
        *self.slot_mut(ifidx, dir) = None;
    }

    pub fn resolve(&self, ifidx: IfIndex, dir: Direction) -> Option<PolicyId> {
        self.table(dir).get(ifidx.0 as usize).copied().flatten()
    }

    /// Does any slot reference `pid`? Used to refuse policy deletion
    /// while a binding is live.
    pub fn references_policy(&self, pid: PolicyId) -> bool {
        self.ingress
            .iter()
            .chain(self.egress.iter())
            .any(|slot| *slot == Some(pid))
    }

    /// Iterate the live bindings, ingress first, in interface order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (IfIndex, Direction, PolicyId)> + '_ {
        let ing = self.ingress.iter().enumerate().filter_map(|(i, slot)| {
            slot.map(|pid| (IfIndex(i as u32), Direction::In, pid))
        });
        let egr = self.egress.iter().enumerate().filter_map(|(i, slot)| {
            slot.map(|pid| (IfIndex(i as u32), Direction::Out, pid))
        });
        ing.chain(egr)
    }

    fn table(&self, dir: Direction) -> &Vec<Option<PolicyId>> {
        match dir {
            Direction::In => &self.ingress,
            Direction::Out => &self.egress,
        }
    }

    fn slot_mut(
        &mut self,
        ifidx: IfIndex,
        dir: Direction,
    ) -> &mut Option<PolicyId> {
        let table = match dir {
            Direction::In => &mut self.ingress,
            Direction::Out => &mut self.egress,
        };
        let idx = ifidx.0 as usize;
        if idx >= table.len() {
            table.resize(idx + 1, None);
        }
        &mut table[idx]
    }
}
