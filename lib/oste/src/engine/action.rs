// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The action store.
//!
//! An action is a named bundle of rewrite operations plus an optional
//! output-port override. Policy rules reference actions by their
//! arena id; the id of a record never changes while the record is
//! live, so rules resolve their action once, at insertion time.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use oste_api::PortId;
use oste_api::RewriteOp;

/// A stable index into the action arena.
pub type ActionId = usize;

#[derive(Clone, Debug)]
pub struct Action {
    name: String,
    ops: Vec<RewriteOp>,
    out_port: Option<PortId>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rewrite operations, in execution order.
    pub fn ops(&self) -> &[RewriteOp] {
        &self.ops
    }

    pub fn out_port(&self) -> Option<PortId> {
        self.out_port
    }
}

/// Name-keyed store for [`Action`] records: a map from name to arena
/// id, with the records themselves in a slot arena (vector + free
/// list). Lookup is O(log n) on the name and O(1) on the id, and ids
/// stay stable across unrelated insertions and deletions.
#[derive(Debug, Default)]
pub struct ActionStore {
    by_name: BTreeMap<String, ActionId>,
    slots: Vec<Option<Action>>,
    free: Vec<ActionId>,
}

impl ActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named action if absent; append `op` when supplied;
    /// set the out-port override when supplied. An absent `out_port`
    /// leaves the prior override untouched, so an operator can layer
    /// rewrites without re-stating the redirect.
    ///
    /// Appending is not idempotent: calling twice with the same `op`
    /// appends twice. That is the operator's stated intent when
    /// layering multiple rewrites under one action name.
    pub fn set(
        &mut self,
        name: &str,
        op: Option<RewriteOp>,
        out_port: Option<PortId>,
    ) -> ActionId {
        let id = match self.by_name.get(name) {
            Some(&id) => id,
            None => {
                let record = Action {
                    name: name.to_string(),
                    ops: Vec::new(),
                    out_port: None,
                };
                let id = self.alloc(record);
                self.by_name.insert(name.to_string(), id);
                id
            }
        };

        // Unwrap safety: `id` came from `by_name` or `alloc`, both of
        // which only refer to occupied slots.
        let action = self.slots[id].as_mut().unwrap();
        if let Some(op) = op {
            action.ops.push(op);
        }
        if out_port.is_some() {
            action.out_port = out_port;
        }
        id
    }

    pub fn id(&self, name: &str) -> Option<ActionId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.by_name.get(name).and_then(|&id| self.slots[id].as_ref())
    }

    pub fn by_id(&self, id: ActionId) -> Option<&Action> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    /// Remove the named action, returning its record. Referential
    /// integrity against the policy store is the caller's
    /// responsibility; see [`crate::engine::node::SteerNode`].
    pub(crate) fn remove(&mut self, name: &str) -> Option<Action> {
        let id = self.by_name.remove(name)?;
        let record = self.slots[id].take();
        self.free.push(id);
        record
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    fn alloc(&mut self, record: Action) -> ActionId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(record);
                id
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ops_accumulate() {
        let mut store = ActionStore::new();
        store.set(
            "a1",
            Some(RewriteOp::Replace { offset: 0, bytes: vec![0x01] }),
            None,
        );
        store.set(
            "a1",
            Some(RewriteOp::Remove { offset: 4, len: 2 }),
            Some(PortId(9)),
        );

        let act = store.get("a1").unwrap();
        assert_eq!(act.ops().len(), 2);
        assert_eq!(act.out_port(), Some(PortId(9)));

        // A call with no port leaves the prior override in place.
        store.set("a1", None, None);
        let act = store.get("a1").unwrap();
        assert_eq!(act.ops().len(), 2);
        assert_eq!(act.out_port(), Some(PortId(9)));
    }

    #[test]
    fn ids_stable_and_slots_reused() {
        let mut store = ActionStore::new();
        let a = store.set("a", None, None);
        let b = store.set("b", None, None);
        let c = store.set("c", None, None);
        assert_ne!(a, b);
        assert_ne!(b, c);

        store.remove("b").unwrap();
        assert!(store.get("b").is_none());
        assert_eq!(store.by_id(a).unwrap().name(), "a");
        assert_eq!(store.by_id(c).unwrap().name(), "c");

        // The freed slot is handed to the next insertion.
        let d = store.set("d", None, None);
        assert_eq!(d, b);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut store = ActionStore::new();
        assert!(store.remove("ghost").is_none());
    }
}
