// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The policy store and the rule-matching scan.
//!
//! A policy is a sparse table of rules addressed by an 8-bit id; the
//! slot index is the id. Unused slots are explicit tombstones
//! (`None`), never implicitly valid. Matching walks the slots in
//! ascending index order and returns the first rule whose conditions
//! all hold -- strict first-match, no priority field, no best-match
//! scoring.

use super::action::ActionId;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use oste_api::MatchCondition;

/// A stable index into the policy arena.
pub type PolicyId = usize;

/// Rule ids are 8-bit; a policy holds at most 256 slots.
pub type RuleId = u8;

#[derive(Clone, Debug)]
pub struct RuleEntry {
    conditions: Vec<MatchCondition>,
    action: ActionId,
}

impl RuleEntry {
    /// The match conditions, in the order the operator added them.
    pub fn conditions(&self) -> &[MatchCondition] {
        &self.conditions
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    /// A rule matches iff every condition matches. A rule with zero
    /// conditions matches unconditionally -- the "apply on every
    /// packet" clause.
    pub fn is_match(&self, buf: &[u8]) -> bool {
        self.conditions.iter().all(|c| condition_matches(c, buf))
    }
}

/// A condition matches iff the buffer is long enough and the bytes at
/// `[offset, offset + expected.len())` compare equal. An out-of-range
/// offset is a non-match, never an error: short packets simply fall
/// through to the next rule.
fn condition_matches(cond: &MatchCondition, buf: &[u8]) -> bool {
    let start = usize::from(cond.offset);
    match buf.get(start..start + cond.bytes.len()) {
        Some(window) => window == &cond.bytes[..],
        None => false,
    }
}

#[derive(Clone, Debug)]
pub struct Policy {
    name: String,
    rules: Vec<Option<RuleEntry>>,
}

impl Policy {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of allocated rule slots, tombstones included.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rule(&self, id: RuleId) -> Option<&RuleEntry> {
        self.rules.get(usize::from(id)).and_then(|slot| slot.as_ref())
    }

    /// Iterate the live rules in ascending slot order.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &RuleEntry)> {
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|r| (id as RuleId, r)))
    }

    /// Scan the rule slots in ascending index order, skipping
    /// tombstones, and return the first matching rule's action.
    pub fn find_match(&self, buf: &[u8]) -> Option<ActionId> {
        for entry in self.rules.iter().flatten() {
            if entry.is_match(buf) {
                return Some(entry.action);
            }
        }
        None
    }

    fn slot_mut(&mut self, id: RuleId) -> &mut Option<RuleEntry> {
        let idx = usize::from(id);
        if idx >= self.rules.len() {
            self.rules.resize_with(idx + 1, || None);
        }
        &mut self.rules[idx]
    }
}

/// Name-keyed store for [`Policy`] records, backed by the same
/// arena-plus-free-list shape as the action store.
#[derive(Debug, Default)]
pub struct PolicyStore {
    by_name: BTreeMap<String, PolicyId>,
    slots: Vec<Option<Policy>>,
    free: Vec<PolicyId>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named policy if absent and add/extend the rule at
    /// `id`. A repeated call for the same (policy, id) appends
    /// `condition` to the existing rule and re-points its action; the
    /// condition list grows monotonically across calls. The caller
    /// has already resolved `action` against the action store.
    pub fn add_rule(
        &mut self,
        name: &str,
        id: RuleId,
        condition: Option<MatchCondition>,
        action: ActionId,
    ) -> PolicyId {
        let pid = match self.by_name.get(name) {
            Some(&pid) => pid,
            None => {
                let record =
                    Policy { name: name.to_string(), rules: Vec::new() };
                let pid = self.alloc(record);
                self.by_name.insert(name.to_string(), pid);
                pid
            }
        };

        // Unwrap safety: `pid` refers to an occupied slot by
        // construction above.
        let policy = self.slots[pid].as_mut().unwrap();
        let slot = policy.slot_mut(id);
        let entry = slot.get_or_insert_with(|| RuleEntry {
            conditions: Vec::new(),
            action,
        });
        if let Some(cond) = condition {
            entry.conditions.push(cond);
        }
        entry.action = action;
        pid
    }

    pub fn id(&self, name: &str) -> Option<PolicyId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.by_name.get(name).and_then(|&pid| self.slots[pid].as_ref())
    }

    pub fn by_id(&self, pid: PolicyId) -> Option<&Policy> {
        self.slots.get(pid).and_then(|s| s.as_ref())
    }

    pub fn rule(&self, name: &str, id: RuleId) -> Option<&RuleEntry> {
        self.get(name).and_then(|p| p.rule(id))
    }

    /// Allocated slot count for the named policy, 0 if unknown.
    pub fn rule_count(&self, name: &str) -> usize {
        self.get(name).map_or(0, |p| p.rule_count())
    }

    /// Does any rule in any policy reference `action`? Used to refuse
    /// action deletion while a reference is live.
    pub fn references_action(&self, action: ActionId) -> bool {
        self.slots
            .iter()
            .flatten()
            .flat_map(|p| p.rules.iter().flatten())
            .any(|r| r.action == action)
    }

    /// Remove the named policy, returning its record. Binding-table
    /// integrity is the caller's responsibility.
    pub(crate) fn remove(&mut self, name: &str) -> Option<Policy> {
        let pid = self.by_name.remove(name)?;
        let record = self.slots[pid].take();
        self.free.push(pid);
        record
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    fn alloc(&mut self, record: Policy) -> PolicyId {
        match self.free.pop() {
            Some(pid) => {
                self.slots[pid] = Some(record);
                pid
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

    fn cond(offset: u16, bytes: &[u8]) -> MatchCondition {
        MatchCondition { offset, bytes: bytes.to_vec() }
    }

    #[test]
    fn condition_bounds() {
        let buf = [0u8, 1, 2, 3];
        assert!(condition_matches(&cond(2, &[2, 3]), &buf));
        // One byte past the end: non-match, not an error.
        assert!(!condition_matches(&cond(3, &[3, 0]), &buf));
        assert!(!condition_matches(&cond(9, &[0]), &buf));
        // Mismatched bytes.
        assert!(!condition_matches(&cond(0, &[9]), &buf));
    }

    #[test]
    fn tombstones_and_counts() {
        let mut store = PolicyStore::new();
        store.add_rule("p1", 5, Some(cond(0, &[1])), 0);

        // Slots 0..=4 were exposed as tombstones.
        assert_eq!(store.rule_count("p1"), 6);
        assert!(store.rule("p1", 0).is_none());
        assert!(store.rule("p1", 4).is_none());
        assert!(store.rule("p1", 5).is_some());
        assert_eq!(store.rule_count("nope"), 0);
    }

    #[test]
    fn conditions_accumulate() {
        let mut store = PolicyStore::new();
        store.add_rule("p1", 0, Some(cond(0, &[1])), 0);
        store.add_rule("p1", 0, Some(cond(4, &[2])), 1);

        let rule = store.rule("p1", 0).unwrap();
        assert_eq!(rule.conditions().len(), 2);
        // The action reference follows the latest call.
        assert_eq!(rule.action(), 1);
    }

    #[test]
    fn scan_ascending_first_match() {
        let mut store = PolicyStore::new();
        // Rules at ids {2, 5, 1}; all match the probe buffer.
        store.add_rule("p1", 2, None, 20);
        store.add_rule("p1", 5, None, 50);
        store.add_rule("p1", 1, None, 10);

        let policy = store.get("p1").unwrap();
        // Ascending slot order wins: id 1 first.
        assert_eq!(policy.find_match(&[0u8; 8]), Some(10));
    }

    #[test]
    fn empty_conditions_always_match() {
        let mut store = PolicyStore::new();
        store.add_rule("p1", 0, Some(cond(0, &[0xde, 0xad])), 7);
        store.add_rule("p1", 3, None, 8);

        let policy = store.get("p1").unwrap();
        // Rule 0 misses, the unconditional rule at 3 catches.
        assert_eq!(policy.find_match(&[0u8; 4]), Some(8));
        // Rule 0 hits first when its bytes are present.
        assert_eq!(policy.find_match(&[0xde, 0xad, 0, 0]), Some(7));
    }

    #[test]
    fn action_references() {
        let mut store = PolicyStore::new();
        store.add_rule("p1", 0, None, 3);
        assert!(store.references_action(3));
        assert!(!store.references_action(4));

        store.remove("p1").unwrap();
        assert!(!store.references_action(3));
    }
}
