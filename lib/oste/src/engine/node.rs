// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The steering node.
//!
//! A [`SteerNode`] is the explicit owner of the action store, the
//! policy store, and the binding table -- there is no process-wide
//! registry. The host creates one node per engine instance, passes it
//! by reference into every operation, and is responsible for
//! serializing configuration calls against the packet path (the node
//! implements no locking of its own; see the crate docs on the
//! run-to-completion host model).
//!
//! Configuration operations take `&mut self` and enforce the
//! referential-integrity invariants: no rule may reference a deleted
//! action, no binding may reference a deleted policy.
//!
//! The packet path is [`SteerNode::process`]: binding lookup, rule
//! scan, rewrite, redirect. Non-matches are control flow, not errors;
//! rewrite bounds faults drop the packet and bump a counter rather
//! than logging per packet.

use super::action::Action;
use super::action::ActionId;
use super::action::ActionStore;
use super::bind::BindingTable;
use super::packet::PacketBuf;
use super::policy::PolicyId;
use super::policy::PolicyStore;
use super::policy::RuleEntry;
use super::policy::RuleId;
use super::rewrite;
use alloc::string::String;
use alloc::string::ToString;
use oste_api::Direction;
use oste_api::IfIndex;
use oste_api::MatchCondition;
use oste_api::NodeStats;
use oste_api::OsteError;
use oste_api::PortId;
use oste_api::RewriteOp;

pub type Result<T> = core::result::Result<T, OsteError>;

/// The host's feature-enable hook: a fire-and-forget notification,
/// invoked once per bind/unbind, telling the host to route packets on
/// the given interface/direction through this node at all.
pub trait FeatureHook {
    fn enable(&mut self, ifidx: IfIndex, dir: Direction);
    fn disable(&mut self, ifidx: IfIndex, dir: Direction);
}

/// The no-op hook, for hosts that wire interfaces up themselves and
/// for tests.
impl FeatureHook for () {
    fn enable(&mut self, _ifidx: IfIndex, _dir: Direction) {}
    fn disable(&mut self, _ifidx: IfIndex, _dir: Direction) {}
}

/// The verdict of running one packet through the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessResult {
    /// No bound policy, or no rule matched. The packet was not
    /// touched and continues on its original path.
    Bypass,

    /// A rule matched and its action was applied. The buffer may have
    /// changed length and its destination may have been overridden.
    Modified,

    /// A rewrite operation faulted. The buffer may hold a partial
    /// rewrite; the host must drop the packet.
    Drop,
}

#[derive(Debug)]
pub struct SteerNode<H: FeatureHook = ()> {
    name: String,
    actions: ActionStore,
    policies: PolicyStore,
    bindings: BindingTable,
    stats: NodeStats,
    hook: H,
}

impl SteerNode<()> {
    pub fn new(name: &str) -> Self {
        Self::with_hook(name, ())
    }
}

impl<H: FeatureHook> SteerNode<H> {
    pub fn with_hook(name: &str, hook: H) -> Self {
        Self {
            name: name.to_string(),
            actions: ActionStore::new(),
            policies: PolicyStore::new(),
            bindings: BindingTable::new(),
            stats: NodeStats::default(),
            hook,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ================================================================
    // Configuration path
    // ================================================================

    /// Create or extend the named action. See
    /// [`ActionStore::set`] for the append/override semantics.
    pub fn set_action(
        &mut self,
        name: &str,
        op: Option<RewriteOp>,
        out_port: Option<PortId>,
    ) {
        let _ = self.actions.set(name, op, out_port);
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Delete the named action. Refused while any policy rule
    /// references it; a name that never existed is a successful
    /// no-op.
    pub fn delete_action(&mut self, name: &str) -> Result<()> {
        let Some(id) = self.actions.id(name) else {
            return Ok(());
        };

        if self.policies.references_action(id) {
            return Err(OsteError::ActionInUse(name.to_string()));
        }

        let _ = self.actions.remove(name);
        Ok(())
    }

    /// Create the policy if absent and add/extend the rule at
    /// `rule_id`, pointing it at the named action. The action must
    /// already exist -- the reference is resolved here, once, so the
    /// packet path never chases names.
    pub fn add_rule(
        &mut self,
        policy: &str,
        rule_id: RuleId,
        condition: Option<MatchCondition>,
        action: &str,
    ) -> Result<()> {
        let Some(act_id) = self.actions.id(action) else {
            return Err(OsteError::ActionNotFound(action.to_string()));
        };

        let _ = self.policies.add_rule(policy, rule_id, condition, act_id);
        Ok(())
    }

    pub fn rule(&self, policy: &str, rule_id: RuleId) -> Option<&RuleEntry> {
        self.policies.rule(policy, rule_id)
    }

    /// Allocated rule-slot count for the named policy (tombstones
    /// included), 0 if the policy is unknown.
    pub fn rule_count(&self, policy: &str) -> usize {
        self.policies.rule_count(policy)
    }

    /// Delete the named policy. Refused while any binding references
    /// it; a name that never existed is a successful no-op.
    pub fn delete_policy(&mut self, name: &str) -> Result<()> {
        let Some(pid) = self.policies.id(name) else {
            return Ok(());
        };

        if self.bindings.references_policy(pid) {
            return Err(OsteError::PolicyInUse(name.to_string()));
        }

        let _ = self.policies.remove(name);
        Ok(())
    }

    /// Bind the named policy to (interface, direction) and notify the
    /// host's feature hook. An unknown policy name is a silent no-op:
    /// binding is best-effort and operator-facing validation lives in
    /// the command layer.
    pub fn bind(&mut self, ifidx: IfIndex, dir: Direction, policy: &str) {
        let Some(pid) = self.policies.id(policy) else {
            super::dbg!("bind {}/{}: unknown policy {}", ifidx, dir, policy);
            return;
        };

        self.bindings.bind(ifidx, dir, pid);
        self.hook.enable(ifidx, dir);
    }

    /// Clear the binding for (interface, direction) and notify the
    /// host's feature hook. Never fails, even for an interface the
    /// node has never seen.
    pub fn unbind(&mut self, ifidx: IfIndex, dir: Direction) {
        self.bindings.unbind(ifidx, dir);
        self.hook.disable(ifidx, dir);
    }

    pub fn resolve(&self, ifidx: IfIndex, dir: Direction) -> Option<PolicyId> {
        self.bindings.resolve(ifidx, dir)
    }

    // ================================================================
    // Packet path
    // ================================================================

    /// Find the action the bound policy selects for `buf`, if any.
    pub fn find_match(
        &self,
        ifidx: IfIndex,
        dir: Direction,
        buf: &[u8],
    ) -> Option<ActionId> {
        let pid = self.bindings.resolve(ifidx, dir)?;
        self.policies.by_id(pid)?.find_match(buf)
    }

    /// Run one packet through the node: binding lookup, first-match
    /// rule scan, rewrite, optional redirect.
    pub fn process(
        &mut self,
        ifidx: IfIndex,
        dir: Direction,
        pkt: &mut impl PacketBuf,
    ) -> ProcessResult {
        self.stats.dir_mut(dir).packets += 1;

        let Some(act_id) = self.find_match(ifidx, dir, pkt.bytes()) else {
            return ProcessResult::Bypass;
        };
        self.stats.dir_mut(dir).matched += 1;

        // A live rule can only hold a live action id; a miss here
        // means the integrity invariant was broken by unsynchronized
        // host access. Bypass rather than corrupt.
        let Some(action) = self.actions.by_id(act_id) else {
            super::err!("{}: rule resolved dead action {}", self.name, act_id);
            return ProcessResult::Bypass;
        };

        let redirected = action.out_port().is_some();
        match rewrite::apply(action, pkt) {
            Ok(()) => {
                let stats = self.stats.dir_mut(dir);
                stats.applied += 1;
                if redirected {
                    stats.redirected += 1;
                }
                ProcessResult::Modified
            }
            Err(_) => {
                // Counted, not logged: a bad offset hits every packet
                // on the rule and would flood any log.
                self.stats.dir_mut(dir).faults += 1;
                ProcessResult::Drop
            }
        }
    }

    // ================================================================
    // Introspection for the command surface
    // ================================================================

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub(crate) fn actions(&self) -> &ActionStore {
        &self.actions
    }

    pub(crate) fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    pub(crate) fn bindings(&self) -> &BindingTable {
        &self.bindings
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::packet::VecPacket;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct RecordingHook {
        events: Vec<(IfIndex, Direction, bool)>,
    }

    impl FeatureHook for RecordingHook {
        fn enable(&mut self, ifidx: IfIndex, dir: Direction) {
            self.events.push((ifidx, dir, true));
        }

        fn disable(&mut self, ifidx: IfIndex, dir: Direction) {
            self.events.push((ifidx, dir, false));
        }
    }

    fn node_with_hook() -> SteerNode<RecordingHook> {
        SteerNode::with_hook("steer0", RecordingHook::default())
    }

    #[test]
    fn hook_fires_on_bind_and_unbind() {
        let mut node = node_with_hook();
        node.set_action("a1", None, None);
        node.add_rule("p1", 0, None, "a1").unwrap();

        node.bind(IfIndex(3), Direction::In, "p1");
        node.unbind(IfIndex(3), Direction::In);

        assert_eq!(
            node.hook.events,
            vec![
                (IfIndex(3), Direction::In, true),
                (IfIndex(3), Direction::In, false),
            ]
        );
    }

    #[test]
    fn bind_unknown_policy_is_silent_and_fires_no_hook() {
        let mut node = node_with_hook();
        node.bind(IfIndex(3), Direction::In, "ghost");
        assert!(node.hook.events.is_empty());
        assert_eq!(node.resolve(IfIndex(3), Direction::In), None);
    }

    #[test]
    fn add_rule_requires_action() {
        let mut node = SteerNode::new("steer0");
        let err = node.add_rule("p1", 0, None, "missing").unwrap_err();
        assert_eq!(err, OsteError::ActionNotFound("missing".into()));
        // The failed call must not have created the policy.
        assert_eq!(node.rule_count("p1"), 0);
    }

    #[test]
    fn delete_action_integrity() {
        let mut node = SteerNode::new("steer0");
        node.set_action("a1", None, None);
        node.add_rule("p1", 0, None, "a1").unwrap();

        let err = node.delete_action("a1").unwrap_err();
        assert_eq!(err, OsteError::ActionInUse("a1".into()));

        node.delete_policy("p1").unwrap();
        node.delete_action("a1").unwrap();
        assert!(node.action("a1").is_none());

        // Never-existing name: successful no-op.
        node.delete_action("never").unwrap();
    }

    #[test]
    fn delete_policy_integrity() {
        let mut node = SteerNode::new("steer0");
        node.set_action("a1", None, None);
        node.add_rule("p1", 0, None, "a1").unwrap();
        node.bind(IfIndex(2), Direction::Out, "p1");

        let err = node.delete_policy("p1").unwrap_err();
        assert_eq!(err, OsteError::PolicyInUse("p1".into()));

        node.unbind(IfIndex(2), Direction::Out);
        node.delete_policy("p1").unwrap();
        assert!(node.rule("p1", 0).is_none());
    }

    #[test]
    fn process_counts_faults() {
        let mut node = SteerNode::new("steer0");
        node.set_action(
            "a1",
            Some(RewriteOp::Replace { offset: 100, bytes: vec![1] }),
            None,
        );
        node.add_rule("p1", 0, None, "a1").unwrap();
        node.bind(IfIndex(0), Direction::In, "p1");

        let mut pkt = VecPacket::copy(&[0u8; 10]);
        let res = node.process(IfIndex(0), Direction::In, &mut pkt);
        assert_eq!(res, ProcessResult::Drop);
        assert_eq!(node.stats().rx.packets, 1);
        assert_eq!(node.stats().rx.matched, 1);
        assert_eq!(node.stats().rx.faults, 1);
        assert_eq!(node.stats().rx.applied, 0);
    }
}
