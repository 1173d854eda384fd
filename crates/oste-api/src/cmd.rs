// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::API_VERSION;
use super::Direction;
use super::IfIndex;
use super::PortId;
use super::rewrite::MatchCondition;
use super::rewrite::RewriteOp;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt::Debug;
use serde::Deserialize;
use serde::Serialize;

pub const OSTE_IOC: u32 = 0x057e7700;
pub const OSTE_IOC_CMD: i32 = OSTE_IOC as i32 | 0x01;

/// The command discriminant carried in the ioctl envelope. The
/// command's actual request/response data travels separately, as
/// postcard-serialized bytes.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub enum OsteCmd {
    SetAction = 1,     // create/extend a policy action
    DeleteAction = 2,  // delete an unreferenced policy action
    AddRule = 3,       // add/extend a policy rule
    DeletePolicy = 4,  // delete an unbound policy
    Bind = 5,          // bind a policy to (interface, direction)
    Unbind = 6,        // unbind (interface, direction)
    DumpAction = 30,   // dump the named action
    DumpPolicy = 31,   // dump the named policy's rule table
    DumpBindings = 32, // dump all interface bindings
    DumpStats = 33,    // dump the node counters
}

impl TryFrom<i32> for OsteCmd {
    type Error = ();

    fn try_from(num: i32) -> Result<Self, Self::Error> {
        match num {
            1 => Ok(Self::SetAction),
            2 => Ok(Self::DeleteAction),
            3 => Ok(Self::AddRule),
            4 => Ok(Self::DeletePolicy),
            5 => Ok(Self::Bind),
            6 => Ok(Self::Unbind),
            30 => Ok(Self::DumpAction),
            31 => Ok(Self::DumpPolicy),
            32 => Ok(Self::DumpBindings),
            33 => Ok(Self::DumpStats),
            _ => Err(()),
        }
    }
}

/// Indicates that a command response has been written to the response
/// buffer (`resp_bytes`).
pub const OSTE_CMD_RESP_COPY_OUT: u64 = 0x1;

/// The ioctl argument passed when sending an [`OsteCmd`].
///
/// We need `repr(C)` for a stable layout across compilations. This is
/// a generic structure used to carry the various commands; the
/// command's actual request/response data is serialized/deserialized
/// by serde into the user supplied pointers in
/// `req_bytes`/`resp_bytes`.
#[derive(Debug)]
#[repr(C)]
pub struct OsteCmdIoctl {
    pub api_version: u64,
    pub cmd: OsteCmd,
    pub flags: u64,
    // Reserve some additional bytes in case we need them in the
    // future.
    pub reserved1: u64,
    pub req_bytes: *const u8,
    pub req_len: usize,
    pub resp_bytes: *mut u8,
    pub resp_len: usize,
    pub resp_len_actual: usize,
}

impl OsteCmdIoctl {
    pub fn cmd_err_resp(&self) -> Option<OsteError> {
        if self.has_cmd_resp() {
            // Safety: We know the resp_bytes point to a Vec and that
            // resp_len_actual is within range.
            let resp = unsafe {
                core::slice::from_raw_parts(
                    self.resp_bytes,
                    self.resp_len_actual,
                )
            };

            match postcard::from_bytes(resp) {
                Ok(cmd_err) => Some(cmd_err),
                Err(deser_err) => {
                    Some(OsteError::DeserCmdErr(deser_err.to_string()))
                }
            }
        } else {
            None
        }
    }

    fn has_cmd_resp(&self) -> bool {
        (self.flags & OSTE_CMD_RESP_COPY_OUT) != 0
    }

    /// Is this the expected API version?
    ///
    /// This is compiled twice: once for the client, again for the
    /// engine host. As long as we remember to update `API_VERSION`
    /// when making API changes, this method will return `false` when
    /// the two disagree.
    pub fn check_version(&self) -> bool {
        self.api_version == API_VERSION
    }
}

/// The errors a configuration command may return.
///
/// Per-packet outcomes (a rule not matching) are never errors; only
/// the control path speaks this type. Every variant carries enough
/// context (entity kind + name) for an operator to correct their
/// input.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OsteError {
    /// A rule referenced an action that does not exist. The action
    /// must be created before any rule may point at it.
    ActionNotFound(String),

    /// An action cannot be deleted while any policy rule references
    /// it.
    ActionInUse(String),

    PolicyNotFound(String),

    /// A policy cannot be deleted while any interface binding
    /// references it.
    PolicyInUse(String),

    RuleNotFound { policy: String, id: u8 },

    BadApiVersion { client: u64, engine: u64 },
    CopyinReq,
    CopyoutResp,
    DeserCmdErr(String),
    DeserCmdReq(String),

    /// The envelope has `req_len == 0` but the specified `cmd`
    /// expects a request body. This can happen either by developer
    /// error or a hand-rolled, negligent/malicious ioctl.
    NoRequestBody,

    RespTooLarge { needed: usize, given: usize },
    SerCmdErr(String),
    SerCmdResp(String),
}

/// A marker trait indicating a success response type that is returned
/// from a command and may be passed across the ioctl/API boundary.
pub trait CmdOk: Debug + Serialize {}

impl CmdOk for () {}

/// Indicates no meaningful response value on success.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NoResp {
    pub unused: u64,
}

impl CmdOk for NoResp {}

/// Create the named action if absent; append `op` to its rewrite
/// sequence when supplied; set its out-port override when supplied
/// (absence leaves the prior override untouched).
///
/// Appending is deliberately non-idempotent: issuing this command
/// twice layers two rewrites under the same action name.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SetActionReq {
    pub name: String,
    pub op: Option<RewriteOp>,
    pub out_port: Option<PortId>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeleteActionReq {
    pub name: String,
}

/// Create the named policy if absent and add/extend the rule at
/// `rule_id`. Repeated requests for the same (policy, id) accumulate
/// match conditions on the same rule. The named action must already
/// exist.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AddRuleReq {
    pub policy: String,
    pub rule_id: u8,
    pub condition: Option<MatchCondition>,
    pub action: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeletePolicyReq {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BindReq {
    pub if_index: IfIndex,
    pub direction: Direction,
    pub policy: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UnbindReq {
    pub if_index: IfIndex,
    pub direction: Direction,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpActionReq {
    pub name: String,
}

/// The response to a [`DumpActionReq`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpActionResp {
    pub name: String,
    /// The rewrite operations, in execution order.
    pub ops: Vec<RewriteOp>,
    pub out_port: Option<PortId>,
}

impl CmdOk for DumpActionResp {}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpPolicyReq {
    pub name: String,
}

/// The response to a [`DumpPolicyReq`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpPolicyResp {
    pub name: String,
    /// Number of allocated rule slots, tombstones included.
    pub slots: usize,
    /// The live rules, in slot order.
    pub rules: Vec<RuleDump>,
}

impl CmdOk for DumpPolicyResp {}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RuleDump {
    pub id: u8,
    pub conditions: Vec<String>,
    pub action: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpBindingsReq {
    pub unused: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpBindingsResp {
    pub bindings: Vec<BindingDump>,
}

impl CmdOk for DumpBindingsResp {}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BindingDump {
    pub if_index: IfIndex,
    pub direction: Direction,
    pub policy: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpStatsReq {
    pub unused: u64,
}

/// Counters for one direction of a node.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DirStats {
    /// Packets seen by the node.
    pub packets: u64,
    /// Packets for which a rule matched.
    pub matched: u64,
    /// Packets whose matched action applied cleanly.
    pub applied: u64,
    /// Packets whose destination was overridden by an action.
    pub redirected: u64,
    /// Packets dropped due to a rewrite bounds fault.
    pub faults: u64,
}

/// The full counter set for a node: one [`DirStats`] per direction.
/// `rx` corresponds to [`Direction::In`], `tx` to [`Direction::Out`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeStats {
    pub rx: DirStats,
    pub tx: DirStats,
}

impl NodeStats {
    pub fn dir(&self, dir: Direction) -> &DirStats {
        match dir {
            Direction::In => &self.rx,
            Direction::Out => &self.tx,
        }
    }

    pub fn dir_mut(&mut self, dir: Direction) -> &mut DirStats {
        match dir {
            Direction::In => &mut self.rx,
            Direction::Out => &mut self.tx,
        }
    }
}

impl CmdOk for NodeStats {}

#[cfg(test)]
mod test {
    use super::*;

    // The envelope bytes are produced by one side of the ioctl
    // boundary and consumed by the other, so the request types must
    // survive postcard intact.
    #[test]
    fn postcard_round_trip() {
        let req = SetActionReq {
            name: "a1".to_string(),
            op: Some(RewriteOp::Replace {
                offset: 0,
                bytes: vec![0xFF, 0xFF],
            }),
            out_port: Some(PortId(7)),
        };
        let bytes = postcard::to_allocvec(&req).unwrap();
        let back: SetActionReq = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back.name, "a1");
        assert_eq!(back.op, req.op);
        assert_eq!(back.out_port, Some(PortId(7)));

        let req = AddRuleReq {
            policy: "p1".to_string(),
            rule_id: 0,
            condition: Some(MatchCondition {
                offset: 12,
                bytes: vec![0x08],
            }),
            action: "a1".to_string(),
        };
        let bytes = postcard::to_allocvec(&req).unwrap();
        let back: AddRuleReq = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back.policy, "p1");
        assert_eq!(back.rule_id, 0);
        assert_eq!(back.condition, req.condition);

        let err = OsteError::ActionInUse("a1".to_string());
        let bytes = postcard::to_allocvec(&err).unwrap();
        let back: OsteError = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn cmd_from_i32() {
        assert!(matches!(OsteCmd::try_from(1), Ok(OsteCmd::SetAction)));
        assert!(matches!(OsteCmd::try_from(33), Ok(OsteCmd::DumpStats)));
        assert!(OsteCmd::try_from(99).is_err());
    }
}
