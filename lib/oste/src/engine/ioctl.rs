// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The command surface.
//!
//! This is the entry point for all OSTE commands: it deserializes the
//! request bytes carried by the host's ioctl envelope, multiplexes
//! the command to its handler on the [`SteerNode`], and serializes
//! the success response back into bytes. The host side owns the raw
//! envelope (`OsteCmdIoctl`), the copyin/copyout, and the errno
//! mapping; nothing here touches a pointer.
//!
//! Command errors are values, not serialized here: the host
//! serializes the returned [`OsteError`] into the response buffer and
//! sets [`oste_api::OSTE_CMD_RESP_COPY_OUT`] so the client knows to
//! deserialize it.

use super::node::FeatureHook;
use super::node::SteerNode;
use alloc::string::ToString;
use alloc::vec::Vec;
use oste_api::AddRuleReq;
use oste_api::BindReq;
use oste_api::BindingDump;
use oste_api::CmdOk;
use oste_api::DeleteActionReq;
use oste_api::DeletePolicyReq;
use oste_api::DumpActionReq;
use oste_api::DumpActionResp;
use oste_api::DumpBindingsResp;
use oste_api::DumpPolicyReq;
use oste_api::DumpPolicyResp;
use oste_api::NoResp;
use oste_api::NodeStats;
use oste_api::OsteCmd;
use oste_api::OsteError;
use oste_api::RuleDump;
use oste_api::SetActionReq;
use oste_api::UnbindReq;
use serde::de::DeserializeOwned;

/// Deserialize a request body. An empty body is its own error so a
/// hand-rolled ioctl with a null request pointer is reported as such
/// rather than as a postcard failure.
fn copy_in_req<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, OsteError> {
    if bytes.is_empty() {
        return Err(OsteError::NoRequestBody);
    }

    postcard::from_bytes(bytes)
        .map_err(|e| OsteError::DeserCmdReq(e.to_string()))
}

fn copy_out_resp<T: CmdOk>(resp: &T) -> Result<Vec<u8>, OsteError> {
    postcard::to_allocvec(resp)
        .map_err(|e| OsteError::SerCmdResp(e.to_string()))
}

/// Multiplex one command to its handler and return the serialized
/// success response. The caller has already verified the envelope's
/// API version.
pub fn dispatch<H: FeatureHook>(
    node: &mut SteerNode<H>,
    cmd: OsteCmd,
    req_bytes: &[u8],
) -> Result<Vec<u8>, OsteError> {
    match cmd {
        OsteCmd::SetAction => {
            let resp = set_action_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::DeleteAction => {
            let resp = delete_action_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::AddRule => {
            let resp = add_rule_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::DeletePolicy => {
            let resp = delete_policy_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::Bind => {
            let resp = bind_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::Unbind => {
            let resp = unbind_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::DumpAction => {
            let resp = dump_action_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::DumpPolicy => {
            let resp = dump_policy_hdlr(node, req_bytes)?;
            copy_out_resp(&resp)
        }

        OsteCmd::DumpBindings => {
            let resp = dump_bindings_hdlr(node);
            copy_out_resp(&resp)
        }

        OsteCmd::DumpStats => {
            let resp = dump_stats_hdlr(node);
            copy_out_resp(&resp)
        }
    }
}

fn set_action_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: SetActionReq = copy_in_req(bytes)?;
    node.set_action(&req.name, req.op, req.out_port);
    Ok(NoResp::default())
}

fn delete_action_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: DeleteActionReq = copy_in_req(bytes)?;
    node.delete_action(&req.name)?;
    Ok(NoResp::default())
}

fn add_rule_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: AddRuleReq = copy_in_req(bytes)?;
    node.add_rule(&req.policy, req.rule_id, req.condition, &req.action)?;
    Ok(NoResp::default())
}

fn delete_policy_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: DeletePolicyReq = copy_in_req(bytes)?;
    node.delete_policy(&req.name)?;
    Ok(NoResp::default())
}

fn bind_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: BindReq = copy_in_req(bytes)?;

    // The engine treats an unknown policy as a silent no-op; the
    // command surface is where the operator's typo gets caught.
    if node.policies().id(&req.policy).is_none() {
        return Err(OsteError::PolicyNotFound(req.policy));
    }

    node.bind(req.if_index, req.direction, &req.policy);
    Ok(NoResp::default())
}

fn unbind_hdlr<H: FeatureHook>(
    node: &mut SteerNode<H>,
    bytes: &[u8],
) -> Result<NoResp, OsteError> {
    let req: UnbindReq = copy_in_req(bytes)?;
    node.unbind(req.if_index, req.direction);
    Ok(NoResp::default())
}

fn dump_action_hdlr<H: FeatureHook>(
    node: &SteerNode<H>,
    bytes: &[u8],
) -> Result<DumpActionResp, OsteError> {
    let req: DumpActionReq = copy_in_req(bytes)?;
    let Some(action) = node.action(&req.name) else {
        return Err(OsteError::ActionNotFound(req.name));
    };

    Ok(DumpActionResp {
        name: req.name,
        ops: action.ops().to_vec(),
        out_port: action.out_port(),
    })
}

fn dump_policy_hdlr<H: FeatureHook>(
    node: &SteerNode<H>,
    bytes: &[u8],
) -> Result<DumpPolicyResp, OsteError> {
    let req: DumpPolicyReq = copy_in_req(bytes)?;
    let Some(policy) = node.policies().get(&req.name) else {
        return Err(OsteError::PolicyNotFound(req.name));
    };

    let rules = policy
        .rules()
        .map(|(id, rule)| RuleDump {
            id,
            conditions: rule
                .conditions()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            action: action_name(node, rule.action()),
        })
        .collect();

    Ok(DumpPolicyResp { name: req.name, slots: policy.rule_count(), rules })
}

fn dump_bindings_hdlr<H: FeatureHook>(
    node: &SteerNode<H>,
) -> DumpBindingsResp {
    let bindings = node
        .bindings()
        .iter()
        .map(|(if_index, direction, pid)| BindingDump {
            if_index,
            direction,
            policy: node
                .policies()
                .by_id(pid)
                .map(|p| p.name().to_string())
                .unwrap_or_else(|| pid.to_string()),
        })
        .collect();

    DumpBindingsResp { bindings }
}

fn dump_stats_hdlr<H: FeatureHook>(node: &SteerNode<H>) -> NodeStats {
    *node.stats()
}

fn action_name<H: FeatureHook>(
    node: &SteerNode<H>,
    id: super::action::ActionId,
) -> alloc::string::String {
    node.actions()
        .by_id(id)
        .map(|a| a.name().to_string())
        .unwrap_or_else(|| id.to_string())
}
