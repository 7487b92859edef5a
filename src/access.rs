//! The Access Resolver: lease ∪ grant ∪ profile binding (§4.5)

use crate::core::credential::Credential;
use crate::core::id::{AgentId, LeaseId, TaskId};
use crate::core::profile::AgentCredentialProfile;

/// How an agent was authorized to check out a credential. Carried forward
/// so the caller (Vault Service) knows whether to pass an implicit
/// read-only restriction into the Policy Engine (§4.5 tier 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessBasis {
    Lease { lease_id: LeaseId },
    Grant,
    Profile { read_only: bool },
}

/// Decide whether `agent_id` may check out `credential`, in priority
/// order: active lease (consumed on match), direct grant, profile
/// binding. Returns `None` if no basis authorizes access.
///
/// Takes `credential` mutably because a matching lease is consumed
/// (§4.4) as a side effect of being selected as the basis for access.
pub fn resolve(
    credential: &mut Credential,
    profile: Option<&AgentCredentialProfile>,
    agent_id: &AgentId,
    task_id: Option<&TaskId>,
    now_ms: i64,
) -> Option<AccessBasis> {
    if let Some(lease) = credential.active_leases.iter_mut().find(|l| {
        &l.agent_id == agent_id && l.is_active(now_ms) && task_id.is_none_or(|t| &l.task_id == t)
    }) {
        let lease_id = lease.lease_id;
        lease.consume(now_ms);
        return Some(AccessBasis::Lease { lease_id });
    }

    if credential.has_direct_grant(agent_id) {
        return Some(AccessBasis::Grant);
    }

    let account_id = credential.account_id?;
    let binding = profile?.binding_for(account_id)?;
    let restrictions = binding.restrictions.as_ref();
    if !restrictions.is_none_or(|r| r.allows_credential(credential.id)) {
        return None;
    }
    let read_only = restrictions.and_then(|r| r.read_only).unwrap_or(false);
    Some(AccessBasis::Profile { read_only })
}

/// Non-mutating visibility check used by `VaultService::list`'s `agent_id`
/// filter: same three tiers as [`resolve`], but a matching lease is not
/// consumed — listing is a read, not a checkout.
#[must_use]
pub fn can_see(
    credential: &Credential,
    profile: Option<&AgentCredentialProfile>,
    agent_id: &AgentId,
    now_ms: i64,
) -> bool {
    let has_lease = credential
        .active_leases
        .iter()
        .any(|l| &l.agent_id == agent_id && l.is_active(now_ms));
    if has_lease || credential.has_direct_grant(agent_id) {
        return true;
    }
    let Some(account_id) = credential.account_id else {
        return false;
    };
    let Some(binding) = profile.and_then(|p| p.binding_for(account_id)) else {
        return false;
    };
    binding
        .restrictions
        .as_ref()
        .is_none_or(|r| r.allows_credential(credential.id))
}
