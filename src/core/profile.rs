//! Agent-to-account bindings (§3, §4.5)

use crate::core::id::{AccountId, AgentId, CredentialId};
use serde::{Deserialize, Serialize};

/// Restrictions narrowing an [`AccountBinding`]'s reach.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    /// If set, only these credentials within the bound account are
    /// reachable; otherwise every credential on the account is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ids: Option<Vec<CredentialId>>,
    /// Passed through to the Policy Engine as an implicit
    /// `action_restriction{read,list,get}` (§4.5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lease_ttl_ms: Option<i64>,
}

impl Restrictions {
    #[must_use]
    pub fn allows_credential(&self, id: CredentialId) -> bool {
        self.credential_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&id))
    }
}

/// An agent's binding to an account, granting reach over the account's
/// credentials (§4.5 tier 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBinding {
    pub account_id: AccountId,
    pub granted_at_ms: i64,
    pub granted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,
}

/// A permanent direct grant recorded on a profile (distinct from the
/// legacy per-credential `AccessGrant`; this is the profile-native form).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectGrant {
    pub credential_id: CredentialId,
    pub granted_at_ms: i64,
    pub granted_by: String,
}

/// Maps an agent to the accounts (and direct grants) it may use (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentialProfile {
    pub agent_id: AgentId,
    #[serde(default)]
    pub account_bindings: Vec<AccountBinding>,
    #[serde(default)]
    pub direct_grants: Vec<DirectGrant>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AgentCredentialProfile {
    #[must_use]
    pub fn new(agent_id: AgentId, now_ms: i64) -> Self {
        Self {
            agent_id,
            account_bindings: vec![],
            direct_grants: vec![],
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    #[must_use]
    pub fn binding_for(&self, account_id: AccountId) -> Option<&AccountBinding> {
        self.account_bindings
            .iter()
            .find(|b| b.account_id == account_id)
    }
}
