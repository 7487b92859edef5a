//! The Credential record (§3)
//!
//! A `Credential` never holds plaintext: `secretRef` is a key into the
//! store's envelope map (see [`crate::store`]), resolved only inside
//! [`crate::service::VaultService::checkout`].

use crate::core::id::{AccountId, AgentId, CredentialId};
use crate::core::lease::Lease;
use crate::core::rule::PermissionRule;
use crate::core::secret::SecretKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most recent usage entries kept per credential (§9: unbounded counter,
/// bounded history).
pub const MAX_USAGE_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AiProvider,
    ChannelBot,
    Service,
    BrowserProfile,
    CliTool,
    Custom,
}

/// A legacy direct-grant entry. Still honored (§4.5 tier 2) but superseded
/// by agent profile bindings for new integrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub agent_id: AgentId,
    pub granted_at_ms: i64,
    pub granted_by: String,
}

/// One entry in a credential's bounded usage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub at_ms: i64,
    pub agent_id: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// A named record describing one secret (§3).
///
/// The `id` is unique within the store; `secretRef` always has exactly one
/// corresponding envelope in the [`crate::store::StoreFile`]; `category` and
/// the decrypted [`crate::core::Secret`]'s variant are kept consistent with
/// `secret_kind` by every mutating [`crate::service::VaultService`] path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub category: Category,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_provider: Option<String>,
    pub secret_kind: SecretKind,

    pub secret_ref: String,

    #[serde(default)]
    pub access_grants: Vec<AccessGrant>,
    #[serde(default)]
    pub active_leases: Vec<Lease>,
    #[serde(default)]
    pub permission_rules: Vec<PermissionRule>,

    pub enabled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at_ms: Option<i64>,

    #[serde(default)]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_by_agent: Option<AgentId>,
    #[serde(default)]
    pub usage_history: Vec<UsageRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
}

impl Credential {
    /// Record a checkout: bumps `usageCount`, `lastUsedAtMs`,
    /// `lastUsedByAgent`, and appends to `usageHistory`, trimming it to
    /// [`MAX_USAGE_HISTORY`] most-recent entries.
    pub fn record_usage(&mut self, record: UsageRecord) {
        self.usage_count += 1;
        self.last_used_at_ms = Some(record.at_ms);
        self.last_used_by_agent = Some(record.agent_id.clone());
        self.usage_history.push(record);
        if self.usage_history.len() > MAX_USAGE_HISTORY {
            let excess = self.usage_history.len() - MAX_USAGE_HISTORY;
            self.usage_history.drain(0..excess);
        }
    }

    #[must_use]
    pub fn has_direct_grant(&self, agent_id: &AgentId) -> bool {
        self.access_grants.iter().any(|g| &g.agent_id == agent_id)
    }
}

/// Non-tag string metadata key/value pairs some callers attach to accounts;
/// re-exported here since `Account`/`Credential` both use plain maps.
pub type MetadataMap = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id::AgentId;

    fn sample() -> Credential {
        Credential {
            id: CredentialId::new(),
            name: "test".to_string(),
            description: None,
            tags: vec![],
            category: Category::Custom,
            provider: "custom".to_string(),
            detected_provider: None,
            secret_kind: SecretKind::ApiKey,
            secret_ref: "ref-1".to_string(),
            access_grants: vec![],
            active_leases: vec![],
            permission_rules: vec![],
            enabled: true,
            created_at_ms: 0,
            updated_at_ms: 0,
            expires_at_ms: None,
            validated_at_ms: None,
            usage_count: 0,
            last_used_at_ms: None,
            last_used_by_agent: None,
            usage_history: vec![],
            account_id: None,
        }
    }

    #[test]
    fn record_usage_bumps_counters() {
        let mut c = sample();
        c.record_usage(UsageRecord {
            at_ms: 100,
            agent_id: AgentId::new("a1").unwrap(),
            task_id: None,
            tool_name: None,
        });
        assert_eq!(c.usage_count, 1);
        assert_eq!(c.last_used_at_ms, Some(100));
        assert_eq!(c.usage_history.len(), 1);
    }

    #[test]
    fn usage_history_caps_at_fifty() {
        let mut c = sample();
        for i in 0..60 {
            c.record_usage(UsageRecord {
                at_ms: i,
                agent_id: AgentId::new("a1").unwrap(),
                task_id: None,
                tool_name: None,
            });
        }
        assert_eq!(c.usage_count, 60);
        assert_eq!(c.usage_history.len(), MAX_USAGE_HISTORY);
        assert_eq!(c.usage_history.first().unwrap().at_ms, 10);
    }

    #[test]
    fn has_direct_grant_checks_agent_id() {
        let mut c = sample();
        let agent = AgentId::new("a1").unwrap();
        assert!(!c.has_direct_grant(&agent));
        c.access_grants.push(AccessGrant {
            agent_id: agent.clone(),
            granted_at_ms: 0,
            granted_by: "admin".to_string(),
        });
        assert!(c.has_direct_grant(&agent));
    }
}
