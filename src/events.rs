//! Lifecycle events the vault emits through an injected broadcaster (§6)
//!
//! Delivery is best-effort and at-most-once from the vault's perspective;
//! a broadcaster MAY drop under backpressure. Broadcasting never blocks
//! the write lock — events are handed off after the critical section
//! that produced them commits (§5).

use crate::core::account::Account;
use crate::core::credential::Credential;
use crate::core::id::{AgentId, LeaseId};
use crate::core::profile::AgentCredentialProfile;
use async_trait::async_trait;
use serde::Serialize;

/// A named lifecycle event, carrying the affected record or a small
/// summary payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum VaultEvent {
    #[serde(rename = "credential.created")]
    CredentialCreated(Credential),
    #[serde(rename = "credential.updated")]
    CredentialUpdated(Credential),
    #[serde(rename = "credential.deleted")]
    CredentialDeleted { credential_id: String },
    #[serde(rename = "credential.rotated")]
    CredentialRotated { credential_id: String },
    #[serde(rename = "credential.lease.created")]
    LeaseCreated { credential_id: String, lease_id: LeaseId },
    #[serde(rename = "credential.lease.revoked")]
    LeaseRevoked { credential_id: String, lease_id: LeaseId },
    #[serde(rename = "credential.grant.added")]
    GrantAdded { credential_id: String, agent_id: AgentId },
    #[serde(rename = "credential.grant.revoked")]
    GrantRevoked { credential_id: String, agent_id: AgentId },
    #[serde(rename = "account.created")]
    AccountCreated(Account),
    #[serde(rename = "account.updated")]
    AccountUpdated(Account),
    #[serde(rename = "account.deleted")]
    AccountDeleted { account_id: String },
    #[serde(rename = "agent.profile.updated")]
    AgentProfileUpdated(AgentCredentialProfile),
}

/// Sink for vault lifecycle events, injected at construction (§6). The
/// vault never awaits a slow broadcaster while holding its write lock;
/// implementations should themselves be non-blocking (buffer, drop, or
/// hand off to a channel).
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast(&self, event: VaultEvent);
}

/// A broadcaster that discards every event. Used when the embedding
/// process has no interest in the event stream.
pub struct NullBroadcaster;

#[async_trait]
impl EventBroadcaster for NullBroadcaster {
    async fn broadcast(&self, _event: VaultEvent) {}
}
