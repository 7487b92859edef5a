//! Time- and use-bounded ephemeral grants (§3, §4.4)

use crate::core::id::{AgentId, CredentialId, LeaseId, TaskId};
use serde::{Deserialize, Serialize};

/// Default lease time-to-live: one hour.
pub const DEFAULT_TTL_MS: i64 = 3_600_000;

/// Inputs to [`crate::lease_manager::LeaseManager::create`].
#[derive(Debug, Clone)]
pub struct CreateLeaseInput {
    pub credential_id: CredentialId,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub ttl_ms: Option<i64>,
    pub max_uses: Option<u32>,
}

/// A time- and optionally use-bounded permission tied to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub lease_id: LeaseId,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub credential_id: CredentialId,
    pub granted_at_ms: i64,
    pub expires_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses_remaining: Option<u32>,
}

impl Lease {
    pub fn new(input: CreateLeaseInput, now_ms: i64) -> Self {
        let ttl = input.ttl_ms.unwrap_or(DEFAULT_TTL_MS);
        Self {
            lease_id: LeaseId::new(),
            task_id: input.task_id,
            agent_id: input.agent_id,
            credential_id: input.credential_id,
            granted_at_ms: now_ms,
            expires_at_ms: now_ms + ttl,
            revoked_at_ms: None,
            max_uses: input.max_uses,
            uses_remaining: input.max_uses,
        }
    }

    /// A lease is active iff not revoked, not expired, and (if use-bounded)
    /// still has uses remaining.
    #[must_use]
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.revoked_at_ms.is_none()
            && now_ms < self.expires_at_ms
            && self.uses_remaining.is_none_or(|n| n > 0)
    }

    pub fn revoke(&mut self, now_ms: i64) {
        if self.revoked_at_ms.is_none() {
            self.revoked_at_ms = Some(now_ms);
        }
    }

    /// Consume a single use. If the lease is use-bounded and this exhausts
    /// it, mark it revoked at `now_ms`.
    pub fn consume(&mut self, now_ms: i64) {
        if let Some(remaining) = self.uses_remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.revoked_at_ms = Some(now_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(ttl_ms: Option<i64>, max_uses: Option<u32>) -> CreateLeaseInput {
        CreateLeaseInput {
            credential_id: CredentialId::new(),
            task_id: TaskId::new("t1").unwrap(),
            agent_id: AgentId::new("a1").unwrap(),
            ttl_ms,
            max_uses,
        }
    }

    #[test]
    fn new_lease_defaults_ttl_to_one_hour() {
        let lease = Lease::new(input(None, None), 1_000);
        assert_eq!(lease.expires_at_ms, 1_000 + DEFAULT_TTL_MS);
    }

    #[test]
    fn lease_is_active_before_expiry() {
        let lease = Lease::new(input(Some(60_000), None), 1_000);
        assert!(lease.is_active(1_500));
        assert!(!lease.is_active(61_001));
    }

    #[test]
    fn revoke_is_idempotent() {
        let mut lease = Lease::new(input(None, None), 0);
        lease.revoke(100);
        lease.revoke(200);
        assert_eq!(lease.revoked_at_ms, Some(100));
    }

    #[test]
    fn consume_exhausts_use_bounded_lease() {
        let mut lease = Lease::new(input(None, Some(1)), 0);
        assert!(lease.is_active(0));
        lease.consume(10);
        assert_eq!(lease.uses_remaining, Some(0));
        assert!(!lease.is_active(10));
    }

    #[test]
    fn consume_is_a_noop_for_unbounded_leases() {
        let mut lease = Lease::new(input(None, None), 0);
        lease.consume(10);
        assert!(lease.is_active(10));
    }
}
