//! Create/revoke/consume/expire leases across a store's credentials (§4.4)
//!
//! Free functions operating on borrowed `Credential` slices rather than a
//! stateful manager: the Vault Service owns the credential list and the
//! write lock around it, so these stay simple mutation helpers applied
//! under that lock.

use crate::core::credential::Credential;
use crate::core::id::{CredentialId, LeaseId, TaskId};
use crate::core::lease::{CreateLeaseInput, Lease};

/// Create a lease on `credential` and append it to `activeLeases`.
pub fn create(credential: &mut Credential, input: CreateLeaseInput, now_ms: i64) -> Lease {
    let lease = Lease::new(input, now_ms);
    credential.active_leases.push(lease.clone());
    lease
}

/// Revoke the lease with `lease_id`, wherever it lives among `credentials`.
/// Idempotent: revoking an already-revoked lease still returns the owning
/// credential's id. Returns `None` if no credential carries this lease.
pub fn revoke_by_id(
    credentials: &mut [Credential],
    lease_id: LeaseId,
    now_ms: i64,
) -> Option<CredentialId> {
    for credential in credentials.iter_mut() {
        if let Some(lease) = credential
            .active_leases
            .iter_mut()
            .find(|l| l.lease_id == lease_id)
        {
            lease.revoke(now_ms);
            return Some(credential.id);
        }
    }
    None
}

/// Revoke every active lease for `task_id`, across all credentials.
/// Returns the `(credential_id, lease_id)` pairs actually revoked
/// (already-revoked leases don't count again), for audit-event emission.
pub fn revoke_by_task(
    credentials: &mut [Credential],
    task_id: &TaskId,
    now_ms: i64,
) -> Vec<(CredentialId, LeaseId)> {
    let mut revoked = Vec::new();
    for credential in credentials.iter_mut() {
        for lease in &mut credential.active_leases {
            if &lease.task_id == task_id && lease.revoked_at_ms.is_none() {
                lease.revoke(now_ms);
                revoked.push((credential.id, lease.lease_id));
            }
        }
    }
    revoked
}

/// Scan all credentials and revoke any lease whose `expiresAtMs` has
/// passed. Run periodically by the expiry tick (§4.4); returns the count
/// newly revoked so the caller can log it.
pub fn expire_due(credentials: &mut [Credential], now_ms: i64) -> usize {
    let mut expired = 0;
    for credential in credentials.iter_mut() {
        for lease in &mut credential.active_leases {
            if lease.revoked_at_ms.is_none() && now_ms >= lease.expires_at_ms {
                lease.revoke(now_ms);
                expired += 1;
            }
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credential::Category;
    use crate::core::id::{AgentId, CredentialId};
    use crate::core::secret::SecretKind;

    fn blank_credential() -> Credential {
        Credential {
            id: CredentialId::new(),
            name: "c".to_string(),
            description: None,
            tags: vec![],
            category: Category::Custom,
            provider: "custom".to_string(),
            detected_provider: None,
            secret_kind: SecretKind::ApiKey,
            secret_ref: "ref".to_string(),
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

    fn input(task: &str, ttl_ms: Option<i64>) -> CreateLeaseInput {
        CreateLeaseInput {
            credential_id: CredentialId::new(),
            task_id: TaskId::new(task).unwrap(),
            agent_id: AgentId::new("a1").unwrap(),
            ttl_ms,
            max_uses: None,
        }
    }

    #[test]
    fn create_appends_to_active_leases() {
        let mut c = blank_credential();
        create(&mut c, input("t1", None), 0);
        assert_eq!(c.active_leases.len(), 1);
    }

    #[test]
    fn revoke_by_id_is_idempotent() {
        let mut c = blank_credential();
        let lease = create(&mut c, input("t1", None), 0);
        let mut creds = vec![c];
        assert!(revoke_by_id(&mut creds, lease.lease_id, 10).is_some());
        assert!(revoke_by_id(&mut creds, lease.lease_id, 20).is_some());
        assert_eq!(creds[0].active_leases[0].revoked_at_ms, Some(10));
    }

    #[test]
    fn revoke_by_id_returns_none_for_unknown_lease() {
        let mut creds = vec![blank_credential()];
        assert!(revoke_by_id(&mut creds, LeaseId::new(), 0).is_none());
    }

    #[test]
    fn revoke_by_task_counts_only_matching_active_leases() {
        let mut c1 = blank_credential();
        let mut c2 = blank_credential();
        create(&mut c1, input("T1", None), 0);
        create(&mut c1, input("T2", None), 0);
        create(&mut c2, input("T1", None), 0);
        let mut creds = vec![c1, c2];
        let revoked = revoke_by_task(&mut creds, &TaskId::new("T1").unwrap(), 100);
        assert_eq!(revoked.len(), 2);
    }

    #[test]
    fn expire_due_revokes_only_past_expiry() {
        let mut c = blank_credential();
        create(&mut c, input("t1", Some(1_000)), 0);
        create(&mut c, input("t2", Some(10_000)), 0);
        let mut creds = vec![c];
        let count = expire_due(&mut creds, 5_000);
        assert_eq!(count, 1);
        assert!(creds[0].active_leases[0].revoked_at_ms.is_some());
        assert!(creds[0].active_leases[1].revoked_at_ms.is_none());
    }
}
