//! The Vault Service: orchestration, write-lock, and public API (§4.6)
//!
//! `VaultService` is the only component that touches [`crate::store`]
//! directly. Every mutating operation follows the same shape: lock
//! `Inner`, snapshot the current `StoreFile`, mutate the in-memory copy,
//! persist, and on persist failure revert to the snapshot before
//! returning the error (§7) — so a crash mid-write never leaves callers
//! looking at state the disk doesn't actually hold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::access::{self, AccessBasis};
use crate::core::account::{Account, AccountProvider};
use crate::core::context::AccessContext;
use crate::core::credential::{AccessGrant, Category, Credential, UsageRecord};
use crate::core::error::{VaultError, VaultResult};
use crate::core::id::{AccountId, AgentId, CredentialId, LeaseId, TaskId};
use crate::core::lease::CreateLeaseInput;
use crate::core::profile::{AccountBinding, AgentCredentialProfile, Restrictions};
use crate::core::rule::{CompiledConstraint, PermissionRule};
use crate::core::secret::{Secret, SecretKind};
use crate::core::secure::Passphrase;
use crate::core::CredentialListFilter;
use crate::crypto::{self, EncryptedEnvelope, MASTER_KEY_CHECK_PROBE};
use crate::events::{EventBroadcaster, NullBroadcaster, VaultEvent};
use crate::lease_manager;
use crate::policy::{self, UsageWindow};
use crate::service::config::VaultConfig;
use crate::store::{FileStore, StoreFile};
use crate::utils::unix_now_ms;

/// A single checkout-count entry kept for the rate-limit constraint's
/// trailing window (§9, §16). Bounded by the largest window any compiled
/// constraint asks about (one hour); older entries are pruned lazily on
/// the next checkout rather than by a background sweep, since the ring is
/// tiny compared to the credential list itself.
struct UsageEntry {
    credential_id: CredentialId,
    agent_id: AgentId,
    at_ms: i64,
}

/// In-memory ring backing [`policy::UsageWindow`]. Deliberately not part
/// of the persisted [`StoreFile`]: rate-limit state resets across process
/// restarts, since it is a live enforcement window rather than a durable
/// audit trail (the audit trail is the event stream plus
/// `Credential::usage_history`).
#[derive(Default)]
struct UsageRing {
    entries: Vec<UsageEntry>,
}

const USAGE_RING_HORIZON_MS: i64 = 3_600_000;

impl UsageRing {
    fn record(&mut self, credential_id: CredentialId, agent_id: AgentId, at_ms: i64) {
        self.entries.push(UsageEntry {
            credential_id,
            agent_id,
            at_ms,
        });
        self.entries.retain(|e| at_ms - e.at_ms <= USAGE_RING_HORIZON_MS);
    }
}

impl UsageWindow for UsageRing {
    fn count_in_last_minute(&self, credential_id: CredentialId, agent_id: &AgentId, now_ms: i64) -> u32 {
        self.count_since(credential_id, agent_id, now_ms, 60_000)
    }

    fn count_in_last_hour(&self, credential_id: CredentialId, agent_id: &AgentId, now_ms: i64) -> u32 {
        self.count_since(credential_id, agent_id, now_ms, USAGE_RING_HORIZON_MS)
    }
}

impl UsageRing {
    fn count_since(&self, credential_id: CredentialId, agent_id: &AgentId, now_ms: i64, window_ms: i64) -> u32 {
        u32::try_from(
            self.entries
                .iter()
                .filter(|e| {
                    e.credential_id == credential_id
                        && &e.agent_id == agent_id
                        && now_ms - e.at_ms <= window_ms
                })
                .count(),
        )
        .unwrap_or(u32::MAX)
    }
}

/// Fields for creating a new [`Credential`] (§4.6).
pub struct CreateCredentialInput {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Category,
    pub provider: String,
    pub detected_provider: Option<String>,
    pub secret: Secret,
    pub account_id: Option<AccountId>,
}

/// Sparse patch applied by [`VaultService::update`]; `None` fields leave
/// the existing value untouched (§4.6).
#[derive(Default)]
pub struct CredentialPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Category>,
    pub provider: Option<String>,
    pub detected_provider: Option<Option<String>>,
    pub expires_at_ms: Option<Option<i64>>,
}

/// Sparse patch applied by [`VaultService::update_account`].
#[derive(Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub icon: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<HashMap<String, String>>,
}

/// The outcome of a successful [`VaultService::checkout`]: the decrypted
/// secret plus the basis that authorized it, so callers can tell a
/// human-approved grant from an agent-profile binding if they care.
pub struct CheckoutOutcome {
    pub secret: Secret,
    pub basis: AccessBasis,
}

struct Inner {
    store: FileStore,
    file: StoreFile,
    passphrase: Passphrase,
    usage: UsageRing,
}

/// The credential vault: a single encrypted store file, mediating every
/// agent's access to the secrets inside it (§2).
///
/// Cloning a `VaultService` is cheap and shares the same underlying
/// store and write lock (§5: exactly one writer at a time per store,
/// enforced by an in-process `tokio::sync::Mutex` in addition to the
/// cross-process file lock `FileStore` already holds).
#[derive(Clone)]
pub struct VaultService {
    inner: Arc<Mutex<Inner>>,
    broadcaster: Arc<dyn EventBroadcaster>,
    tick_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl VaultService {
    /// Open (or initialize) the store at `config.store_path` under
    /// `passphrase`. On first use this creates a fresh store file sealing
    /// [`MASTER_KEY_CHECK_PROBE`] under the passphrase; on subsequent
    /// opens the probe is decrypted and compared to prove the passphrase
    /// is correct before any credential is touched (§4.1, §4.2).
    pub async fn init(config: VaultConfig, passphrase: Passphrase) -> VaultResult<Self> {
        Self::builder(config, passphrase).build().await
    }

    /// Start building a `VaultService` with a non-default broadcaster.
    #[must_use]
    pub fn builder(config: VaultConfig, passphrase: Passphrase) -> VaultServiceBuilder {
        VaultServiceBuilder {
            config,
            passphrase,
            broadcaster: Arc::new(NullBroadcaster),
        }
    }

    async fn open(config: VaultConfig, passphrase: Passphrase, broadcaster: Arc<dyn EventBroadcaster>) -> VaultResult<Self> {
        if passphrase.is_empty() {
            return Err(VaultError::InvalidInput("passphrase must not be empty".to_string()));
        }
        let store = FileStore::open(&config.store_path)?;
        let file = match store.load()? {
            Some(file) => {
                let opened = crypto::open(&passphrase, &file.master_key_check)
                    .map_err(|_| VaultError::WrongKey)?;
                if opened != MASTER_KEY_CHECK_PROBE {
                    return Err(VaultError::WrongKey);
                }
                file
            }
            None => {
                let probe = crypto::seal(&passphrase, MASTER_KEY_CHECK_PROBE)?;
                let fresh = StoreFile::fresh(probe);
                store.save(&fresh)?;
                info!(path = %store.path().display(), "initialized new vault store");
                fresh
            }
        };

        let service = Self {
            inner: Arc::new(Mutex::new(Inner {
                store,
                file,
                passphrase,
                usage: UsageRing::default(),
            })),
            broadcaster,
            tick_handle: Arc::new(Mutex::new(None)),
        };
        service.spawn_expiry_tick(config.expiry_tick_interval).await;
        Ok(service)
    }

    /// Spawns the tick as a detached task holding only a [`Weak`] handle
    /// to `Inner`, so a `VaultService` that is merely dropped (never
    /// `close()`d) lets the tick notice the last strong `Arc` is gone and
    /// exit on its own, instead of keeping `Inner` — and the `FileStore`
    /// flock and the passphrase inside it — alive forever (§5).
    async fn spawn_expiry_tick(&self, interval: Duration) {
        let weak_inner = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let Some(inner) = weak_inner.upgrade() else {
                    break;
                };
                if let Err(err) = Self::expire_leases_in(&inner).await {
                    warn!(error = %err, "expiry tick failed, will retry next interval");
                }
            }
        });
        *self.tick_handle.lock().await = Some(handle);
    }

    /// Stop the background expiry tick and drop the in-memory passphrase.
    /// The service is unusable afterward; construct a new one to resume.
    pub async fn close(self) {
        if let Some(handle) = self.tick_handle.lock().await.take() {
            handle.abort();
        }
        // Dropping `inner`'s last `Arc` reference zeroizes the passphrase
        // via `Passphrase`'s `ZeroizeOnDrop` impl.
    }

    async fn kdf_seal(&self, passphrase: Passphrase, plaintext: Vec<u8>) -> VaultResult<EncryptedEnvelope> {
        tokio::task::spawn_blocking(move || crypto::seal(&passphrase, &plaintext))
            .await
            .map_err(|e| VaultError::Corrupt(format!("seal task panicked: {e}")))?
            .map_err(VaultError::from)
    }

    async fn kdf_open(&self, passphrase: Passphrase, envelope: EncryptedEnvelope) -> VaultResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || crypto::open(&passphrase, &envelope))
            .await
            .map_err(|e| VaultError::Corrupt(format!("open task panicked: {e}")))?
            .map_err(VaultError::from)
    }

    /// Persist `guard.file`, reverting `guard.file` to `snapshot` on
    /// failure so the in-memory state never drifts from disk (§7).
    fn commit(guard: &mut Inner, snapshot: StoreFile) -> VaultResult<()> {
        match guard.store.save(&guard.file) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(error = %err, "persist failed, reverting in-memory state");
                guard.file = snapshot;
                Err(VaultError::from(err))
            }
        }
    }

    fn find_credential_index(file: &StoreFile, id: CredentialId) -> VaultResult<usize> {
        file.credentials
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| VaultError::not_found("credential", id.to_string()))
    }

    fn find_account_index(file: &StoreFile, id: AccountId) -> VaultResult<usize> {
        file.accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| VaultError::not_found("account", id.to_string()))
    }

    fn profile_index_or_insert(file: &mut StoreFile, agent_id: &AgentId, now_ms: i64) -> usize {
        if let Some(idx) = file.agent_profiles.iter().position(|p| &p.agent_id == agent_id) {
            idx
        } else {
            file.agent_profiles
                .push(AgentCredentialProfile::new(agent_id.clone(), now_ms));
            file.agent_profiles.len() - 1
        }
    }

    // -- Credential lifecycle (§4.6) -----------------------------------

    pub async fn create(&self, input: CreateCredentialInput) -> VaultResult<Credential> {
        let now_ms = unix_now_ms();
        let secret_kind = input.secret.kind();
        let secret_ref = CredentialId::new().to_string();
        let plaintext = serde_json::to_vec(&input.secret)
            .map_err(|e| VaultError::InvalidInput(format!("secret did not serialize: {e}")))?;

        let mut guard = self.inner.lock().await;
        let envelope = self.kdf_seal(guard.passphrase.clone(), plaintext).await?;
        let snapshot = guard.file.clone();

        let credential = Credential {
            id: CredentialId::new(),
            name: input.name,
            description: input.description,
            tags: input.tags,
            category: input.category,
            provider: input.provider,
            detected_provider: input.detected_provider,
            secret_kind,
            secret_ref: secret_ref.clone(),
            access_grants: Vec::new(),
            active_leases: Vec::new(),
            permission_rules: Vec::new(),
            enabled: true,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            expires_at_ms: None,
            validated_at_ms: None,
            usage_count: 0,
            last_used_at_ms: None,
            last_used_by_agent: None,
            usage_history: Vec::new(),
            account_id: input.account_id,
        };

        guard.file.secrets.insert(secret_ref, envelope);
        guard.file.credentials.push(credential.clone());
        if let Some(account_id) = credential.account_id {
            if let Ok(idx) = Self::find_account_index(&guard.file, account_id) {
                guard.file.accounts[idx].attach_credential(credential.id);
            }
        }

        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        info!(credential_id = %credential.id, "credential created");
        self.broadcaster.broadcast(VaultEvent::CredentialCreated(credential.clone())).await;
        Ok(credential)
    }

    pub async fn get(&self, id: CredentialId) -> VaultResult<Credential> {
        let guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        Ok(guard.file.credentials[idx].clone())
    }

    /// List credentials matching `filter` (§4.6). When `filter.agent_id`
    /// is set, only credentials that agent can see via grant, active
    /// lease, or profile binding are returned — this is a read, so a
    /// matching lease is never consumed ([`access::can_see`]).
    pub async fn list(&self, filter: &CredentialListFilter) -> Vec<Credential> {
        let guard = self.inner.lock().await;
        let now_ms = unix_now_ms();
        let profile = filter
            .agent_id
            .as_ref()
            .and_then(|agent_id| guard.file.agent_profiles.iter().find(|p| &p.agent_id == agent_id));

        let mut results: Vec<Credential> = guard
            .file
            .credentials
            .iter()
            .filter(|c| filter.category.is_none_or(|cat| c.category == cat))
            .filter(|c| filter.provider.as_deref().is_none_or(|p| c.provider == p))
            .filter(|c| filter.enabled.is_none_or(|e| c.enabled == e))
            .filter(|c| filter.account_id.is_none_or(|a| c.account_id == Some(a)))
            .filter(|c| {
                filter
                    .agent_id
                    .as_ref()
                    .is_none_or(|agent_id| access::can_see(c, profile, agent_id, now_ms))
            })
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    pub async fn update(&self, id: CredentialId, patch: CredentialPatch) -> VaultResult<Credential> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        let snapshot = guard.file.clone();

        let now_ms = unix_now_ms();
        let credential = &mut guard.file.credentials[idx];
        if let Some(name) = patch.name {
            credential.name = name;
        }
        if let Some(description) = patch.description {
            credential.description = description;
        }
        if let Some(tags) = patch.tags {
            credential.tags = tags;
        }
        if let Some(category) = patch.category {
            credential.category = category;
        }
        if let Some(provider) = patch.provider {
            credential.provider = provider;
        }
        if let Some(detected_provider) = patch.detected_provider {
            credential.detected_provider = detected_provider;
        }
        if let Some(expires_at_ms) = patch.expires_at_ms {
            credential.expires_at_ms = expires_at_ms;
        }
        credential.updated_at_ms = now_ms;
        let updated = credential.clone();

        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::CredentialUpdated(updated.clone())).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: CredentialId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        let snapshot = guard.file.clone();

        let credential = guard.file.credentials.remove(idx);
        guard.file.secrets.remove(&credential.secret_ref);
        if let Some(account_id) = credential.account_id {
            if let Ok(aidx) = Self::find_account_index(&guard.file, account_id) {
                guard.file.accounts[aidx].detach_credential(credential.id);
            }
        }

        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        info!(credential_id = %id, "credential deleted");
        self.broadcaster
            .broadcast(VaultEvent::CredentialDeleted {
                credential_id: id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Replace a credential's secret with `new_secret`, sealing it under
    /// a freshly allocated `secretRef` and discarding the old envelope
    /// (§4.6 rotate). `secretKind` is updated to match if the new
    /// secret's tag differs.
    pub async fn rotate_secret(&self, id: CredentialId, new_secret: Secret) -> VaultResult<Credential> {
        let plaintext = serde_json::to_vec(&new_secret)
            .map_err(|e| VaultError::InvalidInput(format!("secret did not serialize: {e}")))?;
        let mut guard = self.inner.lock().await;
        Self::find_credential_index(&guard.file, id)?;
        let envelope = self.kdf_seal(guard.passphrase.clone(), plaintext).await?;
        let snapshot = guard.file.clone();

        let idx = Self::find_credential_index(&guard.file, id)?;
        let old_ref = guard.file.credentials[idx].secret_ref.clone();
        let new_ref = CredentialId::new().to_string();
        guard.file.secrets.insert(new_ref.clone(), envelope);
        guard.file.secrets.remove(&old_ref);

        let now_ms = unix_now_ms();
        let credential = &mut guard.file.credentials[idx];
        credential.secret_ref = new_ref;
        credential.secret_kind = new_secret.kind();
        credential.updated_at_ms = now_ms;
        credential.validated_at_ms = None;
        let updated = credential.clone();

        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        info!(credential_id = %id, "secret rotated");
        self.broadcaster
            .broadcast(VaultEvent::CredentialRotated {
                credential_id: id.to_string(),
            })
            .await;
        Ok(updated)
    }

    async fn set_enabled(&self, id: CredentialId, enabled: bool) -> VaultResult<Credential> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        let snapshot = guard.file.clone();
        guard.file.credentials[idx].enabled = enabled;
        guard.file.credentials[idx].updated_at_ms = unix_now_ms();
        let updated = guard.file.credentials[idx].clone();
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::CredentialUpdated(updated.clone())).await;
        Ok(updated)
    }

    pub async fn enable(&self, id: CredentialId) -> VaultResult<Credential> {
        self.set_enabled(id, true).await
    }

    pub async fn disable(&self, id: CredentialId) -> VaultResult<Credential> {
        self.set_enabled(id, false).await
    }

    // -- Access grants (§4.6, legacy tier-2) ---------------------------

    pub async fn grant_access(&self, id: CredentialId, agent_id: AgentId, granted_by: impl Into<String>) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        if !guard.file.credentials[idx].has_direct_grant(&agent_id) {
            guard.file.credentials[idx].access_grants.push(AccessGrant {
                agent_id: agent_id.clone(),
                granted_at_ms: now_ms,
                granted_by: granted_by.into(),
            });
        }
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster
            .broadcast(VaultEvent::GrantAdded {
                credential_id: id.to_string(),
                agent_id,
            })
            .await;
        Ok(())
    }

    pub async fn revoke_access(&self, id: CredentialId, agent_id: AgentId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, id)?;
        let snapshot = guard.file.clone();
        guard.file.credentials[idx]
            .access_grants
            .retain(|g| g.agent_id != agent_id);
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster
            .broadcast(VaultEvent::GrantRevoked {
                credential_id: id.to_string(),
                agent_id,
            })
            .await;
        Ok(())
    }

    // -- Leases (§4.4, §4.6) --------------------------------------------

    pub async fn create_lease(
        &self,
        credential_id: CredentialId,
        task_id: TaskId,
        agent_id: AgentId,
        ttl_ms: Option<i64>,
        max_uses: Option<u32>,
    ) -> VaultResult<crate::core::lease::Lease> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, credential_id)?;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let lease = lease_manager::create(
            &mut guard.file.credentials[idx],
            CreateLeaseInput {
                credential_id,
                task_id,
                agent_id,
                ttl_ms,
                max_uses,
            },
            now_ms,
        );
        Self::commit(&mut guard, snapshot)?;
        let lease_id = lease.lease_id;
        drop(guard);
        self.broadcaster
            .broadcast(VaultEvent::LeaseCreated {
                credential_id: credential_id.to_string(),
                lease_id,
            })
            .await;
        Ok(lease)
    }

    pub async fn revoke_lease(&self, lease_id: LeaseId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let found = lease_manager::revoke_by_id(&mut guard.file.credentials, lease_id, now_ms);
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        if let Some(credential_id) = found {
            self.broadcaster
                .broadcast(VaultEvent::LeaseRevoked {
                    credential_id: credential_id.to_string(),
                    lease_id,
                })
                .await;
        }
        Ok(())
    }

    pub async fn revoke_task_leases(&self, task_id: &TaskId) -> VaultResult<usize> {
        let mut guard = self.inner.lock().await;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let revoked = lease_manager::revoke_by_task(&mut guard.file.credentials, task_id, now_ms);
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        let count = revoked.len();
        for (credential_id, lease_id) in revoked {
            self.broadcaster
                .broadcast(VaultEvent::LeaseRevoked {
                    credential_id: credential_id.to_string(),
                    lease_id,
                })
                .await;
        }
        Ok(count)
    }

    async fn expire_leases(&self) -> VaultResult<()> {
        Self::expire_leases_in(&self.inner).await
    }

    /// Shared by [`Self::expire_leases`] and the detached tick task, which
    /// only ever holds `inner` via an upgraded [`Weak`] and has no
    /// `VaultService` to call a method on.
    async fn expire_leases_in(inner: &Arc<Mutex<Inner>>) -> VaultResult<()> {
        let mut guard = inner.lock().await;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let expired = lease_manager::expire_due(&mut guard.file.credentials, now_ms);
        if expired == 0 {
            return Ok(());
        }
        Self::commit(&mut guard, snapshot)?;
        debug!(count = expired, "expiry tick revoked leases");
        Ok(())
    }

    // -- Permission rules (§4.3, §4.6) -----------------------------------

    pub async fn add_rule(&self, credential_id: CredentialId, text: impl Into<String>) -> VaultResult<PermissionRule> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, credential_id)?;
        let snapshot = guard.file.clone();
        let text = text.into();
        let rule = PermissionRule {
            id: CredentialId::new().to_string(),
            compiled_constraints: policy::compile(&text),
            text,
            created_at_ms: unix_now_ms(),
            enabled: true,
        };
        guard.file.credentials[idx].permission_rules.push(rule.clone());
        Self::commit(&mut guard, snapshot)?;
        Ok(rule)
    }

    pub async fn update_rule(&self, credential_id: CredentialId, rule_id: &str, text: impl Into<String>) -> VaultResult<PermissionRule> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, credential_id)?;
        let snapshot = guard.file.clone();
        let text = text.into();
        let rule = guard.file.credentials[idx]
            .permission_rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| VaultError::not_found("rule", rule_id))?;
        rule.compiled_constraints = policy::compile(&text);
        rule.text = text;
        let updated = rule.clone();
        Self::commit(&mut guard, snapshot)?;
        Ok(updated)
    }

    pub async fn remove_rule(&self, credential_id: CredentialId, rule_id: &str) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, credential_id)?;
        let snapshot = guard.file.clone();
        guard.file.credentials[idx].permission_rules.retain(|r| r.id != rule_id);
        Self::commit(&mut guard, snapshot)?;
        Ok(())
    }

    // -- Checkout (§4.5, §4.6) -------------------------------------------

    /// Resolve access, evaluate policy, decrypt, and return the secret
    /// (§4.6). Neither the access resolution's lease consumption nor the
    /// usage-record bump survives a policy-blocked checkout: both are
    /// applied to the in-memory snapshot and reverted together with it
    /// if the Policy Engine rejects the request, so a denied checkout
    /// never silently burns a lease use (an Open Question resolved this
    /// way since §4.5/§4.3 don't otherwise say who "wins" the race
    /// between consuming a lease and the policy check that follows it).
    pub async fn checkout(&self, request: crate::core::context::CheckoutRequest) -> VaultResult<CheckoutOutcome> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_credential_index(&guard.file, request.credential_id)?;
        if !guard.file.credentials[idx].enabled {
            return Err(VaultError::Disabled);
        }

        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let profile = guard
            .file
            .agent_profiles
            .iter()
            .find(|p| p.agent_id == request.agent_id)
            .cloned();

        let basis = {
            let credential = &mut guard.file.credentials[idx];
            access::resolve(credential, profile.as_ref(), &request.agent_id, request.task_id.as_ref(), now_ms)
                .ok_or(VaultError::NoAccess)?
        };

        let ctx = AccessContext {
            agent_id: request.agent_id.clone(),
            task_id: request.task_id.clone(),
            tool_name: request.tool_name.clone(),
            action: request.action.clone(),
            purpose: request.purpose.clone(),
            now_ms,
        };

        let read_only = matches!(basis, AccessBasis::Profile { read_only: true });
        let mut rules = guard.file.credentials[idx].permission_rules.clone();
        if read_only {
            rules.push(implicit_read_only_rule(now_ms));
        }

        let outcome = policy::evaluate(request.credential_id, &rules, &ctx, &guard.usage);
        if !outcome.allowed {
            // Revert the lease-consumption side effect from `resolve`
            // above: a blocked checkout must not spend a use.
            guard.file = snapshot;
            let reason = outcome.reason.unwrap_or_else(|| "blocked by policy".to_string());
            warn!(credential_id = %request.credential_id, agent_id = %request.agent_id, reason, "checkout blocked by policy");
            return Err(VaultError::PolicyBlocked(reason));
        }

        let envelope = guard
            .file
            .secrets
            .get(&guard.file.credentials[idx].secret_ref)
            .cloned()
            .ok_or_else(|| VaultError::Corrupt(format!("missing envelope for credential {}", request.credential_id)))?;
        let passphrase = guard.passphrase.clone();

        guard.usage.record(request.credential_id, request.agent_id.clone(), now_ms);
        guard.file.credentials[idx].record_usage(UsageRecord {
            at_ms: now_ms,
            agent_id: request.agent_id.clone(),
            task_id: request.task_id.as_ref().map(ToString::to_string),
            tool_name: request.tool_name.clone(),
        });

        if let Err(err) = Self::commit(&mut guard, snapshot) {
            return Err(err);
        }
        drop(guard);

        let plaintext = self.kdf_open(passphrase, envelope).await?;
        let secret: Secret = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Corrupt(format!("secret payload corrupt: {e}")))?;

        info!(credential_id = %request.credential_id, agent_id = %request.agent_id, "checkout granted");
        Ok(CheckoutOutcome { secret, basis })
    }

    // -- Accounts (§3, §4.6) ----------------------------------------------

    pub async fn create_account(&self, name: impl Into<String>, provider: AccountProvider, email: Option<String>) -> VaultResult<Account> {
        let mut guard = self.inner.lock().await;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let account = Account {
            id: AccountId::new(),
            name: name.into(),
            provider,
            icon: None,
            email,
            credential_ids: Vec::new(),
            tags: Vec::new(),
            metadata: HashMap::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        guard.file.accounts.push(account.clone());
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::AccountCreated(account.clone())).await;
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> VaultResult<Account> {
        let guard = self.inner.lock().await;
        let idx = Self::find_account_index(&guard.file, id)?;
        Ok(guard.file.accounts[idx].clone())
    }

    pub async fn list_accounts(&self) -> Vec<Account> {
        self.inner.lock().await.file.accounts.clone()
    }

    pub async fn update_account(&self, id: AccountId, patch: AccountPatch) -> VaultResult<Account> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_account_index(&guard.file, id)?;
        let snapshot = guard.file.clone();
        let account = &mut guard.file.accounts[idx];
        if let Some(name) = patch.name {
            account.name = name;
        }
        if let Some(icon) = patch.icon {
            account.icon = icon;
        }
        if let Some(email) = patch.email {
            account.email = email;
        }
        if let Some(tags) = patch.tags {
            account.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            account.metadata = metadata;
        }
        account.updated_at_ms = unix_now_ms();
        let updated = account.clone();
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::AccountUpdated(updated.clone())).await;
        Ok(updated)
    }

    pub async fn delete_account(&self, id: AccountId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = Self::find_account_index(&guard.file, id)?;
        let snapshot = guard.file.clone();
        guard.file.accounts.remove(idx);
        for credential in &mut guard.file.credentials {
            if credential.account_id == Some(id) {
                credential.account_id = None;
            }
        }
        for profile in &mut guard.file.agent_profiles {
            profile.account_bindings.retain(|b| b.account_id != id);
        }
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        info!(account_id = %id, "account deleted");
        self.broadcaster
            .broadcast(VaultEvent::AccountDeleted {
                account_id: id.to_string(),
            })
            .await;
        Ok(())
    }

    pub async fn add_credential_to_account(&self, account_id: AccountId, credential_id: CredentialId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        Self::find_account_index(&guard.file, account_id)?;
        Self::find_credential_index(&guard.file, credential_id)?;
        let snapshot = guard.file.clone();
        let aidx = Self::find_account_index(&guard.file, account_id)?;
        guard.file.accounts[aidx].attach_credential(credential_id);
        let cidx = Self::find_credential_index(&guard.file, credential_id)?;
        guard.file.credentials[cidx].account_id = Some(account_id);
        Self::commit(&mut guard, snapshot)?;
        Ok(())
    }

    pub async fn remove_credential_from_account(&self, account_id: AccountId, credential_id: CredentialId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let aidx = Self::find_account_index(&guard.file, account_id)?;
        let snapshot = guard.file.clone();
        guard.file.accounts[aidx].detach_credential(credential_id);
        if let Ok(cidx) = Self::find_credential_index(&guard.file, credential_id) {
            if guard.file.credentials[cidx].account_id == Some(account_id) {
                guard.file.credentials[cidx].account_id = None;
            }
        }
        Self::commit(&mut guard, snapshot)?;
        Ok(())
    }

    // -- Agent profiles (§3, §4.5, §4.6) ---------------------------------

    pub async fn get_agent_profile(&self, agent_id: &AgentId) -> Option<AgentCredentialProfile> {
        self.inner
            .lock()
            .await
            .file
            .agent_profiles
            .iter()
            .find(|p| &p.agent_id == agent_id)
            .cloned()
    }

    pub async fn bind_agent_to_account(
        &self,
        agent_id: AgentId,
        account_id: AccountId,
        granted_by: impl Into<String>,
        restrictions: Option<Restrictions>,
    ) -> VaultResult<AgentCredentialProfile> {
        let mut guard = self.inner.lock().await;
        Self::find_account_index(&guard.file, account_id)?;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        let idx = Self::profile_index_or_insert(&mut guard.file, &agent_id, now_ms);
        let profile = &mut guard.file.agent_profiles[idx];
        profile.account_bindings.retain(|b| b.account_id != account_id);
        profile.account_bindings.push(AccountBinding {
            account_id,
            granted_at_ms: now_ms,
            granted_by: granted_by.into(),
            restrictions,
        });
        profile.updated_at_ms = now_ms;
        let updated = profile.clone();
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::AgentProfileUpdated(updated.clone())).await;
        Ok(updated)
    }

    pub async fn unbind_agent_from_account(&self, agent_id: &AgentId, account_id: AccountId) -> VaultResult<()> {
        let mut guard = self.inner.lock().await;
        let idx = guard
            .file
            .agent_profiles
            .iter()
            .position(|p| &p.agent_id == agent_id)
            .ok_or_else(|| VaultError::not_found("agent profile", agent_id.as_str()))?;
        let snapshot = guard.file.clone();
        let now_ms = unix_now_ms();
        guard.file.agent_profiles[idx]
            .account_bindings
            .retain(|b| b.account_id != account_id);
        guard.file.agent_profiles[idx].updated_at_ms = now_ms;
        let updated = guard.file.agent_profiles[idx].clone();
        Self::commit(&mut guard, snapshot)?;
        drop(guard);
        self.broadcaster.broadcast(VaultEvent::AgentProfileUpdated(updated)).await;
        Ok(())
    }

    /// Every credential id reachable by `agent_id` today: the profile's own
    /// direct grants, active leases, legacy access grants, and every
    /// credential on every account the agent's profile binds to (subject
    /// to that binding's restrictions). Used by callers building a
    /// capability summary for an agent (§4.6).
    pub async fn resolve_agent_credential_ids(&self, agent_id: &AgentId) -> Vec<CredentialId> {
        let guard = self.inner.lock().await;
        let now_ms = unix_now_ms();
        let profile = guard.file.agent_profiles.iter().find(|p| &p.agent_id == agent_id);
        let mut ids: Vec<CredentialId> = guard
            .file
            .credentials
            .iter()
            .filter(|c| access::can_see(c, profile, agent_id, now_ms))
            .map(|c| c.id)
            .collect();
        if let Some(profile) = profile {
            ids.extend(profile.direct_grants.iter().map(|g| g.credential_id));
        }
        ids.sort();
        ids.dedup();
        ids
    }
}

/// The implicit restriction passed to the Policy Engine when the access
/// basis is a read-only profile binding (§4.5 tier 3): only read-shaped
/// actions pass, everything else is rejected the same way an explicit
/// `ActionRestriction` rule would reject it.
fn implicit_read_only_rule(now_ms: i64) -> PermissionRule {
    PermissionRule {
        id: "__implicit_read_only".to_string(),
        text: "read-only profile binding".to_string(),
        compiled_constraints: vec![CompiledConstraint::ActionRestriction {
            actions: vec!["read".to_string(), "list".to_string(), "get".to_string()],
        }],
        created_at_ms: now_ms,
        enabled: true,
    }
}

/// Builder for [`VaultService`], mirroring this crate's other builders.
pub struct VaultServiceBuilder {
    config: VaultConfig,
    passphrase: Passphrase,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl VaultServiceBuilder {
    #[must_use]
    pub fn broadcaster(mut self, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub async fn build(self) -> VaultResult<VaultService> {
        VaultService::open(self.config, self.passphrase, self.broadcaster).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::CheckoutRequest;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> VaultConfig {
        VaultConfig::builder()
            .store_path(dir.path().join("vault.json"))
            .expiry_tick_interval(Duration::from_secs(3600))
            .build()
            .unwrap()
    }

    fn secret(value: &str) -> Secret {
        Secret::ApiKey {
            key: crate::utils::SecretString::new(value),
            email: None,
            metadata: None,
        }
    }

    async fn new_vault(dir: &TempDir) -> VaultService {
        VaultService::init(config(dir), Passphrase::from("correct horse battery staple"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn init_twice_with_right_passphrase_succeeds() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        vault.close().await; // releases the original handle's `StoreLock` flock
        let reopened = VaultService::init(config(&dir), Passphrase::from("correct horse battery staple")).await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn init_with_wrong_passphrase_fails() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        vault.close().await; // releases the original handle's `StoreLock` flock
        let err = VaultService::init(config(&dir), Passphrase::from("wrong")).await.unwrap_err();
        assert_eq!(err.kind(), crate::core::error::VaultErrorKind::WrongKey);
    }

    #[tokio::test]
    async fn create_then_checkout_via_direct_grant() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "slack bot".to_string(),
                description: None,
                tags: vec![],
                category: Category::ChannelBot,
                provider: "slack".to_string(),
                detected_provider: None,
                secret: secret("xoxb-123"),
                account_id: None,
            })
            .await
            .unwrap();

        let agent = AgentId::new("agent-1").unwrap();
        vault.grant_access(credential.id, agent.clone(), "admin").await.unwrap();

        let outcome = vault
            .checkout(CheckoutRequest {
                credential_id: credential.id,
                agent_id: agent,
                task_id: None,
                tool_name: None,
                action: None,
                purpose: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.secret.primary_token(), Some("xoxb-123".to_string()));
        assert_eq!(outcome.basis, AccessBasis::Grant);
    }

    #[tokio::test]
    async fn checkout_without_any_basis_is_no_access() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: None,
            })
            .await
            .unwrap();

        let err = vault
            .checkout(CheckoutRequest {
                credential_id: credential.id,
                agent_id: AgentId::new("stranger").unwrap(),
                task_id: None,
                tool_name: None,
                action: None,
                purpose: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::VaultErrorKind::NoAccess);
    }

    #[tokio::test]
    async fn disabled_credential_short_circuits_checkout() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: None,
            })
            .await
            .unwrap();
        let agent = AgentId::new("a1").unwrap();
        vault.grant_access(credential.id, agent.clone(), "admin").await.unwrap();
        vault.disable(credential.id).await.unwrap();

        let err = vault
            .checkout(CheckoutRequest {
                credential_id: credential.id,
                agent_id: agent,
                task_id: None,
                tool_name: None,
                action: None,
                purpose: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::VaultErrorKind::Disabled);
    }

    #[tokio::test]
    async fn policy_block_does_not_consume_lease() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: None,
            })
            .await
            .unwrap();
        vault.add_rule(credential.id, "No browser access").await.unwrap();

        let agent = AgentId::new("a1").unwrap();
        let task = TaskId::new("t1").unwrap();
        let lease = vault
            .create_lease(credential.id, task.clone(), agent.clone(), None, Some(1))
            .await
            .unwrap();

        let err = vault
            .checkout(CheckoutRequest {
                credential_id: credential.id,
                agent_id: agent.clone(),
                task_id: Some(task.clone()),
                tool_name: Some("browser".to_string()),
                action: None,
                purpose: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::VaultErrorKind::PolicyBlocked);

        let refreshed = vault.get(credential.id).await.unwrap();
        let persisted_lease = refreshed
            .active_leases
            .iter()
            .find(|l| l.lease_id == lease.lease_id)
            .unwrap();
        assert!(persisted_lease.is_active(unix_now_ms()), "blocked checkout must not consume the lease");
    }

    #[tokio::test]
    async fn deleting_account_unlinks_its_credentials() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let account = vault
            .create_account("Acme Slack", AccountProvider::Slack, None)
            .await
            .unwrap();
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::ChannelBot,
                provider: "slack".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: Some(account.id),
            })
            .await
            .unwrap();

        vault.delete_account(account.id).await.unwrap();
        let refreshed = vault.get(credential.id).await.unwrap();
        assert!(refreshed.account_id.is_none());
    }

    #[tokio::test]
    async fn list_filters_to_what_agent_can_see_without_consuming_leases() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let visible = vault
            .create(CreateCredentialInput {
                name: "visible".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v1"),
                account_id: None,
            })
            .await
            .unwrap();
        vault
            .create(CreateCredentialInput {
                name: "hidden".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v2"),
                account_id: None,
            })
            .await
            .unwrap();

        let agent = AgentId::new("a1").unwrap();
        vault.grant_access(visible.id, agent.clone(), "admin").await.unwrap();

        let filter = CredentialListFilter::new().with_agent_id(agent);
        let results = vault.list(&filter).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, visible.id);
    }

    #[tokio::test]
    async fn rate_limit_blocks_after_threshold() {
        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: None,
            })
            .await
            .unwrap();
        vault.add_rule(credential.id, "No more than 1 per minute").await.unwrap();
        let agent = AgentId::new("a1").unwrap();
        vault.grant_access(credential.id, agent.clone(), "admin").await.unwrap();

        let req = || CheckoutRequest {
            credential_id: credential.id,
            agent_id: agent.clone(),
            task_id: None,
            tool_name: None,
            action: None,
            purpose: None,
        };
        vault.checkout(req()).await.unwrap();
        let err = vault.checkout(req()).await.unwrap_err();
        assert_eq!(err.kind(), crate::core::error::VaultErrorKind::PolicyBlocked);
    }

    #[tokio::test]
    async fn resolve_agent_credential_ids_includes_profile_direct_grants() {
        use crate::core::profile::DirectGrant;

        let dir = TempDir::new().unwrap();
        let vault = new_vault(&dir).await;
        let credential = vault
            .create(CreateCredentialInput {
                name: "c".to_string(),
                description: None,
                tags: vec![],
                category: Category::Custom,
                provider: "custom".to_string(),
                detected_provider: None,
                secret: secret("v"),
                account_id: None,
            })
            .await
            .unwrap();
        let agent = AgentId::new("a1").unwrap();

        {
            let mut guard = vault.inner.lock().await;
            let now_ms = unix_now_ms();
            let mut profile = AgentCredentialProfile::new(agent.clone(), now_ms);
            profile.direct_grants.push(DirectGrant {
                credential_id: credential.id,
                granted_at_ms: now_ms,
                granted_by: "admin".to_string(),
            });
            guard.file.agent_profiles.push(profile);
        }

        let ids = vault.resolve_agent_credential_ids(&agent).await;
        assert_eq!(ids, vec![credential.id]);
    }
}
