//! Credential Vault Core — an encrypted, multi-tenant credential vault
//! mediating agent access to secrets.
//!
//! A single [`VaultService`](service::VaultService) owns an encrypted,
//! atomically-persisted JSON store. Agents never see plaintext secrets
//! directly; every read passes through [`VaultService::checkout`]
//! (service::VaultService::checkout), which resolves access (an active
//! lease, a direct grant, or an agent profile's account binding), runs
//! the checkout request through the table-driven policy engine, and only
//! then decrypts and returns the secret.
#![deny(unsafe_code)]
#![forbid(unsafe_code)]

/// Core data model: credentials, accounts, profiles, leases, rules, and
/// the error/id/secret-handling primitives they're built from.
pub mod core;
/// AEAD envelope codec (seal/open) over a passphrase-derived key.
pub mod crypto;
/// Durable, atomic persistence of the vault's on-disk store file.
pub mod store;
/// The rule compiler and checkout-time constraint evaluator.
pub mod policy;
/// Create/revoke/consume/expire leases across a store's credentials.
pub mod lease_manager;
/// The access resolver: lease, grant, or profile binding.
pub mod access;
/// Lifecycle events the vault emits through an injected broadcaster.
pub mod events;
/// The orchestrating `VaultService` and its configuration.
pub mod service;
/// Channel Token Helper: a single token string for channel adapters.
pub mod channel;
/// Paste Import: turn a pasted secret blob into a credential + account.
pub mod paste_import;
/// Fixtures and an in-memory event broadcaster for tests.
pub mod testing;
/// Small shared utilities: redacted secret strings, epoch-ms time helpers.
pub mod utils;

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::core::{
        AccessContext, AccessGrant, Account, AccountBinding, AccountId, AccountProvider, AgentCredentialProfile,
        AgentId, Category, CheckoutRequest, CompiledConstraint, CreateLeaseInput, Credential, CredentialId,
        CredentialListFilter, DirectGrant, HourWindow, Lease, LeaseId, OpaqueId, Passphrase, PermissionRule,
        Restrictions, Secret, SecretKind, TaskId, UsageRecord, VaultError, VaultErrorKind, VaultResult,
        SYSTEM_AGENT,
    };

    pub use crate::events::{EventBroadcaster, NullBroadcaster, VaultEvent};

    pub use crate::service::{
        AccountPatch, CheckoutOutcome, CreateCredentialInput, CredentialPatch, VaultConfig, VaultConfigBuilder,
        VaultService, VaultServiceBuilder,
    };

    pub use crate::access::AccessBasis;

    pub use crate::channel::{resolve_channel_token, ChannelTokenRequest, ResolvedToken, TokenSource};

    pub use crate::paste_import::{create_from_paste, Detection, PasteImportOverrides, PasteImportOutcome, ProviderDetector};

    pub use crate::utils::SecretString;
}
