//! Core data model: credentials, accounts, profiles, leases, rules, and the
//! error/id/secret-handling primitives they're built from (§3).

mod account;
mod context;
mod credential;
mod error;
mod filter;
mod id;
mod lease;
mod profile;
mod rule;
mod secret;
mod secure;

pub use account::{Account, AccountProvider};
pub use context::{AccessContext, CheckoutRequest};
pub use credential::{AccessGrant, Category, Credential, MetadataMap, UsageRecord, MAX_USAGE_HISTORY};
pub use error::{CryptoError, StoreError, VaultError, VaultErrorKind, VaultResult};
pub use filter::CredentialListFilter;
pub use id::{system_agent_id, AccountId, AgentId, CredentialId, LeaseId, OpaqueId, TaskId, SYSTEM_AGENT};
pub use lease::{CreateLeaseInput, Lease, DEFAULT_TTL_MS};
pub use profile::{AccountBinding, AgentCredentialProfile, DirectGrant, Restrictions};
pub use rule::{CompiledConstraint, HourWindow, PermissionRule};
pub use secret::{Secret, SecretKind};
pub use secure::Passphrase;
