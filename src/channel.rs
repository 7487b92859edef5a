//! Channel Token Helper: a single token string for channel adapters (§4.7)
//!
//! Stateless on top of [`VaultService`]: every call resolves fresh rather
//! than caching, and every failure mode falls through to the next option
//! instead of surfacing an error — a channel bot should degrade to "no
//! token" rather than crash on a misconfigured account.

use std::env;

use crate::core::context::CheckoutRequest;
use crate::core::id::{system_agent_id, AccountId};
use crate::service::VaultService;
use tracing::debug;

/// Inputs to [`resolve_channel_token`].
pub struct ChannelTokenRequest {
    pub account_id: Option<AccountId>,
    pub provider: String,
    /// Key into the account's `metadata` map naming which credential id
    /// to prefer, if the account groups more than one.
    pub token_metadata_key: Option<String>,
    pub env_fallback_var: Option<String>,
    pub allow_env_fallback: bool,
}

/// Where the returned token came from, so callers can log or gate on it
/// without re-deriving the fallback chain themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Vault,
    Env,
    None,
}

pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
    /// Which credential the token came from, when `source` is `Vault`.
    pub credential_id: Option<crate::core::id::CredentialId>,
}

/// Resolve a single bearer token for `request.provider`, trying the vault
/// first, then an environment variable, then giving up (§4.7). Checkouts
/// run as the reserved `SYSTEM` agent identity; any checkout failure
/// (disabled, no access, corrupt envelope) is swallowed and treated the
/// same as "nothing to check out".
pub async fn resolve_channel_token(vault: &VaultService, request: &ChannelTokenRequest) -> ResolvedToken {
    if let Some((token, credential_id)) = try_vault(vault, request).await {
        return ResolvedToken {
            token,
            source: TokenSource::Vault,
            credential_id: Some(credential_id),
        };
    }

    if request.allow_env_fallback {
        if let Some(var) = &request.env_fallback_var {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    debug!(provider = %request.provider, var, "channel token resolved from environment fallback");
                    return ResolvedToken {
                        token: value,
                        source: TokenSource::Env,
                        credential_id: None,
                    };
                }
            }
        }
    }

    ResolvedToken {
        token: String::new(),
        source: TokenSource::None,
        credential_id: None,
    }
}

async fn try_vault(vault: &VaultService, request: &ChannelTokenRequest) -> Option<(String, crate::core::id::CredentialId)> {
    let account_id = request.account_id?;
    let account = vault.get_account(account_id).await.ok()?;

    let credential_id = request
        .token_metadata_key
        .as_ref()
        .and_then(|key| account.metadata.get(key))
        .and_then(|id| id.parse().ok())
        .or_else(|| account.credential_ids.first().copied())?;

    let outcome = vault
        .checkout(CheckoutRequest {
            credential_id,
            agent_id: system_agent_id(),
            task_id: None,
            tool_name: None,
            action: None,
            purpose: None,
        })
        .await
        .ok()?;

    outcome.secret.primary_token().map(|token| (token, credential_id))
}
