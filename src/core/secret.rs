//! The decrypted secret payload
//!
//! `Secret` is the plaintext a successful checkout returns (§3, §4.6). It
//! never touches disk directly — only its sealed bytes
//! (`serde_json::to_vec` then AEAD-sealed, see [`crate::crypto`]) do.
//! Sensitive fields use [`SecretString`](crate::utils::SecretString) so an
//! accidental `{:?}`/log of a `Secret` still redacts, even though the
//! owning checkout call is expected to expose the real value.

use crate::utils::SecretString;
use serde::{Deserialize, Serialize};

/// Which [`Secret`] variant a credential holds. Stored on [`Credential`]
/// (`secretKind`) so category/kind consistency (§3 invariants) can be
/// checked without decrypting.
///
/// [`Credential`]: crate::core::Credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    ApiKey,
    Token,
    OAuth,
    SshKey,
}

impl SecretKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Token => "token",
            Self::OAuth => "oauth",
            Self::SshKey => "ssh_key",
        }
    }
}

/// Tagged secret payload. The `kind` field is the serialization tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Secret {
    ApiKey {
        key: SecretString,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    Token {
        token: SecretString,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at_ms: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        refresh_token: Option<SecretString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
    OAuth {
        access_token: SecretString,
        refresh_token: SecretString,
        expires_at_ms: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scopes: Option<Vec<String>>,
    },
    SshKey {
        private_key: SecretString,
        #[serde(skip_serializing_if = "Option::is_none")]
        public_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        passphrase: Option<SecretString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
}

impl Secret {
    #[must_use]
    pub fn kind(&self) -> SecretKind {
        match self {
            Self::ApiKey { .. } => SecretKind::ApiKey,
            Self::Token { .. } => SecretKind::Token,
            Self::OAuth { .. } => SecretKind::OAuth,
            Self::SshKey { .. } => SecretKind::SshKey,
        }
    }

    /// Extract a single "the token" string for consumers that just want a
    /// bearer value (used by the Channel Token Helper, §4.7): `token.token`,
    /// `api_key.key`, or `oauth.accessToken`. Returns `None` for `ssh_key`,
    /// which has no single bearer-token representation.
    #[must_use]
    pub fn primary_token(&self) -> Option<String> {
        match self {
            Self::Token { token, .. } => Some(token.expose_secret(str::to_string)),
            Self::ApiKey { key, .. } => Some(key.expose_secret(str::to_string)),
            Self::OAuth { access_token, .. } => Some(access_token.expose_secret(str::to_string)),
            Self::SshKey { .. } => None,
        }
    }
}
