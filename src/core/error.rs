//! Error taxonomy for the credential vault
//!
//! Three tiers, narrowest first:
//! - [`CryptoError`]: envelope seal/open, KDF failures
//! - [`StoreError`]: on-disk persistence failures
//! - [`VaultError`]: the public taxonomy every vault operation returns,
//!   wrapping the two above plus the access/policy/lifecycle outcomes
//!   that are specific to checkout.
//!
//! `VaultError::kind()` exposes the canonical reason-text taxonomy callers
//! may match on (`WRONG_KEY`, `CORRUPT`, `NOT_FOUND`, ...); the `Display`
//! impl on each variant already renders that text, so `kind()` exists for
//! callers that want to branch on the kind without string-matching.

use thiserror::Error;

/// Errors from the envelope codec (seal/open).
#[derive(Debug, Error)]
pub enum CryptoError {
    /// GCM tag verification failed or KDF parameters were rejected.
    #[error("decryption failed - invalid key or corrupted data")]
    DecryptionFailed,

    /// AEAD encryption failed (should not happen with valid inputs).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// scrypt key derivation failed (e.g. parameters out of range).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The CSPRNG failed to produce a salt or nonce.
    #[error("random generation failed")]
    RandomGeneration,

    /// `kdfParams`/`algorithm` in a persisted envelope name something this
    /// build doesn't know how to open.
    #[error("unsupported envelope algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Errors from the durable store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file exists but failed to parse as valid JSON / the
    /// expected schema.
    #[error("store read failed: {0}")]
    ReadFailure(String),

    /// The atomic write (tmp file + fsync + rename) failed.
    #[error("store write failed: {0}")]
    WriteFailure(String),

    /// The file names a `version` this build does not know how to open
    /// or migrate (only v2 -> v3 is supported; v1 is rejected).
    #[error("unsupported store version: {0}")]
    UnsupportedVersion(u32),

    /// Another process already holds the exclusive store lock.
    #[error("store is locked by another process")]
    Locked,
}

/// The canonical error kind, matching the reason-text taxonomy callers may
/// match on (see `spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultErrorKind {
    WrongKey,
    Corrupt,
    NotFound,
    InvalidInput,
    Disabled,
    NoAccess,
    PolicyBlocked,
    Io,
}

/// Top-level vault error. Every public `VaultService` operation returns
/// `Result<T, VaultError>`.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The supplied passphrase does not decrypt `masterKeyCheck`.
    #[error("wrong master key")]
    WrongKey,

    /// An envelope failed to decrypt after the passphrase check passed;
    /// the store is structurally damaged.
    #[error("store corrupt: {0}")]
    Corrupt(String),

    /// No credential/account/profile with this id exists.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The credential is disabled; checkout is refused regardless of
    /// grants, leases, or policy.
    #[error("credential is disabled")]
    Disabled,

    /// Neither a grant, an active lease, nor a profile binding authorizes
    /// this agent for this credential.
    #[error("no access grant or active lease")]
    NoAccess,

    /// The Policy Engine rejected the checkout; `reason` is the compiled
    /// constraint's human-readable rejection text.
    #[error("policy blocked: {0}")]
    PolicyBlocked(String),

    /// Underlying store I/O failed.
    #[error(transparent)]
    Io(#[from] StoreError),

    /// Underlying envelope codec failed for a reason other than the
    /// master-key check (that surfaces as `WrongKey`/`Corrupt` instead,
    /// per §4.1).
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl VaultError {
    /// The credential/account/profile was not found.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Classify this error into the canonical taxonomy kind.
    pub fn kind(&self) -> VaultErrorKind {
        match self {
            Self::WrongKey => VaultErrorKind::WrongKey,
            Self::Corrupt(_) => VaultErrorKind::Corrupt,
            Self::NotFound { .. } => VaultErrorKind::NotFound,
            Self::InvalidInput(_) => VaultErrorKind::InvalidInput,
            Self::Disabled => VaultErrorKind::Disabled,
            Self::NoAccess => VaultErrorKind::NoAccess,
            Self::PolicyBlocked(_) => VaultErrorKind::PolicyBlocked,
            Self::Io(_) => VaultErrorKind::Io,
            // A crypto failure reaching the top level outside of init's
            // masterKeyCheck dance is always a structural problem.
            Self::Crypto(_) => VaultErrorKind::Corrupt,
        }
    }
}

/// Result alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_key_message() {
        let err = VaultError::WrongKey;
        assert_eq!(err.to_string(), "wrong master key");
        assert_eq!(err.kind(), VaultErrorKind::WrongKey);
    }

    #[test]
    fn not_found_includes_id() {
        let err = VaultError::not_found("credential", "abc-123");
        assert!(err.to_string().contains("abc-123"));
        assert_eq!(err.kind(), VaultErrorKind::NotFound);
    }

    #[test]
    fn policy_blocked_surfaces_reason() {
        let err = VaultError::PolicyBlocked("rule rejected toolName browser".to_string());
        assert!(err.to_string().contains("browser"));
        assert_eq!(err.kind(), VaultErrorKind::PolicyBlocked);
    }

    #[test]
    fn store_error_converts_to_io() {
        let err: VaultError = StoreError::WriteFailure("disk full".to_string()).into();
        assert_eq!(err.kind(), VaultErrorKind::Io);
    }

    #[test]
    fn crypto_error_converts_and_classifies_corrupt() {
        let err: VaultError = CryptoError::DecryptionFailed.into();
        assert_eq!(err.kind(), VaultErrorKind::Corrupt);
    }

    #[test]
    fn disabled_and_no_access_are_distinct_kinds() {
        assert_eq!(VaultError::Disabled.kind(), VaultErrorKind::Disabled);
        assert_eq!(VaultError::NoAccess.kind(), VaultErrorKind::NoAccess);
    }
}
