//! Passphrase handling
//!
//! The master passphrase is held in memory for the service's lifetime
//! and must never be written to disk or logged. [`Passphrase`] wraps it
//! the way this crate wraps any in-memory secret: zeroized on drop,
//! redacted `Debug`, and only reachable through a closure-scoped
//! accessor so it can't be accidentally copied into a log line or error
//! message.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The master passphrase, held for the service's lifetime.
///
/// Any non-empty byte string is accepted (§4.1) — passphrases are not
/// required to be valid UTF-8, since some embedders derive them from raw
/// key material rather than a typed password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(Vec<u8>);

impl Passphrase {
    /// Wrap passphrase bytes. Does not validate non-emptiness itself —
    /// callers that need the "non-empty" rule enforced (service
    /// construction) check separately so the error can name the right
    /// caller-facing field.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Access the raw bytes within a closure scope; the reference cannot
    /// escape, matching `SecretString::expose_secret`'s convention.
    pub fn with_exposed<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        f(&self.0)
    }

    /// Constant-time equality, never `==` on raw passphrase bytes.
    #[must_use]
    pub fn eq_ct(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase[REDACTED]")
    }
}

impl From<&str> for Passphrase {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<String> for Passphrase {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}
