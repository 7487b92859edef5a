//! Identifiers used throughout the vault
//!
//! [`CredentialId`], [`AccountId`], and [`LeaseId`] are random 128-bit
//! identifiers (UUID v4), minted by the vault itself — callers never
//! choose them. [`AgentId`] and [`TaskId`] are caller-supplied opaque
//! strings (an agent runtime's own identity scheme), so they get lighter
//! validation than the UUID-backed ids: non-empty, bounded length, no
//! path-traversal-style characters, since they end up embedded in event
//! payloads and (for `AgentId`) in the reserved `SYSTEM` constant.

use crate::core::error::VaultError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_OPAQUE_ID_LENGTH: usize = 255;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random 128-bit id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(CredentialId, "A credential's stable, random 128-bit identity.");
uuid_id!(AccountId, "An account's stable, random 128-bit identity.");
uuid_id!(LeaseId, "A lease's stable, random 128-bit identity.");

/// Opaque caller-supplied identifier (agent or task identity).
///
/// Only alphanumerics, `-`, `_`, and `.` are allowed, which keeps these
/// safe to embed in log fields, event payloads, and (for paths that end
/// up filesystem-adjacent) filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpaqueId(String);

impl OpaqueId {
    pub fn new(id: impl Into<String>) -> Result<Self, VaultError> {
        let id = id.into();
        if id.is_empty() {
            return Err(VaultError::InvalidInput("id cannot be empty".to_string()));
        }
        if id.len() > MAX_OPAQUE_ID_LENGTH {
            return Err(VaultError::InvalidInput(format!(
                "id exceeds maximum length of {MAX_OPAQUE_ID_LENGTH} characters"
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(VaultError::InvalidInput(format!(
                "id '{id}' contains invalid characters (only alphanumerics, '-', '_', '.' allowed)"
            )));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OpaqueId> for String {
    fn from(id: OpaqueId) -> Self {
        id.0
    }
}

impl TryFrom<String> for OpaqueId {
    type Error = VaultError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        OpaqueId::new(s)
    }
}

/// Agent identity (supplied by the embedding agent runtime).
pub type AgentId = OpaqueId;

/// Task identity (supplied by the embedding task/workflow system).
pub type TaskId = OpaqueId;

/// The reserved agent identity used by built-in channel adapters to check
/// out tokens without a human actor (§4.7, §6 glossary).
pub const SYSTEM_AGENT: &str = "SYSTEM";

#[must_use]
pub fn system_agent_id() -> AgentId {
    AgentId::new(SYSTEM_AGENT).expect("SYSTEM is a valid opaque id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_random_and_distinct() {
        let a = CredentialId::new();
        let b = CredentialId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn uuid_id_round_trips_through_serde() {
        let id = LeaseId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: LeaseId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn opaque_id_rejects_empty_and_path_traversal() {
        assert!(OpaqueId::new("").is_err());
        assert!(OpaqueId::new("../etc/passwd").is_err());
        assert!(OpaqueId::new("agent one").is_err());
    }

    #[test]
    fn opaque_id_accepts_typical_agent_names() {
        assert!(OpaqueId::new("agent-1").is_ok());
        assert!(OpaqueId::new("task_42.retry").is_ok());
    }

    #[test]
    fn system_agent_constant_is_valid() {
        let id = system_agent_id();
        assert_eq!(id.as_str(), SYSTEM_AGENT);
    }
}
