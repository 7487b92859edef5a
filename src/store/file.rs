//! The store file's on-disk shape and v2 -> v3 migration (§3, §6)

use crate::core::account::Account;
use crate::core::credential::Credential;
use crate::core::error::StoreError;
use crate::core::profile::AgentCredentialProfile;
use crate::crypto::EncryptedEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CURRENT_VERSION: u32 = 3;

/// `{version=3, credentials[], secrets: Map<secretRef, Envelope>,
/// masterKeyCheck, accounts[], agentProfiles[]}` (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFile {
    pub version: u32,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub secrets: HashMap<String, EncryptedEnvelope>,
    pub master_key_check: EncryptedEnvelope,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub agent_profiles: Vec<AgentCredentialProfile>,
}

/// A v2 file: no `accounts`, no `agentProfiles`, and grants lived directly
/// on the legacy `accessGrants` field (still the shape `Credential` itself
/// persists, so only the top-level envelope differs).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFileV2 {
    version: u32,
    #[serde(default)]
    credentials: Vec<Credential>,
    #[serde(default)]
    secrets: HashMap<String, EncryptedEnvelope>,
    master_key_check: EncryptedEnvelope,
}

/// Parse raw bytes into the current [`StoreFile`] shape, migrating v2 in
/// place (§6, §9: `accessGrants` carried verbatim on each credential;
/// `agentProfiles` starts empty — promoting legacy grants into profile
/// bindings is an explicit non-goal of the migration). v1 and below are
/// rejected outright.
pub fn parse(bytes: &[u8]) -> Result<StoreFile, StoreError> {
    let probe: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| StoreError::ReadFailure(e.to_string()))?;
    let version = probe
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| StoreError::ReadFailure("missing version field".to_string()))?;

    match version {
        CURRENT_VERSION_U64 => {
            serde_json::from_value(probe).map_err(|e| StoreError::ReadFailure(e.to_string()))
        }
        2 => {
            let v2: StoreFileV2 =
                serde_json::from_value(probe).map_err(|e| StoreError::ReadFailure(e.to_string()))?;
            Ok(StoreFile {
                version: CURRENT_VERSION,
                credentials: v2.credentials,
                secrets: v2.secrets,
                master_key_check: v2.master_key_check,
                accounts: Vec::new(),
                agent_profiles: Vec::new(),
            })
        }
        other => Err(StoreError::UnsupportedVersion(other as u32)),
    }
}

#[allow(clippy::cast_lossless)]
const CURRENT_VERSION_U64: u64 = CURRENT_VERSION as u64;

impl StoreFile {
    #[must_use]
    pub fn fresh(master_key_check: EncryptedEnvelope) -> Self {
        Self {
            version: CURRENT_VERSION,
            credentials: Vec::new(),
            secrets: HashMap::new(),
            master_key_check,
            accounts: Vec::new(),
            agent_profiles: Vec::new(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::WriteFailure(e.to_string()))
    }
}
