//! Paste Import: turn a pasted secret blob into a credential + account (§4.8)
//!
//! Provider *detection* is explicitly external to this crate (spec §1,
//! §4.8): `createFromPaste` only orchestrates what happens once a
//! detection result is in hand — match-or-create the account, attach the
//! credential, bind `SYSTEM`. The [`ProviderDetector`] trait is the seam
//! an embedding process plugs its own heuristic into.

use crate::core::account::{Account, AccountProvider};
use crate::core::credential::{Category, Credential};
use crate::core::error::VaultResult;
use crate::core::id::system_agent_id;
use crate::core::secret::Secret;
use crate::service::{CreateCredentialInput, VaultService};

/// What a [`ProviderDetector`] reports about a pasted secret.
#[derive(Debug, Clone)]
pub struct Detection {
    pub provider: AccountProvider,
    pub provider_display_name: String,
    pub category: Category,
    pub email: Option<String>,
    pub secret: Secret,
}

/// The external provider-detection heuristic (out of scope for this
/// crate per spec §1; implementations live in the embedding process).
pub trait ProviderDetector: Send + Sync {
    fn detect(&self, raw: &str) -> Option<Detection>;
}

/// Caller-supplied overrides applied on top of what detection produced.
#[derive(Debug, Clone, Default)]
pub struct PasteImportOverrides {
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub account_name: Option<String>,
}

pub struct PasteImportOutcome {
    pub credential: Credential,
    pub account: Account,
    pub detection: Detection,
}

/// Run detection over `raw`, then match-or-create the account and attach
/// the new credential to it, binding `SYSTEM` to the account so built-in
/// channel adapters can resolve a token for it immediately (§4.7).
pub async fn create_from_paste(
    vault: &VaultService,
    detector: &dyn ProviderDetector,
    raw: &str,
    overrides: Option<PasteImportOverrides>,
) -> VaultResult<Option<PasteImportOutcome>> {
    let Some(detection) = detector.detect(raw) else {
        return Ok(None);
    };
    let overrides = overrides.unwrap_or_default();

    let existing = vault
        .list_accounts()
        .await
        .into_iter()
        .find(|a| a.provider == detection.provider && matches_email(a, &detection));

    let account = match existing {
        Some(account) => account,
        None => {
            vault
                .create_account(
                    overrides.account_name.clone().unwrap_or_else(|| detection.provider_display_name.clone()),
                    detection.provider.clone(),
                    detection.email.clone(),
                )
                .await?
        }
    };

    let credential = vault
        .create(CreateCredentialInput {
            name: overrides.name.clone().unwrap_or_else(|| detection.provider_display_name.clone()),
            description: None,
            tags: overrides.tags.clone(),
            category: detection.category,
            provider: detection.provider.as_str().to_string(),
            detected_provider: Some(detection.provider.as_str().to_string()),
            secret: detection.secret.clone(),
            account_id: Some(account.id),
        })
        .await?;
    vault.add_credential_to_account(account.id, credential.id).await?;
    vault
        .bind_agent_to_account(system_agent_id(), account.id, "paste-import", None)
        .await?;

    Ok(Some(PasteImportOutcome {
        credential,
        account,
        detection,
    }))
}

fn matches_email(account: &Account, detection: &Detection) -> bool {
    match (&account.email, &detection.email) {
        (Some(a), Some(b)) => a == b,
        // No email hint on either side: match on provider alone.
        (None, None) => true,
        _ => false,
    }
}
