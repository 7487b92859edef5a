//! Fixture builders for standing up a vault in tests without hand-rolled
//! boilerplate (§14)

use std::time::Duration;

use tempfile::TempDir;

use crate::core::credential::Category;
use crate::core::secret::Secret;
use crate::core::secure::Passphrase;
use crate::service::{CreateCredentialInput, VaultConfig, VaultService};
use crate::utils::SecretString;

/// Stand up a fresh `VaultService` backed by a temp directory. The
/// returned `TempDir` must be kept alive for as long as the vault is
/// used — dropping it removes the backing store file.
pub async fn test_vault() -> (VaultService, TempDir) {
    let dir = TempDir::new().expect("failed to create tempdir for test vault");
    let config = VaultConfig::builder()
        .store_path(dir.path().join("vault.json"))
        .expiry_tick_interval(Duration::from_secs(3600))
        .build()
        .expect("test vault config is always valid");
    let vault = VaultService::init(config, Passphrase::from("test-passphrase"))
        .await
        .expect("test vault should always initialize cleanly");
    (vault, dir)
}

/// A sample credential-creation input: an API key under the `custom`
/// category, suitable when a test only needs *a* credential and doesn't
/// care about its specifics.
#[must_use]
pub fn test_credential_input(name: &str) -> CreateCredentialInput {
    CreateCredentialInput {
        name: name.to_string(),
        description: None,
        tags: vec![],
        category: Category::Custom,
        provider: "custom".to_string(),
        detected_provider: None,
        secret: Secret::ApiKey {
            key: SecretString::new("test-secret-value"),
            email: None,
            metadata: None,
        },
        account_id: None,
    }
}
