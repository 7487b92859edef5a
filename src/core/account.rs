//! Service identities grouping credentials (§3)

use crate::core::id::{AccountId, CredentialId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Known account providers. `Other` carries any provider name the built-in
/// set doesn't recognize (paste-import detection is open-ended, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountProvider {
    Slack,
    Discord,
    Telegram,
    Github,
    OpenAi,
    Anthropic,
    Google,
    Other(String),
}

impl AccountProvider {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Telegram => "telegram",
            Self::Github => "github",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Other(s) => s,
        }
    }
}

/// A service identity grouping one or more credentials (§3).
///
/// Invariant, maintained solely by [`crate::service::VaultService`]:
/// `credential_ids` is always exactly `{c.id | c.account_id == self.id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub provider: AccountProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub credential_ids: Vec<CredentialId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Account {
    pub fn attach_credential(&mut self, id: CredentialId) {
        if !self.credential_ids.contains(&id) {
            self.credential_ids.push(id);
        }
    }

    pub fn detach_credential(&mut self, id: CredentialId) {
        self.credential_ids.retain(|c| *c != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Account {
        Account {
            id: AccountId::new(),
            name: "Slack workspace".to_string(),
            provider: AccountProvider::Slack,
            icon: None,
            email: None,
            credential_ids: vec![],
            tags: vec![],
            metadata: HashMap::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn attach_credential_is_idempotent() {
        let mut a = sample();
        let id = CredentialId::new();
        a.attach_credential(id);
        a.attach_credential(id);
        assert_eq!(a.credential_ids.len(), 1);
    }

    #[test]
    fn detach_credential_removes_entry() {
        let mut a = sample();
        let id = CredentialId::new();
        a.attach_credential(id);
        a.detach_credential(id);
        assert!(a.credential_ids.is_empty());
    }

    #[test]
    fn provider_as_str_handles_other_variant() {
        let p = AccountProvider::Other("custom-crm".to_string());
        assert_eq!(p.as_str(), "custom-crm");
    }
}
