//! Filtering for `VaultService::list` (§4.6)

use crate::core::credential::Category;
use crate::core::id::{AccountId, AgentId};

/// Filter for [`crate::service::VaultService::list`].
///
/// `agent_id`, if set, narrows results to credentials the agent may see via
/// grants, active leases, or profile bindings — it does not merely filter
/// the already-built list, it changes which credentials count as visible.
#[derive(Debug, Clone, Default)]
pub struct CredentialListFilter {
    pub category: Option<Category>,
    pub provider: Option<String>,
    pub enabled: Option<bool>,
    pub account_id: Option<AccountId>,
    pub agent_id: Option<AgentId>,
    pub limit: Option<usize>,
}

impl CredentialListFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_account_id(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn with_agent_id(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
