//! Request-scoped parameter bags for checkout and policy evaluation

use crate::core::id::{AgentId, CredentialId, TaskId};

/// Inputs to [`crate::service::VaultService::checkout`] (§4.6).
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub credential_id: CredentialId,
    pub agent_id: AgentId,
    pub task_id: Option<TaskId>,
    pub tool_name: Option<String>,
    pub action: Option<String>,
    pub purpose: Option<String>,
}

/// What the Policy Engine evaluates a checkout against (§4.3): the
/// resolved request plus the current time, decoupled from how access was
/// granted.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub agent_id: AgentId,
    pub task_id: Option<TaskId>,
    pub tool_name: Option<String>,
    pub action: Option<String>,
    pub purpose: Option<String>,
    pub now_ms: i64,
}
