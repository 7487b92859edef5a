//! Checkout-time evaluation of compiled constraints (§4.3)

use crate::core::context::AccessContext;
use crate::core::id::{AgentId, CredentialId};
use crate::core::rule::{CompiledConstraint, PermissionRule};
use crate::utils::from_unix_ms;
use chrono::Timelike;

/// Queried by the rate-limit constraint for the number of checkouts
/// already recorded for `(credential_id, agent_id)` within the trailing
/// window. Kept as a trait so the evaluator stays pure and doesn't own a
/// usage-history data structure itself (§9, §16); `VaultService` is the
/// implementor.
pub trait UsageWindow {
    fn count_in_last_minute(&self, credential_id: CredentialId, agent_id: &AgentId, now_ms: i64) -> u32;
    fn count_in_last_hour(&self, credential_id: CredentialId, agent_id: &AgentId, now_ms: i64) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOutcome {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl EvalOutcome {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

fn check_constraint(
    constraint: &CompiledConstraint,
    rule_text: &str,
    credential_id: CredentialId,
    ctx: &AccessContext,
    usage: &dyn UsageWindow,
) -> Option<String> {
    match constraint {
        CompiledConstraint::ToolAllowlist { tools } => {
            let tool = ctx.tool_name.as_deref()?;
            if tools.iter().any(|t| t == tool) {
                None
            } else {
                Some(format!(
                    "tool \"{tool}\" not in allowlist for rule \"{rule_text}\""
                ))
            }
        }
        CompiledConstraint::ToolDenylist { tools } => {
            let tool = ctx.tool_name.as_deref()?;
            if tools.iter().any(|t| t == tool) {
                Some(format!(
                    "tool \"{tool}\" is denied by rule \"{rule_text}\""
                ))
            } else {
                None
            }
        }
        CompiledConstraint::ActionRestriction { actions } => {
            let action = ctx.action.as_deref()?;
            if actions.iter().any(|a| a == action) {
                None
            } else {
                Some(format!(
                    "action \"{action}\" not permitted by rule \"{rule_text}\""
                ))
            }
        }
        CompiledConstraint::RateLimit {
            max_per_minute,
            max_per_hour,
        } => {
            if let Some(max) = max_per_minute {
                let count = usage.count_in_last_minute(credential_id, &ctx.agent_id, ctx.now_ms);
                if count >= *max {
                    return Some(format!(
                        "rate limit exceeded ({count}/{max} per minute) by rule \"{rule_text}\""
                    ));
                }
            }
            if let Some(max) = max_per_hour {
                let count = usage.count_in_last_hour(credential_id, &ctx.agent_id, ctx.now_ms);
                if count >= *max {
                    return Some(format!(
                        "rate limit exceeded ({count}/{max} per hour) by rule \"{rule_text}\""
                    ));
                }
            }
            None
        }
        CompiledConstraint::TimeWindow { allowed_hours_utc } => {
            let hour = from_unix_ms(ctx.now_ms).hour() as u8;
            if allowed_hours_utc.contains(hour) {
                None
            } else {
                Some(format!(
                    "current time ({hour}:00 UTC) outside allowed window {}:00-{}:00 UTC by rule \"{rule_text}\"",
                    allowed_hours_utc.start, allowed_hours_utc.end
                ))
            }
        }
        CompiledConstraint::PurposeRestriction { purposes } => match ctx.purpose.as_deref() {
            Some(purpose) if purposes.iter().any(|p| p == purpose) => None,
            Some(purpose) => Some(format!(
                "purpose \"{purpose}\" not permitted by rule \"{rule_text}\""
            )),
            None => Some(format!(
                "rule \"{rule_text}\" requires a purpose in {purposes:?}"
            )),
        },
    }
}

/// Evaluate a checkout against a credential's enabled rules. The first
/// rejecting constraint, across rules in order, wins; its reason text is
/// returned.
#[must_use]
pub fn evaluate(
    credential_id: CredentialId,
    rules: &[PermissionRule],
    ctx: &AccessContext,
    usage: &dyn UsageWindow,
) -> EvalOutcome {
    for rule in rules.iter().filter(|r| r.enabled) {
        for constraint in &rule.compiled_constraints {
            if let Some(reason) = check_constraint(constraint, &rule.text, credential_id, ctx, usage) {
                return EvalOutcome::block(reason);
            }
        }
    }
    EvalOutcome::allow()
}
