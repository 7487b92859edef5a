//! Permission rules and their compiled constraints (§3, §4.3)

use serde::{Deserialize, Serialize};

/// An allowed time-of-day window, in UTC hours. `start > end` wraps past
/// midnight (e.g. `{start: 22, end: 6}` permits 22:00-23:59 and 00:00-05:59).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u8,
    pub end: u8,
}

impl HourWindow {
    #[must_use]
    pub fn contains(&self, hour: u8) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// A structured constraint compiled from a [`PermissionRule`]'s free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompiledConstraint {
    ToolAllowlist { tools: Vec<String> },
    ToolDenylist { tools: Vec<String> },
    ActionRestriction { actions: Vec<String> },
    RateLimit {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_per_minute: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_per_hour: Option<u32>,
    },
    TimeWindow { allowed_hours_utc: HourWindow },
    PurposeRestriction { purposes: Vec<String> },
}

/// A free-form, human-authored rule compiled into zero or more
/// [`CompiledConstraint`]s at add/update time (§4.3 — not at checkout time).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    pub id: String,
    pub text: String,
    pub compiled_constraints: Vec<CompiledConstraint>,
    pub created_at_ms: i64,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_window_handles_wraparound() {
        let w = HourWindow { start: 22, end: 6 };
        assert!(w.contains(23));
        assert!(w.contains(2));
        assert!(!w.contains(10));
    }

    #[test]
    fn hour_window_handles_normal_range() {
        let w = HourWindow { start: 9, end: 17 };
        assert!(w.contains(9));
        assert!(!w.contains(17));
        assert!(!w.contains(20));
    }

    #[test]
    fn compiled_constraint_serializes_tagged() {
        let c = CompiledConstraint::ToolDenylist {
            tools: vec!["browser".to_string()],
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"tool_denylist\""));
    }
}
