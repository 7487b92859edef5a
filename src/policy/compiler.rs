//! Compiles `PermissionRule.text` into structured constraints (§4.3, §9)
//!
//! Deterministic, heuristic, offline substring matching over normalized
//! (lowercased, trimmed) text. New rule patterns extend [`PATTERNS`] /
//! the functions below, never the checkout path.

use crate::core::rule::{CompiledConstraint, HourWindow};

/// Split a comma/`and`/`or`-separated list of bare words into trimmed,
/// non-empty tokens.
fn split_terms(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c == ';')
        .flat_map(|part| part.split(" and ").flat_map(|p| p.split(" or ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn extract_allowlist(text: &str) -> Option<Vec<String>> {
    if let Some(rest) = text.strip_prefix("only allow ") {
        return Some(split_terms(rest));
    }
    if text.starts_with("only") {
        if let Some(idx) = text.find(" tool ") {
            let rest = &text[idx + " tool ".len()..];
            return Some(split_terms(rest));
        }
    }
    None
}

fn extract_denylist(text: &str) -> Option<Vec<String>> {
    if let Some(rest) = text.strip_prefix("block ") {
        return Some(split_terms(rest));
    }
    if let Some(rest) = text.strip_prefix("deny ") {
        return Some(split_terms(rest));
    }
    if let Some(rest) = text.strip_prefix("no ") {
        if let Some(rest) = rest.strip_suffix(" access") {
            return Some(split_terms(rest));
        }
    }
    None
}

fn extract_read_only(text: &str) -> bool {
    text.contains("read only") || text.contains("readonly")
}

/// Parse the first run of ASCII digits that appears after `marker`.
fn number_after(text: &str, marker: &str) -> Option<u32> {
    let idx = text.find(marker)?;
    let tail = &text[idx + marker.len()..];
    let digits: String = tail
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn extract_rate_limit(text: &str) -> Option<CompiledConstraint> {
    if !text.contains("no more than") {
        return None;
    }
    let max_per_minute = number_after(text, "no more than").filter(|_| text.contains("per minute"));
    let max_per_hour = number_after(text, "no more than").filter(|_| text.contains("per hour"));
    if max_per_minute.is_none() && max_per_hour.is_none() {
        return None;
    }
    Some(CompiledConstraint::RateLimit {
        max_per_minute,
        max_per_hour,
    })
}

fn parse_hour(hhmm: &str) -> Option<u8> {
    let (hour, _minute) = hhmm.split_once(':')?;
    hour.trim().parse().ok()
}

fn extract_time_window(text: &str) -> Option<CompiledConstraint> {
    let idx = text.find("only between ")?;
    let rest = &text[idx + "only between ".len()..];
    let (start_str, rest) = rest.split_once(" and ")?;
    let end_str = rest
        .split(" utc")
        .next()
        .unwrap_or(rest)
        .trim();
    let start = parse_hour(start_str.trim())?;
    let end = parse_hour(end_str)?;
    Some(CompiledConstraint::TimeWindow {
        allowed_hours_utc: HourWindow { start, end },
    })
}

fn extract_purpose(text: &str) -> Option<Vec<String>> {
    let idx = text.find("for ")?;
    let rest = &text[idx + "for ".len()..];
    let purpose = rest.strip_suffix(" only")?;
    Some(split_terms(purpose))
}

/// Compile a rule's free text into zero or more constraints. Multiple
/// patterns may match the same text; all that match are emitted.
#[must_use]
pub fn compile(text: &str) -> Vec<CompiledConstraint> {
    let normalized = text.trim().to_lowercase();
    let mut out = Vec::new();

    if let Some(tools) = extract_allowlist(&normalized) {
        if !tools.is_empty() {
            out.push(CompiledConstraint::ToolAllowlist { tools });
        }
    }
    if let Some(tools) = extract_denylist(&normalized) {
        if !tools.is_empty() {
            out.push(CompiledConstraint::ToolDenylist { tools });
        }
    }
    if extract_read_only(&normalized) {
        out.push(CompiledConstraint::ActionRestriction {
            actions: vec!["read".to_string(), "list".to_string(), "get".to_string()],
        });
    }
    if let Some(c) = extract_rate_limit(&normalized) {
        out.push(c);
    }
    if let Some(c) = extract_time_window(&normalized) {
        out.push(c);
    }
    if let Some(purposes) = extract_purpose(&normalized) {
        if !purposes.is_empty() {
            out.push(CompiledConstraint::PurposeRestriction { purposes });
        }
    }

    out
}
