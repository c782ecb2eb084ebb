//! Tiered parsing of model output into tasks.
//!
//! Tier 1 expects strict JSON (optionally fenced); tier 2 is a best-effort
//! line heuristic for enumerated or bulleted text. Both return `None`/empty
//! on failure instead of raising; the orchestrator owns the fallback
//! decision.

use crate::plan::{ParseStatus, Task};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*").expect("fence pattern"))
}

fn line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+\.|-)\s*(.*?)\s*(?:[-:|—]\s*(.*))?$").expect("line pattern"))
}

fn duration_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+\s*(?:days?|weeks?|hrs?|hours?))").expect("duration pattern"))
}

fn depends_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)depends?\s*(?:on)?:?\s*([^,;)\n]+)").expect("depends pattern"))
}

fn depends_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",|and").expect("depends separator"))
}

/// Tier 1: strict JSON parse.
///
/// Strips surrounding code fences, then accepts either a top-level array of
/// task objects or an object exposing a `tasks` array. Any parse error yields
/// `None`.
pub fn parse_json_tasks(text: &str) -> Option<Vec<Task>> {
    let cleaned = fence_pattern().replace_all(text, "");
    let cleaned = cleaned.trim();

    let value: Value = serde_json::from_str(cleaned).ok()?;
    let tasks_value = match value {
        Value::Array(_) => value,
        Value::Object(ref map) if map.get("tasks").map(Value::is_array).unwrap_or(false) => {
            map.get("tasks").cloned()?
        }
        _ => return None,
    };

    serde_json::from_value(tasks_value).ok()
}

/// Tier 2: best-effort heuristic over enumerated/bulleted lines.
///
/// Lines matching a `1.` or `-` prefix yield a task; the trailing remainder
/// after a separator is mined for a duration token and a dependency clause.
/// Unmatched lines are silently skipped. Deadlines are never populated here.
pub fn parse_text_tasks(text: &str) -> Vec<Task> {
    let mut tasks = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(captures) = line_pattern().captures(line) else {
            continue;
        };

        let name = captures
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(line);
        let rest = captures.get(2).map(|m| m.as_str()).unwrap_or("");

        let duration = duration_pattern()
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let depends_on = depends_pattern()
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|m| {
                depends_separator()
                    .split(m.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut task = Task::new(name);
        task.depends_on = depends_on;
        task.duration = duration;
        tasks.push(task);
    }

    tasks
}

/// Run the tiers in order and report which one produced tasks.
/// `None` means total parse failure.
pub fn parse_tasks(raw: &str) -> Option<(Vec<Task>, ParseStatus)> {
    if let Some(tasks) = parse_json_tasks(raw) {
        if !tasks.is_empty() {
            return Some((tasks, ParseStatus::Json));
        }
    }

    let tasks = parse_text_tasks(raw);
    if !tasks.is_empty() {
        return Some((tasks, ParseStatus::Text));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_tier_accepts_top_level_array() {
        let raw = r#"[{ "name": "Market research", "dependsOn": [], "duration": "2 days", "deadline": "Day 2" }]"#;
        let tasks = parse_json_tasks(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Market research");
        assert_eq!(tasks[0].duration, "2 days");
        assert_eq!(tasks[0].deadline, "Day 2");
    }

    #[test]
    fn json_tier_accepts_tasks_field() {
        let raw = r#"{ "tasks": [{ "name": "Design MVP", "dependsOn": ["Market research"] }] }"#;
        let tasks = parse_json_tasks(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].depends_on, vec!["Market research"]);
    }

    #[test]
    fn json_tier_strips_code_fences() {
        let raw = "```json\n[{ \"name\": \"Draft outline\" }]\n```";
        let tasks = parse_json_tasks(raw).unwrap();
        assert_eq!(tasks[0].name, "Draft outline");
    }

    #[test]
    fn json_tier_rejects_malformed_input() {
        assert!(parse_json_tasks("not json at all").is_none());
        assert!(parse_json_tasks("{ \"tasks\": \"nope\" }").is_none());
        assert!(parse_json_tasks("42").is_none());
    }

    #[test]
    fn text_tier_extracts_name_and_duration() {
        let tasks = parse_text_tasks("1. Draft outline - 2 days");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Draft outline");
        assert_eq!(tasks[0].duration, "2 days");
        assert_eq!(tasks[0].deadline, "");
    }

    #[test]
    fn text_tier_extracts_dependency_clause() {
        let tasks = parse_text_tasks("- Build site - 4 days, depends on: Draft outline and Review");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].duration, "4 days");
        assert_eq!(tasks[0].depends_on, vec!["Draft outline", "Review"]);
    }

    #[test]
    fn text_tier_skips_unmatched_lines() {
        let raw = "Here is your plan:\n1. Research - 1 week\nGood luck!";
        let tasks = parse_text_tasks(raw);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Research");
        assert_eq!(tasks[0].duration, "1 week");
    }

    #[test]
    fn text_tier_handles_bulleted_lines_without_remainder() {
        let tasks = parse_text_tasks("- Ship it");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Ship it");
        assert_eq!(tasks[0].duration, "");
        assert!(tasks[0].depends_on.is_empty());
    }

    #[test]
    fn selection_prefers_json_over_text() {
        let raw = "[{ \"name\": \"From JSON\" }]";
        let (tasks, status) = parse_tasks(raw).unwrap();
        assert_eq!(status, ParseStatus::Json);
        assert_eq!(tasks[0].name, "From JSON");
    }

    #[test]
    fn selection_falls_back_to_text_tier() {
        let raw = "not json\n1. Draft outline - 2 days";
        let (tasks, status) = parse_tasks(raw).unwrap();
        assert_eq!(status, ParseStatus::Text);
        assert_eq!(tasks[0].name, "Draft outline");
        assert_eq!(tasks[0].duration, "2 days");
    }

    #[test]
    fn selection_reports_total_failure() {
        assert!(parse_tasks("nothing useful here").is_none());
        assert!(parse_tasks("").is_none());
        assert!(parse_tasks("[]").is_none());
    }
}
