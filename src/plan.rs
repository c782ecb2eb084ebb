//! Plan data model: tasks, parse provenance, and generation results.

use serde::{Deserialize, Serialize};

/// Progress state of a single task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// A single actionable step in a generated plan.
///
/// All fields besides `name` default so that sparse model output still
/// deserializes; progress fields are mutated only by the external
/// task-progress layer, never by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    #[serde(default, rename = "dependsOn")]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub deadline: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub progress: u8,

    #[serde(default)]
    pub notes: String,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            duration: String::new(),
            deadline: String::new(),
            status: TaskStatus::default(),
            progress: 0,
            notes: String::new(),
        }
    }
}

/// Which parsing tier produced the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    /// Strict JSON parse of the model output.
    Json,
    /// Heuristic line-by-line parse.
    Text,
    /// Deterministic fallback plan; the call or parse failed entirely.
    Mock,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Json => "json",
            ParseStatus::Text => "text",
            ParseStatus::Mock => "mock",
        }
    }
}

/// Outcome of one generation run. Immutable once produced; cache entries hold
/// this value verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub tasks: Vec<Task>,

    /// Verbatim model output, or a synthetic `mock (error: ...)` marker.
    pub raw: String,

    #[serde(rename = "parseStatus")]
    pub parse_status: ParseStatus,

    #[serde(rename = "aiModel")]
    pub ai_model: String,

    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
}

/// A generation result decorated with cache provenance. The `cached` flag is
/// added by the orchestrator and is never part of the cached value itself.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub result: GenerationResult,
    pub cached: bool,
}

/// The fixed offline plan used when generation or parsing fails entirely.
/// Each task depends on its predecessor.
pub fn mock_plan() -> Vec<Task> {
    let mut research = Task::new("Research and define target market");
    research.duration = "2 days".to_string();

    let mut design = Task::new("Design MVP");
    design.depends_on = vec![research.name.clone()];
    design.duration = "4 days".to_string();

    let mut build = Task::new("Build MVP");
    build.depends_on = vec![design.name.clone()];
    build.duration = "5 days".to_string();

    let mut test = Task::new("Test & iterate");
    test.depends_on = vec![build.name.clone()];
    test.duration = "2 days".to_string();

    vec![research, design, build, test]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_task_deserializes_with_defaults() {
        let task: Task = serde_json::from_value(json!({ "name": "Draft outline" })).unwrap();
        assert_eq!(task.name, "Draft outline");
        assert!(task.depends_on.is_empty());
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.progress, 0);
        assert_eq!(task.notes, "");
    }

    #[test]
    fn task_status_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        let status: TaskStatus = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(status, TaskStatus::Done);
    }

    #[test]
    fn mock_plan_chains_dependencies() {
        let tasks = mock_plan();
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].name, "Research and define target market");
        assert_eq!(tasks[1].name, "Design MVP");
        assert_eq!(tasks[2].name, "Build MVP");
        assert_eq!(tasks[3].name, "Test & iterate");

        assert!(tasks[0].depends_on.is_empty());
        for pair in tasks.windows(2) {
            assert_eq!(pair[1].depends_on, vec![pair[0].name.clone()]);
        }
    }

    #[test]
    fn plan_response_flattens_result() {
        let response = PlanResponse {
            result: GenerationResult {
                tasks: vec![Task::new("a")],
                raw: "[]".to_string(),
                parse_status: ParseStatus::Json,
                ai_model: "gemini-2.0-flash-001".to_string(),
                latency_ms: 42,
            },
            cached: true,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["parseStatus"], "json");
        assert_eq!(value["latencyMs"], 42);
        assert_eq!(value["cached"], true);
    }
}
