//! Job tasks
//!
//! A [`Task`] is a [`TaskKind`] plus run conditions and an optional on-cancel
//! task. The on-cancel task is a [`CancelTask`], which has no on-cancel slot
//! of its own: non-nesting holds by construction.

use serde::{Deserialize, Serialize};

use crate::plugin::ConfigProperty;

/// One step of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(flatten)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_if: Vec<RunIf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_cancel: Option<Box<CancelTask>>,
}

/// Task run when the owning task is cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTask {
    #[serde(flatten)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_if: Vec<RunIf>,
}

/// What a task does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskKind {
    /// Run a command
    Exec(ExecTask),
    /// Run a build tool
    Build(BuildTask),
    /// Fetch an artifact produced by an upstream job
    Fetch(FetchTask),
    /// Plugin-provided task
    Pluggable(PluggableTask),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecTask {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTask {
    pub tool: BuildTool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTool {
    Ant,
    Nant,
    Rake,
}

/// Fetch an artifact from a job of this or an ancestor pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTask {
    /// Ancestor path `a/b/c`: `a` is the pipeline fetched from, `c` a direct
    /// upstream of the current pipeline. Absent means the current pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    pub stage: String,
    pub job: String,
    pub source: String,
    /// `source` names a file rather than a directory
    #[serde(default)]
    pub is_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluggableTask {
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigProperty>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunIf {
    Passed,
    Failed,
    Any,
}

impl Task {
    /// Task with no run conditions and no on-cancel
    #[inline]
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            run_if: Vec::new(),
            on_cancel: None,
        }
    }

    /// Variant name as written in documents
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }

    /// The fetch details, if this is a fetch task
    #[inline]
    #[must_use]
    pub const fn as_fetch(&self) -> Option<&FetchTask> {
        match &self.kind {
            TaskKind::Fetch(fetch) => Some(fetch),
            _ => None,
        }
    }
}

impl TaskKind {
    /// Variant name as written in documents
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Exec(_) => "exec",
            Self::Build(_) => "build",
            Self::Fetch(_) => "fetch",
            Self::Pluggable(_) => "pluggable",
        }
    }
}

impl FetchTask {
    /// Ancestor path segments, empty when fetching from the current pipeline
    #[must_use]
    pub fn pipeline_path(&self) -> Vec<&str> {
        self.pipeline
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.split('/').collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_with_on_cancel_deserializes() {
        let task: Task = serde_json::from_value(json!({
            "type": "exec",
            "command": "make",
            "arguments": ["test"],
            "runIf": ["passed"],
            "onCancel": {"type": "exec", "command": "make", "arguments": ["clean"]}
        }))
        .unwrap();
        assert_eq!(task.kind_name(), "exec");
        assert_eq!(task.run_if, vec![RunIf::Passed]);
        let cancel = task.on_cancel.as_ref().unwrap();
        assert!(matches!(&cancel.kind, TaskKind::Exec(e) if e.arguments == ["clean"]));
    }

    #[test]
    fn fetch_pipeline_path_segments() {
        let mut fetch = FetchTask {
            pipeline: Some("uppest/up".into()),
            stage: "s".into(),
            job: "j".into(),
            source: "dist".into(),
            is_file: false,
            destination: None,
        };
        assert_eq!(fetch.pipeline_path(), vec!["uppest", "up"]);
        fetch.pipeline = Some("  ".into());
        assert!(fetch.pipeline_path().is_empty());
        fetch.pipeline = None;
        assert!(fetch.pipeline_path().is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let task = Task::new(TaskKind::Build(BuildTask {
            tool: BuildTool::Rake,
            build_file: None,
            target: Some("spec".into()),
            working_directory: None,
        }));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value, json!({"type": "build", "tool": "rake", "target": "spec"}));
        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }
}
