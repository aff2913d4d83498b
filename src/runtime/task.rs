use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 运行中的任务
/// Bound to exactly one execution and one activity (its task definition key).
/// Several tasks may share a key when the activity is multi-instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub execution_id: String,
    pub task_def_key: String,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Completed,
    /// Removed by a redirection rather than completed by its assignee.
    Terminated,
}

/// Closed, immutable record of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricTask {
    pub task_id: String,
    pub process_instance_id: String,
    pub execution_id: String,
    pub task_def_key: String,
    pub assignee: Option<String>,
    pub outcome: TaskOutcome,
    pub end_time: Option<DateTime<Utc>>,
}

impl HistoricTask {
    pub fn is_finished(&self) -> bool {
        self.outcome == TaskOutcome::Completed && self.end_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub name: String,
}

impl Assignee {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessOperation {
    AddAssignee,
}

/// 加签请求: asks the provisioning side for one more task at `task_def_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAssigneeRequest {
    pub form_code: String,
    pub process_number: String,
    pub task_def_key: String,
    pub operation: ProcessOperation,
    pub assignee: Assignee,
}
