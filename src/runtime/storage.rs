use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use crate::definition::{Activity, ProcessDefinition};
use crate::error::{FlowError, Result};
use crate::runtime::task::{AddAssigneeRequest, Assignee, HistoricTask, Task};

// --- Interfaces ---

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn definition(&self, definition_id: &str) -> Result<Arc<ProcessDefinition>>;

    /// Full activity list in declaration order.
    async fn activities(&self, definition_id: &str) -> Result<Vec<Activity>> {
        Ok(self.definition(definition_id).await?.activities.clone())
    }

    async fn activity(&self, definition_id: &str, task_def_key: &str) -> Result<Activity> {
        self.definition(definition_id)
            .await?
            .activity(task_def_key)
            .cloned()
            .ok_or_else(|| FlowError::not_found("activity", format!("{}/{}", definition_id, task_def_key)))
    }
}

/// Commands run inside the runtime's own transaction boundary.
#[async_trait]
pub trait RuntimeCommands: Send + Sync {
    async fn active_tasks(&self, instance_id: &str) -> Result<Vec<Task>>;
    async fn terminate(&self, task: &Task) -> Result<()>;
    /// Starts a task at `activity` on `execution_id`, writing one variable on it.
    async fn start(&self, execution_id: &str, activity: &Activity, variable_name: &str, variable_value: Value) -> Result<Task>;
}

#[async_trait]
pub trait HistoryQuery: Send + Sync {
    /// Tasks of `task_def_key` in the instance that ended by completion.
    async fn find_ended(&self, instance_id: &str, task_def_key: &str) -> Result<Vec<HistoricTask>>;
}

#[async_trait]
pub trait VariableStore: Send + Sync {
    /// Everything visible to the task: instance scope overlaid by its execution.
    async fn task_variables(&self, task_id: &str) -> Result<HashMap<String, Value>>;
    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<Value>>;
    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()>;
}

/// Raw execution rows, below the runtime's command layer.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn definition_id_of(&self, instance_id: &str) -> Result<Option<String>>;
    async fn delete_execution(&self, execution_id: &str) -> Result<()>;
}

#[async_trait]
pub trait AssigneeSource: Send + Sync {
    async fn variable_name(&self, process_number: &str, activity_id: &str) -> Result<String>;
    /// Ordered assignees configured for the activity.
    async fn assignees(&self, process_number: &str, activity_id: &str) -> Result<Vec<Assignee>>;
    async fn sign_up_assignees(&self, variable_id: i64, element_id: &str) -> Result<Vec<Assignee>>;
}

#[async_trait]
pub trait AssigneeProvisioner: Send + Sync {
    /// Fire-and-forget: creation of the task is not awaited.
    async fn submit(&self, request: AddAssigneeRequest) -> Result<()>;
}

/// Collaborators handed to the navigator and the redirection engine.
#[derive(Clone)]
pub struct ProcessServices {
    pub definitions: Arc<dyn DefinitionStore>,
    pub runtime: Arc<dyn RuntimeCommands>,
    pub history: Arc<dyn HistoryQuery>,
    pub variables: Arc<dyn VariableStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub assignees: Arc<dyn AssigneeSource>,
    pub provisioner: Arc<dyn AssigneeProvisioner>,
}

// --- In-Memory Provisioning Queue ---

/// Unbounded so that `submit` never waits on the consumer.
pub struct InMemoryProvisionQueue {
    sender: mpsc::UnboundedSender<AddAssigneeRequest>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<AddAssigneeRequest>>,
}

impl InMemoryProvisionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: tx,
            receiver: tokio::sync::Mutex::new(rx),
        }
    }

    /// Drains whatever is queued right now without waiting.
    pub async fn drain(&self) -> Vec<AddAssigneeRequest> {
        let mut rx = self.receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(request) = rx.try_recv() {
            drained.push(request);
        }
        drained
    }
}

impl Default for InMemoryProvisionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssigneeProvisioner for InMemoryProvisionQueue {
    async fn submit(&self, request: AddAssigneeRequest) -> Result<()> {
        let target = request.task_def_key.clone();
        self.sender
            .send(request)
            .map_err(|e| FlowError::engine("submit_add_assignee", target, format!("Provision channel closed: {}", e)))
    }
}
