use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;
use crate::config::{CounterKeys, RedirectConfig, VariableKeys};
use crate::definition::{Activity, ProcessDefinition};
use crate::error::{FlowError, Result};
use crate::runtime::storage::{AssigneeSource, DefinitionStore, ExecutionStore, HistoryQuery, RuntimeCommands, VariableStore};
use crate::runtime::task::{AddAssigneeRequest, Assignee, HistoricTask, Task, TaskOutcome};

struct InstanceRecord {
    definition_id: String,
}

struct ExecutionRecord {
    instance_id: String,
    parent_id: Option<String>,
    activity_id: Option<String>,
    active: bool,
}

/// 内存版流程引擎
/// Reference runtime: the root execution of an instance shares the instance id,
/// multi-instance activities get a parent execution holding the counters and
/// one child execution per task.
pub struct InMemoryProcessEngine {
    definitions: DashMap<String, Arc<ProcessDefinition>>,
    instances: DashMap<String, InstanceRecord>,
    executions: DashMap<String, ExecutionRecord>,
    // Map<TaskID, (CreationSeq, Task)>
    tasks: DashMap<String, (u64, Task)>,
    // Map<InstanceID, History>
    history: DashMap<String, Vec<HistoricTask>>,
    // Map<ExecutionID, Map<VarName, Value>>
    variables: DashMap<String, DashMap<String, Value>>,
    seq: AtomicU64,
    variable_keys: VariableKeys,
    counter_keys: CounterKeys,
}

impl InMemoryProcessEngine {
    pub fn new() -> Self {
        Self::with_config(&RedirectConfig::default())
    }

    pub fn with_config(config: &RedirectConfig) -> Self {
        Self {
            definitions: DashMap::new(),
            instances: DashMap::new(),
            executions: DashMap::new(),
            tasks: DashMap::new(),
            history: DashMap::new(),
            variables: DashMap::new(),
            seq: AtomicU64::new(0),
            variable_keys: config.variables.clone(),
            counter_keys: config.counters.clone(),
        }
    }

    pub fn deploy(&self, definition: ProcessDefinition) {
        self.definitions.insert(definition.id.clone(), Arc::new(definition));
    }

    pub fn start_instance(&self, definition_id: &str, initial_vars: HashMap<String, Value>) -> Result<String> {
        if !self.definitions.contains_key(definition_id) {
            return Err(FlowError::not_found("process definition", definition_id));
        }
        let instance_id = Uuid::new_v4().to_string();
        self.instances.insert(instance_id.clone(), InstanceRecord {
            definition_id: definition_id.to_string(),
        });
        self.executions.insert(instance_id.clone(), ExecutionRecord {
            instance_id: instance_id.clone(),
            parent_id: None,
            activity_id: None,
            active: true,
        });
        let vars = DashMap::new();
        for (k, v) in initial_vars {
            vars.insert(k, v);
        }
        self.variables.insert(instance_id.clone(), vars);
        Ok(instance_id)
    }

    /// Puts the instance at `activity_id`: one task per assignee when the
    /// activity is multi-instance, otherwise a single task for the first one.
    pub fn enter_activity(&self, instance_id: &str, activity_id: &str, assignees: &[Assignee], variable_name: &str) -> Result<Vec<Task>> {
        let definition_id = self.definition_of(instance_id)?;
        let activity = self.load_definition(&definition_id)?
            .activity(activity_id)
            .cloned()
            .ok_or_else(|| FlowError::not_found("activity", activity_id))?;

        if !activity.multi_instance {
            let execution_id = self.new_execution(instance_id, Some(instance_id), &activity.id);
            let assignee = assignees.first().map(|a| a.id.clone());
            if let Some(id) = &assignee {
                self.write_local(&execution_id, variable_name, json!(id));
            }
            return Ok(vec![self.new_task(instance_id, &definition_id, &execution_id, &activity.id, assignee)]);
        }

        let parent_id = self.new_execution(instance_id, Some(instance_id), &activity.id);
        let count = assignees.len() as i64;
        self.write_local(&parent_id, &self.counter_keys.total, json!(count));
        self.write_local(&parent_id, &self.counter_keys.active, json!(count));
        self.write_local(&parent_id, &self.counter_keys.completed, json!(0));

        let mut created = Vec::with_capacity(assignees.len());
        for assignee in assignees {
            let execution_id = self.new_execution(instance_id, Some(&parent_id), &activity.id);
            self.write_local(&execution_id, variable_name, json!(assignee.id));
            created.push(self.new_task(instance_id, &definition_id, &execution_id, &activity.id, Some(assignee.id.clone())));
        }
        Ok(created)
    }

    /// Completes a task; its execution row stays behind until purged.
    pub fn complete_task(&self, task_id: &str) -> Result<HistoricTask> {
        let (_, task) = self.tasks.remove(task_id)
            .map(|(_, entry)| entry)
            .ok_or_else(|| FlowError::not_found("task", task_id))?;

        let parent_id = self.executions.get_mut(&task.execution_id).and_then(|mut exec| {
            exec.active = false;
            exec.parent_id.clone()
        });
        if let Some(parent_id) = parent_id {
            if let Some(scope) = self.variables.get(&parent_id) {
                if scope.contains_key(&self.counter_keys.total) {
                    let read = |key: &str| scope.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
                    let active = read(&self.counter_keys.active);
                    let completed = read(&self.counter_keys.completed);
                    scope.insert(self.counter_keys.active.clone(), json!((active - 1).max(0)));
                    scope.insert(self.counter_keys.completed.clone(), json!(completed + 1));
                }
            }
        }

        Ok(self.record_history(&task, TaskOutcome::Completed))
    }

    /// Consumer side of the provisioning queue.
    pub fn apply_add_assignee(&self, request: &AddAssigneeRequest) -> Result<Task> {
        let instance_id = self.instance_by_process_number(&request.process_number)
            .ok_or_else(|| FlowError::not_found("process instance", request.process_number.clone()))?;
        let definition_id = self.definition_of(&instance_id)?;

        let parent_id = self.multi_instance_execution(&instance_id, &request.task_def_key)
            .unwrap_or_else(|| instance_id.clone());
        if let Some(scope) = self.variables.get(&parent_id) {
            if scope.contains_key(&self.counter_keys.total) {
                let read = |key: &str| scope.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
                let total = read(&self.counter_keys.total);
                let active = read(&self.counter_keys.active);
                scope.insert(self.counter_keys.total.clone(), json!(total + 1));
                scope.insert(self.counter_keys.active.clone(), json!(active + 1));
            }
        }

        let execution_id = self.new_execution(&instance_id, Some(&parent_id), &request.task_def_key);
        debug!(instance_id = %instance_id, task_def_key = %request.task_def_key, assignee = %request.assignee.id, "Applied add-assignee request");
        Ok(self.new_task(&instance_id, &definition_id, &execution_id, &request.task_def_key, Some(request.assignee.id.clone())))
    }

    /// Execution holding the counters of a multi-instance activity.
    /// Found from any execution currently at the activity, walking up to
    /// the first scope that holds the counters.
    pub fn multi_instance_execution(&self, instance_id: &str, activity_id: &str) -> Option<String> {
        let at_activity: Vec<String> = self.executions.iter()
            .filter(|e| e.instance_id == instance_id && e.activity_id.as_deref() == Some(activity_id))
            .map(|e| e.key().clone())
            .collect();
        at_activity.iter()
            .flat_map(|id| self.scope_chain(id))
            .find(|id| self.variables.get(id).is_some_and(|s| s.contains_key(&self.counter_keys.total)))
    }

    /// `None` once the execution row is gone.
    pub fn execution_active(&self, execution_id: &str) -> Option<bool> {
        self.executions.get(execution_id).map(|e| e.active)
    }

    pub fn history_of(&self, instance_id: &str) -> Vec<HistoricTask> {
        self.history.get(instance_id).map(|h| h.value().clone()).unwrap_or_default()
    }

    // --- internals ---

    fn load_definition(&self, definition_id: &str) -> Result<Arc<ProcessDefinition>> {
        self.definitions.get(definition_id)
            .map(|d| d.value().clone())
            .ok_or_else(|| FlowError::not_found("process definition", definition_id))
    }

    fn definition_of(&self, instance_id: &str) -> Result<String> {
        self.instances.get(instance_id)
            .map(|i| i.definition_id.clone())
            .ok_or_else(|| FlowError::not_found("process instance", instance_id))
    }

    fn instance_by_process_number(&self, process_number: &str) -> Option<String> {
        self.instances.iter()
            .map(|i| i.key().clone())
            .find(|id| {
                self.lookup_local(id, &self.variable_keys.process_number)
                    .is_some_and(|v| v.as_str() == Some(process_number) || v.to_string() == process_number)
            })
    }

    fn new_execution(&self, instance_id: &str, parent_id: Option<&str>, activity_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.executions.insert(id.clone(), ExecutionRecord {
            instance_id: instance_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            activity_id: Some(activity_id.to_string()),
            active: true,
        });
        id
    }

    fn new_task(&self, instance_id: &str, definition_id: &str, execution_id: &str, task_def_key: &str, assignee: Option<String>) -> Task {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            process_instance_id: instance_id.to_string(),
            process_definition_id: definition_id.to_string(),
            execution_id: execution_id.to_string(),
            task_def_key: task_def_key.to_string(),
            assignee,
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.tasks.insert(task.id.clone(), (seq, task.clone()));
        task
    }

    fn record_history(&self, task: &Task, outcome: TaskOutcome) -> HistoricTask {
        let record = HistoricTask {
            task_id: task.id.clone(),
            process_instance_id: task.process_instance_id.clone(),
            execution_id: task.execution_id.clone(),
            task_def_key: task.task_def_key.clone(),
            assignee: task.assignee.clone(),
            outcome,
            end_time: Some(Utc::now()),
        };
        self.history.entry(task.process_instance_id.clone()).or_default().push(record.clone());
        record
    }

    fn lookup_local(&self, scope_id: &str, name: &str) -> Option<Value> {
        let scope = self.variables.get(scope_id)?;
        let value = scope.get(name).map(|v| v.value().clone());
        value
    }

    fn write_local(&self, execution_id: &str, name: &str, value: Value) {
        let scope = self.variables.entry(execution_id.to_string()).or_insert_with(DashMap::new);
        scope.insert(name.to_string(), value);
    }

    /// Execution ids from `execution_id` up to the instance root.
    fn scope_chain(&self, execution_id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(execution_id.to_string());
        while let Some(id) = current {
            current = self.executions.get(&id).and_then(|e| e.parent_id.clone());
            chain.push(id);
        }
        chain
    }
}

impl Default for InMemoryProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryProcessEngine {
    async fn definition(&self, definition_id: &str) -> Result<Arc<ProcessDefinition>> {
        self.load_definition(definition_id)
    }
}

#[async_trait]
impl RuntimeCommands for InMemoryProcessEngine {
    async fn active_tasks(&self, instance_id: &str) -> Result<Vec<Task>> {
        let mut active: Vec<(u64, Task)> = self.tasks.iter()
            .filter(|entry| entry.value().1.process_instance_id == instance_id)
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by_key(|(seq, _)| *seq);
        Ok(active.into_iter().map(|(_, task)| task).collect())
    }

    async fn terminate(&self, task: &Task) -> Result<()> {
        if self.tasks.remove(&task.id).is_none() {
            return Err(FlowError::engine("terminate", format!("task {}", task.id), "task is not active"));
        }
        if let Some(mut exec) = self.executions.get_mut(&task.execution_id) {
            exec.active = false;
        }
        self.record_history(task, TaskOutcome::Terminated);
        Ok(())
    }

    async fn start(&self, execution_id: &str, activity: &Activity, variable_name: &str, variable_value: Value) -> Result<Task> {
        let instance_id = {
            let mut exec = self.executions.get_mut(execution_id)
                .ok_or_else(|| FlowError::engine("start", format!("execution {}", execution_id), "execution not found"))?;
            exec.active = true;
            exec.activity_id = Some(activity.id.clone());
            exec.instance_id.clone()
        };
        let definition_id = self.definition_of(&instance_id)
            .map_err(|e| FlowError::engine("start", format!("execution {}", execution_id), e))?;

        let assignee = variable_value.as_str().map(str::to_string);
        self.write_local(execution_id, variable_name, variable_value);
        Ok(self.new_task(&instance_id, &definition_id, execution_id, &activity.id, assignee))
    }
}

#[async_trait]
impl HistoryQuery for InMemoryProcessEngine {
    async fn find_ended(&self, instance_id: &str, task_def_key: &str) -> Result<Vec<HistoricTask>> {
        Ok(self.history_of(instance_id)
            .into_iter()
            .filter(|h| h.task_def_key == task_def_key && h.is_finished())
            .collect())
    }
}

#[async_trait]
impl VariableStore for InMemoryProcessEngine {
    async fn task_variables(&self, task_id: &str) -> Result<HashMap<String, Value>> {
        let execution_id = self.tasks.get(task_id)
            .map(|entry| entry.value().1.execution_id.clone())
            .ok_or_else(|| FlowError::not_found("task", task_id))?;

        let mut merged = HashMap::new();
        // root first so that narrower scopes win
        for scope_id in self.scope_chain(&execution_id).iter().rev() {
            if let Some(scope) = self.variables.get(scope_id) {
                for item in scope.iter() {
                    merged.insert(item.key().clone(), item.value().clone());
                }
            }
        }
        Ok(merged)
    }

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<Value>> {
        if !self.executions.contains_key(execution_id) {
            return Err(FlowError::not_found("execution", execution_id));
        }
        for scope_id in self.scope_chain(execution_id) {
            if let Some(value) = self.lookup_local(&scope_id, name) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        if !self.executions.contains_key(execution_id) {
            return Err(FlowError::engine("set_variable", format!("execution {}", execution_id), "execution not found"));
        }
        let owner = self.scope_chain(execution_id)
            .into_iter()
            .find(|id| self.variables.get(id).is_some_and(|s| s.contains_key(name)))
            .unwrap_or_else(|| execution_id.to_string());
        self.write_local(&owner, name, value);
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryProcessEngine {
    async fn definition_id_of(&self, instance_id: &str) -> Result<Option<String>> {
        Ok(self.instances.get(instance_id).map(|i| i.definition_id.clone()))
    }

    async fn delete_execution(&self, execution_id: &str) -> Result<()> {
        self.executions.remove(execution_id);
        self.variables.remove(execution_id);
        Ok(())
    }
}

struct ActivityAssignees {
    variable_name: String,
    assignees: Vec<Assignee>,
}

/// Assignee configuration keyed by (process number, activity id).
pub struct InMemoryAssigneeSource {
    bindings: DashMap<(String, String), ActivityAssignees>,
    sign_ups: DashMap<(i64, String), Vec<Assignee>>,
}

impl InMemoryAssigneeSource {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            sign_ups: DashMap::new(),
        }
    }

    pub fn configure(&self, process_number: &str, activity_id: &str, variable_name: &str, assignees: Vec<Assignee>) {
        self.bindings.insert(
            (process_number.to_string(), activity_id.to_string()),
            ActivityAssignees { variable_name: variable_name.to_string(), assignees },
        );
    }

    pub fn add_sign_up(&self, variable_id: i64, element_id: &str, assignees: Vec<Assignee>) {
        self.sign_ups.entry((variable_id, element_id.to_string())).or_default().extend(assignees);
    }
}

impl Default for InMemoryAssigneeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssigneeSource for InMemoryAssigneeSource {
    async fn variable_name(&self, process_number: &str, activity_id: &str) -> Result<String> {
        self.bindings.get(&(process_number.to_string(), activity_id.to_string()))
            .map(|b| b.variable_name.clone())
            .ok_or_else(|| FlowError::not_found("assignee variable", format!("{}/{}", process_number, activity_id)))
    }

    async fn assignees(&self, process_number: &str, activity_id: &str) -> Result<Vec<Assignee>> {
        Ok(self.bindings.get(&(process_number.to_string(), activity_id.to_string()))
            .map(|b| b.assignees.clone())
            .unwrap_or_default())
    }

    async fn sign_up_assignees(&self, variable_id: i64, element_id: &str) -> Result<Vec<Assignee>> {
        Ok(self.sign_ups.get(&(variable_id, element_id.to_string()))
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }
}
