use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::config::RedirectConfig;
use crate::error::{FlowError, Result, require_id};
use crate::flow::reconcile::{AssigneePlan, CounterRepair, Reconciler};
use crate::runtime::lock::InstanceLocks;
use crate::runtime::storage::ProcessServices;
use crate::runtime::task::{AddAssigneeRequest, Assignee, ProcessOperation, Task};

/// Result of one redirection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RedirectOutcome {
    /// Definition keys of the parallel tasks terminated without replacement.
    pub pruned: Vec<String>,
    /// Tasks started at the target activity, in candidate order.
    pub started: Vec<Task>,
    /// Set when finished sibling tasks forced a counter repair.
    pub counters: Option<CounterRepair>,
    /// Assignees handed to the provisioner, in submission order.
    pub provisioned: Vec<Assignee>,
}

/// Shared instance variables read from the first active task.
struct VariableContext {
    process_number: String,
    form_code: Option<String>,
    starter: Option<String>,
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Adds the task at fault to a runtime error that only names the execution.
fn at_task(err: FlowError, task: &Task) -> FlowError {
    match err {
        FlowError::EngineOperation { operation, target, message } => FlowError::EngineOperation {
            operation,
            target: format!("{} (replacing task {})", target, task.id),
            message,
        },
        other => other,
    }
}

/// 任务跳转引擎
/// Moves active tasks of a running instance to another activity and keeps
/// the multi-instance bookkeeping truthful afterwards.
pub struct TaskRedirector {
    services: ProcessServices,
    config: Arc<RedirectConfig>,
    reconciler: Reconciler,
    locks: InstanceLocks,
}

impl TaskRedirector {
    pub fn new(services: ProcessServices, config: RedirectConfig) -> Self {
        let reconciler = Reconciler::new(services.variables.clone(), config.counters.clone());
        Self {
            services,
            config: Arc::new(config),
            reconciler,
            locks: InstanceLocks::new(),
        }
    }

    /// Redirects the instance's currently active tasks of `source_key`.
    pub async fn move_active(&self, instance_id: &str, source_key: &str, target_key: &str) -> Result<RedirectOutcome> {
        require_id("process instance id", instance_id)?;
        require_id("source task definition key", source_key)?;
        require_id("target task definition key", target_key)?;

        let _guard = self.locks.acquire(instance_id).await;
        let current = self.services.runtime.active_tasks(instance_id).await?;
        if current.is_empty() {
            return Err(FlowError::InvalidState(format!("instance {} has no active task", instance_id)));
        }
        self.redirect(instance_id, &current, source_key, target_key).await
    }

    /// Redirects `current_tasks`, the full active task list of one instance.
    /// Tasks whose key differs from `source_key` are terminated without
    /// replacement and reported in [`RedirectOutcome::pruned`].
    pub async fn move_to(&self, current_tasks: &[Task], source_key: &str, target_key: &str) -> Result<RedirectOutcome> {
        require_id("source task definition key", source_key)?;
        require_id("target task definition key", target_key)?;
        let first = current_tasks
            .first()
            .ok_or_else(|| FlowError::InvalidArgument("current task list is empty".to_string()))?;
        let instance_id = first.process_instance_id.clone();
        if let Some(stray) = current_tasks.iter().find(|t| t.process_instance_id != instance_id) {
            return Err(FlowError::InvalidArgument(format!(
                "task {} belongs to instance {}, not {}",
                stray.id, stray.process_instance_id, instance_id
            )));
        }

        let _guard = self.locks.acquire(&instance_id).await;
        self.redirect(&instance_id, current_tasks, source_key, target_key).await
    }

    async fn variable_context(&self, first: &Task) -> Result<VariableContext> {
        let variables: HashMap<String, Value> = self.services.variables.task_variables(&first.id).await?;
        let keys = &self.config.variables;
        let process_number = as_text(variables.get(&keys.process_number)).ok_or_else(|| {
            FlowError::InvalidState(format!("variable {} is not set on task {}", keys.process_number, first.id))
        })?;
        Ok(VariableContext {
            process_number,
            form_code: as_text(variables.get(&keys.form_code)),
            starter: as_text(variables.get(&keys.starter)),
        })
    }

    async fn redirect(&self, instance_id: &str, current: &[Task], source_key: &str, target_key: &str) -> Result<RedirectOutcome> {
        let services = &self.services;
        let first = &current[0];

        // 1. shared variables
        let context = self.variable_context(first).await?;

        // 2. target activity and its assignees
        let activity = services.definitions.activity(&first.process_definition_id, target_key).await?;
        let configured = services.assignees.variable_name(&context.process_number, &activity.id).await?;
        let resolved = services.assignees.assignees(&context.process_number, &activity.id).await?;
        let plan = AssigneePlan::new(&configured, resolved, context.starter.clone(), &self.config.naming);

        let candidates = current.iter().filter(|t| t.task_def_key == source_key).count();
        plan.ensure_resolvable(candidates, activity.multi_instance)?;

        // finished siblings need a redirected execution to anchor the counter repair
        let finished = services.history.find_ended(instance_id, source_key).await?;
        if candidates == 0 && !finished.is_empty() {
            return Err(FlowError::InvalidState(format!(
                "{} finished {} task(s) but no active {} task to redirect",
                finished.len(),
                source_key,
                source_key
            )));
        }

        info!(
            instance_id = %instance_id,
            source = %source_key,
            target = %activity.id,
            candidates,
            assignees = plan.assignees().len(),
            "Redirecting tasks"
        );

        // 3 + 4. prune siblings, replace candidates
        let mut outcome = RedirectOutcome::default();
        for task in current {
            if task.task_def_key != source_key {
                services.runtime.terminate(task).await?;
                debug!(task_id = %task.id, task_def_key = %task.task_def_key, "Pruned parallel task");
                outcome.pruned.push(task.task_def_key.clone());
                continue;
            }

            let position = outcome.started.len();
            let (variable_name, variable_value) = plan.binding(position)?;
            services.runtime.terminate(task).await?;
            let started = services.runtime
                .start(&task.execution_id, &activity, &variable_name, variable_value)
                .await
                .map_err(|e| at_task(e, task))?;
            debug!(
                task_id = %task.id,
                new_task_id = %started.id,
                execution_id = %task.execution_id,
                variable = %variable_name,
                "Moved task"
            );
            outcome.started.push(started);
        }
        let current_equal_count = outcome.started.len();

        // 5. finished siblings: purge their executions and repair counters
        if let Some(anchor) = outcome.started.first().filter(|_| !finished.is_empty()) {
            for historic in &finished {
                services.executions.delete_execution(&historic.execution_id).await?;
            }
            let repair = self.reconciler
                .repair_counters(&anchor.execution_id, current_equal_count as u64)
                .await?;
            outcome.counters = Some(repair);
        }

        // 6. assignees still without a task
        let covered = current_equal_count + finished.len();
        let outstanding = plan.outstanding(covered);
        if !outstanding.is_empty() {
            let form_code = context.form_code.clone().ok_or_else(|| {
                FlowError::InvalidState(format!("variable {} is not set on task {}", self.config.variables.form_code, first.id))
            })?;
            for assignee in outstanding {
                let request = AddAssigneeRequest {
                    form_code: form_code.clone(),
                    process_number: context.process_number.clone(),
                    task_def_key: activity.id.clone(),
                    operation: ProcessOperation::AddAssignee,
                    assignee: assignee.clone(),
                };
                services.provisioner.submit(request).await?;
                info!(instance_id = %instance_id, target = %activity.id, assignee = %assignee.id, "Submitted add-assignee request");
                outcome.provisioned.push(assignee.clone());
            }
        }

        if !outcome.pruned.is_empty() {
            warn!(instance_id = %instance_id, pruned = ?outcome.pruned, "Parallel branches pruned by redirection");
        }
        info!(
            instance_id = %instance_id,
            started = outcome.started.len(),
            provisioned = outcome.provisioned.len(),
            "Redirection finished"
        );
        Ok(outcome)
    }
}
