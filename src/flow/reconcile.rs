use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use crate::config::{CounterKeys, NamingConfig};
use crate::error::{FlowError, Result};
use crate::flow::naming::{derive_variable_name, is_starter};
use crate::runtime::storage::VariableStore;
use crate::runtime::task::Assignee;

/// 会签计数器: total / active / completed instances of a multi-instance activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MultiInstanceCounters {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
}

impl MultiInstanceCounters {
    pub fn converged(count: u64) -> Self {
        Self {
            total: count,
            active: count,
            completed: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.completed <= self.active && self.active <= self.total
    }

    /// Target value after a redirection of `target` tasks, and whether
    /// `observed` differs from it.
    pub fn repair(target: u64, observed: Self) -> (Self, bool) {
        let wanted = Self::converged(target);
        (wanted, observed != wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterRepair {
    pub execution_id: String,
    pub before: MultiInstanceCounters,
    pub after: MultiInstanceCounters,
    pub written: bool,
}

/// Assignees left without a task once redirected and finished tasks are counted.
pub fn outstanding_count(resolved: usize, current_equal_count: usize, finished: usize) -> usize {
    resolved.saturating_sub(current_equal_count + finished)
}

/// How the tasks created at the target activity get their assignee.
#[derive(Debug, Clone)]
pub struct AssigneePlan {
    variable_name: String,
    starter_binding: bool,
    starter: Option<String>,
    assignees: Vec<Assignee>,
}

impl AssigneePlan {
    pub fn new(configured: &str, assignees: Vec<Assignee>, starter: Option<String>, naming: &NamingConfig) -> Self {
        Self {
            variable_name: derive_variable_name(configured, naming),
            starter_binding: is_starter(configured, naming),
            starter,
            assignees,
        }
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn assignees(&self) -> &[Assignee] {
        &self.assignees
    }

    /// Fails before anything is mutated if `candidates` tasks cannot all be bound.
    pub fn ensure_resolvable(&self, candidates: usize, multi_instance: bool) -> Result<()> {
        if candidates == 0 {
            return Ok(());
        }
        if self.assignees.is_empty() && (multi_instance || !self.starter_binding) {
            return Err(FlowError::InvalidState(format!(
                "no assignees resolved for variable {}",
                self.variable_name
            )));
        }
        if self.starter_binding && self.starter.is_none() {
            return Err(FlowError::InvalidState("starter identity is not set on the instance".to_string()));
        }
        Ok(())
    }

    /// Positional lookup; positions past the end reuse the last assignee.
    pub fn assignee_at(&self, position: usize) -> Result<&Assignee> {
        self.assignees
            .get(position)
            .or_else(|| self.assignees.last())
            .ok_or_else(|| FlowError::InvalidState("assignee list is empty".to_string()))
    }

    /// Variable written on the task started for the candidate at `position`.
    pub fn binding(&self, position: usize) -> Result<(String, Value)> {
        let value = if self.starter_binding {
            self.starter
                .clone()
                .ok_or_else(|| FlowError::InvalidState("starter identity is not set on the instance".to_string()))?
        } else {
            self.assignee_at(position)?.id.clone()
        };
        Ok((self.variable_name.clone(), json!(value)))
    }

    /// Tail of the assignee list not covered by the first `covered` entries.
    pub fn outstanding(&self, covered: usize) -> &[Assignee] {
        let start = covered.min(self.assignees.len());
        &self.assignees[start..]
    }
}

/// Reads and repairs counters through the variable store.
#[derive(Clone)]
pub struct Reconciler {
    variables: Arc<dyn VariableStore>,
    keys: CounterKeys,
}

impl Reconciler {
    pub fn new(variables: Arc<dyn VariableStore>, keys: CounterKeys) -> Self {
        Self { variables, keys }
    }

    async fn read_counter(&self, execution_id: &str, name: &str) -> Result<u64> {
        match self.variables.get_variable(execution_id, name).await? {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| {
                FlowError::InvalidState(format!("counter {} on execution {} is not a count: {}", name, execution_id, value))
            }),
        }
    }

    pub async fn read_counters(&self, execution_id: &str) -> Result<MultiInstanceCounters> {
        Ok(MultiInstanceCounters {
            total: self.read_counter(execution_id, &self.keys.total).await?,
            active: self.read_counter(execution_id, &self.keys.active).await?,
            completed: self.read_counter(execution_id, &self.keys.completed).await?,
        })
    }

    /// Writes only when the counters are not already converged on
    /// `current_equal_count`, so a second call is a no-op.
    pub async fn repair_counters(&self, execution_id: &str, current_equal_count: u64) -> Result<CounterRepair> {
        let before = self.read_counters(execution_id).await?;
        let (after, changed) = MultiInstanceCounters::repair(current_equal_count, before);

        if changed {
            self.variables.set_variable(execution_id, &self.keys.total, json!(after.total)).await?;
            self.variables.set_variable(execution_id, &self.keys.active, json!(after.active)).await?;
            self.variables.set_variable(execution_id, &self.keys.completed, json!(after.completed)).await?;
            info!(execution_id = %execution_id, ?before, ?after, "Repaired multi-instance counters");
        } else {
            debug!(execution_id = %execution_id, ?after, "Multi-instance counters already converged");
        }

        Ok(CounterRepair {
            execution_id: execution_id.to_string(),
            before,
            after,
            written: changed,
        })
    }
}
