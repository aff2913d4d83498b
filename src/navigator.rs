use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use crate::definition::Activity;
use crate::error::{FlowError, Result, require_id};
use crate::runtime::storage::{DefinitionStore, ExecutionStore};

/// Destination of the first outgoing transition of `node_id`.
/// Further outgoing transitions are ignored.
pub fn next_from<'a>(node_id: &str, activities: &'a [Activity]) -> Option<&'a Activity> {
    let activity = activities.iter().find(|a| a.id == node_id)?;
    let transition = activity.outgoing.first()?;
    activities.iter().find(|a| a.id == transition.destination)
}

/// All destinations of the first activity (in list order) whose id appears in
/// the comma-joined `node_ids`. Scanning stops at that first match, so the
/// result never merges transitions of several listed nodes.
pub fn next_set_from<'a>(node_ids: &str, activities: &'a [Activity]) -> Vec<&'a Activity> {
    let wanted: Vec<&str> = node_ids.split(',').collect();

    let Some(matched) = activities.iter().find(|a| wanted.contains(&a.id.as_str())) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    matched
        .outgoing
        .iter()
        .filter(|tr| seen.insert(tr.destination.as_str()))
        .filter_map(|tr| activities.iter().find(|a| a.id == tr.destination))
        .collect()
}

/// 流程图导航
/// Read-only lookups against deployed definitions.
#[derive(Clone)]
pub struct ProcessNavigator {
    definitions: Arc<dyn DefinitionStore>,
    executions: Arc<dyn ExecutionStore>,
}

impl ProcessNavigator {
    pub fn new(definitions: Arc<dyn DefinitionStore>, executions: Arc<dyn ExecutionStore>) -> Self {
        Self { definitions, executions }
    }

    pub async fn activities_of(&self, definition_id: &str) -> Result<Vec<Activity>> {
        self.definitions.activities(definition_id).await
    }

    /// [`next_from`] against the definition the instance runs.
    pub async fn next_for_instance(&self, node_id: &str, instance_id: &str) -> Result<Option<Activity>> {
        require_id("node id", node_id)?;
        require_id("process instance id", instance_id)?;

        let definition_id = self.executions
            .definition_id_of(instance_id)
            .await?
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FlowError::not_found("process definition of instance", instance_id))?;

        let activities = self.activities_of(&definition_id).await?;
        let next = next_from(node_id, &activities).cloned();
        debug!(instance_id = %instance_id, node_id = %node_id, next = ?next.as_ref().map(|a| &a.id), "Resolved next activity");
        Ok(next)
    }
}
