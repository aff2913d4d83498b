use anyhow::{Context as AnyhowContext, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::info;
use crate::config::RedirectConfig;
use crate::definition::DefinitionDocument;
use crate::flow::redirect::{RedirectOutcome, TaskRedirector};
use crate::runtime::memory::{InMemoryAssigneeSource, InMemoryProcessEngine};
use crate::runtime::storage::{InMemoryProvisionQueue, ProcessServices, RuntimeCommands};
use crate::runtime::task::{Assignee, Task};

/// 场景文件: a definition, an instance state to build, and one redirection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub definition: DefinitionDocument,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Activities the instance sits at before the jump.
    pub active: Vec<ActiveActivity>,
    /// Assignee configuration per activity.
    #[serde(default)]
    pub assignees: Vec<ActivityAssignees>,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveActivity {
    pub activity: String,
    #[serde(default = "default_variable")]
    pub variable: String,
    pub assignees: Vec<Assignee>,
    /// Completes this many of the created tasks before the jump.
    #[serde(default)]
    pub complete: usize,
}

fn default_variable() -> String {
    "assignee".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityAssignees {
    pub activity: String,
    pub variable: String,
    pub assignees: Vec<Assignee>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub instance_id: String,
    pub outcome: RedirectOutcome,
    /// Active tasks once the provisioning queue has been drained.
    pub active: Vec<Task>,
}

impl Scenario {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to deserialize scenario")
    }

    pub fn from_yaml_file(file_path: &str) -> Result<Self> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read scenario file from {}", file_path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid scenario in {}", file_path))
    }

    pub async fn run(self, config: RedirectConfig) -> Result<ScenarioReport> {
        let engine = Arc::new(InMemoryProcessEngine::with_config(&config));
        let assignee_source = Arc::new(InMemoryAssigneeSource::new());
        let queue = Arc::new(InMemoryProvisionQueue::new());

        let definition = self.definition.into_definition()?;
        let definition_id = definition.id.clone();
        engine.deploy(definition);

        let process_number = self.variables
            .get(&config.variables.process_number)
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .ok_or_else(|| anyhow!("scenario variables lack {}", config.variables.process_number))?;
        for binding in self.assignees {
            assignee_source.configure(&process_number, &binding.activity, &binding.variable, binding.assignees);
        }

        let instance_id = engine.start_instance(&definition_id, self.variables)?;
        for entry in &self.active {
            let created = engine.enter_activity(&instance_id, &entry.activity, &entry.assignees, &entry.variable)?;
            for task in created.iter().take(entry.complete) {
                engine.complete_task(&task.id)?;
            }
        }

        let services = ProcessServices {
            definitions: engine.clone(),
            runtime: engine.clone(),
            history: engine.clone(),
            variables: engine.clone(),
            executions: engine.clone(),
            assignees: assignee_source,
            provisioner: queue.clone(),
        };
        let redirector = TaskRedirector::new(services, config);
        let outcome = redirector.move_active(&instance_id, &self.source, &self.target).await?;

        for request in queue.drain().await {
            let task = engine.apply_add_assignee(&request)?;
            info!(task_id = %task.id, assignee = %request.assignee.id, "Provisioned task");
        }

        let active = engine.active_tasks(&instance_id).await?;
        Ok(ScenarioReport { instance_id, outcome, active })
    }
}
