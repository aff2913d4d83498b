pub mod builder;
pub mod loader;

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    StartEvent,
    #[default]
    UserTask,
    Gateway,
    EndEvent,
}

/// 流程图中的一条有向边
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub destination: String,
}

/// 流程图节点
/// `id` is the task definition key tasks carry at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub name: String,
    pub kind: ActivityKind,
    /// Fans out into one parallel task per assignee.
    pub multi_instance: bool,
    /// Declaration order is preserved; the navigator relies on it.
    pub outgoing: Vec<Transition>,
}

/// A deployed, immutable process graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: String,
    pub name: String,
    pub activities: Vec<Activity>,
}

impl ProcessDefinition {
    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }
}

/// Serialized form of a definition: flat activity and transition lists,
/// wired together by [`DefinitionDocument::into_definition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub activities: Vec<ActivityDecl>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDecl {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: ActivityKind,
    #[serde(default)]
    pub multi_instance: bool,
}

impl DefinitionDocument {
    pub fn into_definition(self) -> Result<ProcessDefinition> {
        if self.id.trim().is_empty() {
            return Err(FlowError::InvalidArgument("definition id must not be blank".to_string()));
        }

        let mut seen = HashSet::new();
        for decl in &self.activities {
            if !seen.insert(decl.id.as_str()) {
                return Err(FlowError::InvalidArgument(format!("Duplicate activity ID: {}", decl.id)));
            }
        }
        for tr in &self.transitions {
            for endpoint in [&tr.source, &tr.destination] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(FlowError::InvalidArgument(format!(
                        "Transition {} -> {} references unknown activity {}",
                        tr.source, tr.destination, endpoint
                    )));
                }
            }
        }

        let activities = self
            .activities
            .into_iter()
            .map(|decl| {
                let outgoing = self
                    .transitions
                    .iter()
                    .filter(|tr| tr.source == decl.id)
                    .cloned()
                    .collect();
                Activity {
                    name: if decl.name.is_empty() { decl.id.clone() } else { decl.name },
                    id: decl.id,
                    kind: decl.kind,
                    multi_instance: decl.multi_instance,
                    outgoing,
                }
            })
            .collect();

        Ok(ProcessDefinition {
            name: if self.name.is_empty() { self.id.clone() } else { self.name },
            id: self.id,
            activities,
        })
    }
}
