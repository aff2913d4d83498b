use crate::definition::{ActivityDecl, ActivityKind, DefinitionDocument, ProcessDefinition, Transition};
use crate::error::Result;

pub struct DefinitionBuilder {
    id: String,
    name: String,
    pub activities: Vec<ActivityDecl>, // public so tests can tweak declarations directly
    transitions: Vec<Transition>,
}

impl DefinitionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            activities: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    fn push(mut self, id: &str, kind: ActivityKind, multi_instance: bool) -> Self {
        self.activities.push(ActivityDecl {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            multi_instance,
        });
        self
    }

    pub fn start(self, id: &str) -> Self {
        self.push(id, ActivityKind::StartEvent, false)
    }

    pub fn end(self, id: &str) -> Self {
        self.push(id, ActivityKind::EndEvent, false)
    }

    pub fn user_task(self, id: &str) -> Self {
        self.push(id, ActivityKind::UserTask, false)
    }

    /// 会签节点 (one task per assignee)
    pub fn multi_instance_task(self, id: &str) -> Self {
        self.push(id, ActivityKind::UserTask, true)
    }

    pub fn gateway(self, id: &str) -> Self {
        self.push(id, ActivityKind::Gateway, false)
    }

    pub fn connect(mut self, source: &str, destination: &str) -> Self {
        self.transitions.push(Transition {
            source: source.to_string(),
            destination: destination.to_string(),
        });
        self
    }

    pub fn document(self) -> DefinitionDocument {
        DefinitionDocument {
            id: self.id,
            name: self.name,
            activities: self.activities,
            transitions: self.transitions,
        }
    }

    pub fn build(self) -> Result<ProcessDefinition> {
        self.document().into_definition()
    }
}
