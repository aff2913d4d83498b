#![allow(dead_code)]

use async_trait::async_trait;
use jumpflow::config::RedirectConfig;
use jumpflow::definition::builder::DefinitionBuilder;
use jumpflow::definition::{Activity, ProcessDefinition};
use jumpflow::error::{FlowError, Result};
use jumpflow::flow::redirect::TaskRedirector;
use jumpflow::runtime::memory::{InMemoryAssigneeSource, InMemoryProcessEngine};
use jumpflow::runtime::storage::{InMemoryProvisionQueue, ProcessServices, RuntimeCommands, VariableStore};
use jumpflow::runtime::task::{Assignee, Task};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PROCESS_NUMBER: &str = "LV-001";

/// start -> draft -> approve(multi) -> review(multi) -> archive -> end,
/// with a parallel branch draft -> legal -> archive.
pub fn leave_definition() -> ProcessDefinition {
    DefinitionBuilder::new("leave:1")
        .name("Leave request")
        .start("start")
        .user_task("draft")
        .multi_instance_task("approve")
        .multi_instance_task("review")
        .user_task("legal")
        .user_task("archive")
        .end("end")
        .connect("start", "draft")
        .connect("draft", "approve")
        .connect("draft", "legal")
        .connect("approve", "review")
        .connect("review", "archive")
        .connect("legal", "archive")
        .connect("archive", "end")
        .build()
        .expect("valid definition")
}

pub fn users(prefix: &str, count: usize) -> Vec<Assignee> {
    (1..=count)
        .map(|i| Assignee::new(&format!("{}{}", prefix, i), &format!("User {}{}", prefix, i)))
        .collect()
}

pub struct Harness {
    pub engine: Arc<InMemoryProcessEngine>,
    pub source: Arc<InMemoryAssigneeSource>,
    pub queue: Arc<InMemoryProvisionQueue>,
    pub instance_id: String,
}

impl Harness {
    pub fn new() -> Self {
        let engine = Arc::new(InMemoryProcessEngine::new());
        engine.deploy(leave_definition());
        let vars = HashMap::from([
            ("processNumber".to_string(), json!(PROCESS_NUMBER)),
            ("formCode".to_string(), json!("LEAVE")),
            ("startUser".to_string(), json!("u0")),
        ]);
        let instance_id = engine.start_instance("leave:1", vars).expect("instance started");
        Self {
            engine,
            source: Arc::new(InMemoryAssigneeSource::new()),
            queue: Arc::new(InMemoryProvisionQueue::new()),
            instance_id,
        }
    }

    pub fn services(&self) -> ProcessServices {
        ProcessServices {
            definitions: self.engine.clone(),
            runtime: self.engine.clone(),
            history: self.engine.clone(),
            variables: self.engine.clone(),
            executions: self.engine.clone(),
            assignees: self.source.clone(),
            provisioner: self.queue.clone(),
        }
    }

    pub fn redirector(&self) -> TaskRedirector {
        TaskRedirector::new(self.services(), RedirectConfig::default())
    }

    pub fn enter(&self, activity: &str, assignees: &[Assignee]) -> Vec<Task> {
        self.engine
            .enter_activity(&self.instance_id, activity, assignees, "assignee")
            .expect("activity entered")
    }

    pub async fn active(&self) -> Vec<Task> {
        self.engine.active_tasks(&self.instance_id).await.expect("active tasks")
    }

    pub async fn active_at(&self, key: &str) -> Vec<Task> {
        self.active().await.into_iter().filter(|t| t.task_def_key == key).collect()
    }
}

/// Fails the `fail_on`-th start (1-based) and passes everything else through.
pub struct FailingRuntime {
    pub inner: Arc<InMemoryProcessEngine>,
    pub fail_on: usize,
    pub starts: AtomicUsize,
}

#[async_trait]
impl RuntimeCommands for FailingRuntime {
    async fn active_tasks(&self, instance_id: &str) -> Result<Vec<Task>> {
        self.inner.active_tasks(instance_id).await
    }

    async fn terminate(&self, task: &Task) -> Result<()> {
        self.inner.terminate(task).await
    }

    async fn start(&self, execution_id: &str, activity: &Activity, variable_name: &str, variable_value: Value) -> Result<Task> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(FlowError::engine("start", format!("execution {}", execution_id), "injected failure"));
        }
        self.inner.start(execution_id, activity, variable_name, variable_value).await
    }
}

/// Counts writes going through to the in-memory store.
pub struct CountingVariables {
    pub inner: Arc<InMemoryProcessEngine>,
    pub writes: AtomicUsize,
}

impl CountingVariables {
    pub fn new(inner: Arc<InMemoryProcessEngine>) -> Self {
        Self { inner, writes: AtomicUsize::new(0) }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariableStore for CountingVariables {
    async fn task_variables(&self, task_id: &str) -> Result<HashMap<String, Value>> {
        self.inner.task_variables(task_id).await
    }

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<Value>> {
        self.inner.get_variable(execution_id, name).await
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_variable(execution_id, name, value).await
    }
}
