use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::HashMap;
use crate::error::{FlowError, Result};
use crate::runtime::storage::VariableStore;
use crate::runtime::task::Task;

/// Variable scopes kept in Redis hashes, one per execution, linked to their
/// parent scope. Reads walk up the links; writes land on the nearest scope
/// that already holds the name.
/// Tasks must be bound with [`RedisVariableStore::bind_task`] before their
/// variables can be resolved. Multi-instance children are linked to the
/// counter-holding execution with [`RedisVariableStore::bind_execution`].
pub struct RedisVariableStore {
    client: redis::Client,
    prefix: String,
}

impl RedisVariableStore {
    pub fn new(client: redis::Client) -> Self {
        Self::with_prefix(client, "jumpflow")
    }

    pub fn with_prefix(client: redis::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    fn var_key(&self, execution_id: &str) -> String {
        format!("{}:exec:{}:vars", self.prefix, execution_id)
    }

    fn parent_key(&self, execution_id: &str) -> String {
        format!("{}:exec:{}:parent", self.prefix, execution_id)
    }

    fn task_key(&self, task_id: &str) -> String {
        format!("{}:task:{}", self.prefix, task_id)
    }

    async fn connection(&self, operation: &'static str, target: &str) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FlowError::engine(operation, target.to_string(), e))
    }

    /// Links `execution_id` to its enclosing scope.
    pub async fn bind_execution(&self, execution_id: &str, parent_id: &str) -> Result<()> {
        let target = format!("execution {}", execution_id);
        let mut conn = self.connection("bind_execution", &target).await?;
        let _: () = conn
            .set(self.parent_key(execution_id), parent_id)
            .await
            .map_err(|e| FlowError::engine("bind_execution", target, e))?;
        Ok(())
    }

    /// Records which instance and execution a task reads its variables from.
    /// An execution without a parent link is attached to the instance scope.
    pub async fn bind_task(&self, task: &Task) -> Result<()> {
        let target = format!("task {}", task.id);
        let mut conn = self.connection("bind_task", &target).await?;
        let items = [
            ("instance_id", task.process_instance_id.as_str()),
            ("execution_id", task.execution_id.as_str()),
        ];
        let _: () = conn
            .hset_multiple(self.task_key(&task.id), &items[..])
            .await
            .map_err(|e| FlowError::engine("bind_task", target.clone(), e))?;

        if task.execution_id != task.process_instance_id {
            let _: bool = conn
                .set_nx(self.parent_key(&task.execution_id), task.process_instance_id.as_str())
                .await
                .map_err(|e| FlowError::engine("bind_task", target, e))?;
        }
        Ok(())
    }

    /// `execution_id` followed by its ancestors, nearest first.
    async fn scope_chain(&self, conn: &mut redis::aio::MultiplexedConnection, execution_id: &str) -> Result<Vec<String>> {
        let mut chain = vec![execution_id.to_string()];
        loop {
            let current = &chain[chain.len() - 1];
            let parent: Option<String> = conn
                .get(self.parent_key(current))
                .await
                .map_err(|e| FlowError::engine("scope_chain", format!("execution {}", execution_id), e))?;
            match parent {
                Some(parent) if !chain.contains(&parent) => chain.push(parent),
                _ => return Ok(chain),
            }
        }
    }

    async fn scope(&self, conn: &mut redis::aio::MultiplexedConnection, execution_id: &str) -> Result<HashMap<String, Value>> {
        let raw_map: HashMap<String, String> = conn
            .hgetall(self.var_key(execution_id))
            .await
            .map_err(|e| FlowError::engine("get_variables", format!("execution {}", execution_id), e))?;

        let mut result = HashMap::new();
        for (k, v_str) in raw_map {
            if let Ok(v) = serde_json::from_str(&v_str) {
                result.insert(k, v);
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl VariableStore for RedisVariableStore {
    async fn task_variables(&self, task_id: &str) -> Result<HashMap<String, Value>> {
        let target = format!("task {}", task_id);
        let mut conn = self.connection("task_variables", &target).await?;
        let binding: HashMap<String, String> = conn
            .hgetall(self.task_key(task_id))
            .await
            .map_err(|e| FlowError::engine("task_variables", target, e))?;

        let (Some(instance_id), Some(execution_id)) = (binding.get("instance_id"), binding.get("execution_id")) else {
            return Err(FlowError::not_found("task", task_id));
        };

        let mut chain = self.scope_chain(&mut conn, execution_id).await?;
        if !chain.contains(instance_id) {
            chain.push(instance_id.clone());
        }

        let mut merged = HashMap::new();
        // root first so that narrower scopes win
        for scope_id in chain.iter().rev() {
            merged.extend(self.scope(&mut conn, scope_id).await?);
        }
        Ok(merged)
    }

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<Value>> {
        let target = format!("execution {}", execution_id);
        let mut conn = self.connection("get_variable", &target).await?;
        for scope_id in self.scope_chain(&mut conn, execution_id).await? {
            let val_str: Option<String> = conn
                .hget(self.var_key(&scope_id), name)
                .await
                .map_err(|e| FlowError::engine("get_variable", target.clone(), e))?;
            if let Some(s) = val_str {
                let val = serde_json::from_str(&s).map_err(|e| FlowError::engine("get_variable", target, e))?;
                return Ok(Some(val));
            }
        }
        Ok(None)
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        let target = format!("execution {}", execution_id);
        let mut conn = self.connection("set_variable", &target).await?;
        let val_str = serde_json::to_string(&value).map_err(|e| FlowError::engine("set_variable", target.clone(), e))?;

        let mut owner = execution_id.to_string();
        for scope_id in self.scope_chain(&mut conn, execution_id).await? {
            let holds: bool = conn
                .hexists(self.var_key(&scope_id), name)
                .await
                .map_err(|e| FlowError::engine("set_variable", target.clone(), e))?;
            if holds {
                owner = scope_id;
                break;
            }
        }

        let _: () = conn
            .hset(self.var_key(&owner), name, val_str)
            .await
            .map_err(|e| FlowError::engine("set_variable", target, e))?;
        Ok(())
    }
}
