mod common;

use common::{CountingVariables, Harness, users};
use jumpflow::config::{CounterKeys, NamingConfig};
use jumpflow::error::FlowError;
use jumpflow::flow::reconcile::{AssigneePlan, MultiInstanceCounters, Reconciler, outstanding_count};
use jumpflow::runtime::storage::VariableStore;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_clamp_to_last_assignee() {
    let plan = AssigneePlan::new("reviewerList", users("u", 2), None, &NamingConfig::default());

    assert_eq!(plan.assignee_at(0).unwrap().id, "u1");
    assert_eq!(plan.assignee_at(1).unwrap().id, "u2");
    assert_eq!(plan.assignee_at(2).unwrap().id, "u2");

    let (name, value) = plan.binding(2).unwrap();
    assert_eq!(name, "reviewers");
    assert_eq!(value, json!("u2"));
}

#[test]
fn test_empty_assignees_are_invalid_state() {
    let plan = AssigneePlan::new("reviewerList", Vec::new(), None, &NamingConfig::default());

    assert!(matches!(plan.assignee_at(0), Err(FlowError::InvalidState(_))));
    assert!(matches!(plan.ensure_resolvable(1, true), Err(FlowError::InvalidState(_))));
    assert!(matches!(plan.ensure_resolvable(1, false), Err(FlowError::InvalidState(_))));
    // nothing to bind, nothing to check
    assert!(plan.ensure_resolvable(0, true).is_ok());
}

#[test]
fn test_starter_binding_uses_starter_identity() {
    let plan = AssigneePlan::new("startUser", Vec::new(), Some("u0".to_string()), &NamingConfig::default());

    assert!(plan.ensure_resolvable(2, false).is_ok());
    assert!(matches!(plan.ensure_resolvable(2, true), Err(FlowError::InvalidState(_))));
    assert_eq!(plan.binding(5).unwrap(), ("startUser".to_string(), json!("u0")));

    let no_starter = AssigneePlan::new("startUser", users("u", 1), None, &NamingConfig::default());
    assert!(matches!(no_starter.ensure_resolvable(1, false), Err(FlowError::InvalidState(_))));
}

#[test]
fn test_outstanding_assignees_keep_order() {
    let plan = AssigneePlan::new("reviewer", users("r", 5), None, &NamingConfig::default());

    assert_eq!(outstanding_count(5, 2, 1), 2);
    let tail: Vec<&str> = plan.outstanding(2 + 1).iter().map(|a| a.id.as_str()).collect();
    assert_eq!(tail, vec!["r4", "r5"]);

    assert_eq!(outstanding_count(2, 3, 0), 0);
    assert!(plan.outstanding(9).is_empty());
}

#[test]
fn test_counter_repair_is_pure() {
    let observed = MultiInstanceCounters { total: 3, active: 2, completed: 1 };
    let (repaired, changed) = MultiInstanceCounters::repair(2, observed);
    assert!(changed);
    assert_eq!(repaired, MultiInstanceCounters::converged(2));
    assert!(repaired.is_consistent());

    let (same, changed) = MultiInstanceCounters::repair(2, repaired);
    assert!(!changed);
    assert_eq!(same, repaired);

    assert!(!MultiInstanceCounters { total: 1, active: 2, completed: 0 }.is_consistent());
}

#[tokio::test]
async fn test_repair_counters_writes_once() {
    let harness = Harness::new();
    let tasks = harness.enter("approve", &users("u", 3));
    harness.engine.complete_task(&tasks[0].id).expect("task completed");

    let counting = Arc::new(CountingVariables::new(harness.engine.clone()));
    let reconciler = Reconciler::new(counting.clone(), CounterKeys::default());

    let before = reconciler.read_counters(&tasks[1].execution_id).await.unwrap();
    assert_eq!(before, MultiInstanceCounters { total: 3, active: 2, completed: 1 });

    let first = reconciler.repair_counters(&tasks[1].execution_id, 2).await.unwrap();
    assert!(first.written);
    assert_eq!(first.after, MultiInstanceCounters::converged(2));
    assert_eq!(counting.writes(), 3);

    let second = reconciler.repair_counters(&tasks[1].execution_id, 2).await.unwrap();
    assert!(!second.written);
    assert_eq!(second.after, first.after);
    assert_eq!(counting.writes(), 3, "converged counters must not be rewritten");

    // written on the multi-instance scope, not on the child execution
    let parent = harness.engine.multi_instance_execution(&harness.instance_id, "approve").unwrap();
    assert_eq!(harness.engine.get_variable(&parent, "nrOfInstances").await.unwrap(), Some(json!(2)));
}

#[tokio::test]
async fn test_non_numeric_counter_is_invalid_state() {
    let harness = Harness::new();
    let tasks = harness.enter("approve", &users("u", 2));
    harness.engine
        .set_variable(&tasks[0].execution_id, "nrOfActiveInstances", json!("two"))
        .await
        .unwrap();

    let reconciler = Reconciler::new(harness.engine.clone(), CounterKeys::default());
    let result = reconciler.repair_counters(&tasks[0].execution_id, 2).await;
    assert!(matches!(result, Err(FlowError::InvalidState(_))));
}
