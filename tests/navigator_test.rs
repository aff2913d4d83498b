mod common;

use common::{Harness, leave_definition};
use jumpflow::definition::builder::DefinitionBuilder;
use jumpflow::error::FlowError;
use jumpflow::navigator::{ProcessNavigator, next_from, next_set_from};

fn ids(activities: &[&jumpflow::definition::Activity]) -> Vec<String> {
    let mut ids: Vec<String> = activities.iter().map(|a| a.id.clone()).collect();
    ids.sort();
    ids
}

#[test]
fn test_next_from_follows_first_transition() {
    let definition = leave_definition();

    // draft -> approve is declared before draft -> legal
    let next = next_from("draft", &definition.activities).expect("draft has a successor");
    assert_eq!(next.id, "approve");

    let again = next_from("draft", &definition.activities).expect("draft has a successor");
    assert_eq!(next, again);
}

#[test]
fn test_next_from_without_match() {
    let definition = leave_definition();

    assert!(next_from("missing", &definition.activities).is_none());
    assert!(next_from("end", &definition.activities).is_none(), "end has no outgoing transition");
    assert!(next_from("", &definition.activities).is_none());
}

#[test]
fn test_next_set_collects_all_destinations() {
    let definition = leave_definition();

    let next = next_set_from("draft", &definition.activities);
    assert_eq!(ids(&next), vec!["approve", "legal"]);
}

#[test]
fn test_next_set_stops_at_first_matching_activity() {
    let definition = leave_definition();

    // "draft" comes before "approve" in the activity list, so approve's
    // successors are never merged in.
    let next = next_set_from("approve,draft", &definition.activities);
    assert_eq!(ids(&next), vec!["approve", "legal"]);

    let only_review = next_set_from("review,legal", &definition.activities);
    assert_eq!(ids(&only_review), vec!["archive"]);

    assert!(next_set_from("nope,also-nope", &definition.activities).is_empty());
}

#[test]
fn test_next_set_removes_duplicate_destinations() {
    let definition = DefinitionBuilder::new("dup")
        .gateway("split")
        .user_task("a")
        .connect("split", "a")
        .connect("split", "a")
        .build()
        .expect("valid definition");

    let next = next_set_from("split", &definition.activities);
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].id, "a");
}

#[tokio::test]
async fn test_next_for_instance() {
    let harness = Harness::new();
    let navigator = ProcessNavigator::new(harness.engine.clone(), harness.engine.clone());

    let next = navigator
        .next_for_instance("approve", &harness.instance_id)
        .await
        .expect("lookup succeeds");
    assert_eq!(next.map(|a| a.id), Some("review".to_string()));

    let none = navigator
        .next_for_instance("end", &harness.instance_id)
        .await
        .expect("lookup succeeds");
    assert!(none.is_none());
}

#[tokio::test]
async fn test_next_for_instance_errors() {
    let harness = Harness::new();
    let navigator = ProcessNavigator::new(harness.engine.clone(), harness.engine.clone());

    let blank = navigator.next_for_instance(" ", &harness.instance_id).await;
    assert!(matches!(blank, Err(FlowError::InvalidArgument(_))));

    let blank_instance = navigator.next_for_instance("draft", "").await;
    assert!(matches!(blank_instance, Err(FlowError::InvalidArgument(_))));

    let unknown = navigator.next_for_instance("draft", "no-such-instance").await;
    assert!(matches!(unknown, Err(FlowError::NotFound { .. })));

    let undeployed = navigator.activities_of("ghost:1").await;
    assert!(matches!(undeployed, Err(FlowError::NotFound { .. })));
}
