use jumpflow::config::NamingConfig;
use jumpflow::flow::naming::{derive_variable_name, is_starter, verify_user_names};
use jumpflow::runtime::memory::InMemoryAssigneeSource;
use jumpflow::runtime::task::Assignee;

#[test]
fn test_starter_marker_is_kept() {
    let naming = NamingConfig::default();
    assert!(is_starter("startUser", &naming));
    assert_eq!(derive_variable_name("startUser", &naming), "startUser");
}

#[test]
fn test_list_marker_is_stripped_then_pluralized() {
    let naming = NamingConfig::default();
    assert_eq!(derive_variable_name("approverList", &naming), "approvers");
    assert_eq!(derive_variable_name("deptListLeader", &naming), "deptLeaders");
    // every occurrence after the first marker goes
    assert_eq!(derive_variable_name("aListbList", &naming), "abs");
}

#[test]
fn test_plain_name_is_pluralized() {
    let naming = NamingConfig::default();
    assert_eq!(derive_variable_name("approver", &naming), "approvers");
    assert_eq!(derive_variable_name("", &naming), "s");
    // matching is case-sensitive
    assert_eq!(derive_variable_name("approverlist", &naming), "approverlists");
}

#[test]
fn test_custom_naming_config() {
    let naming = NamingConfig {
        starter_marker: "initiator".to_string(),
        list_marker: "Coll".to_string(),
        plural_suffix: "Each".to_string(),
    };
    assert_eq!(derive_variable_name("initiator", &naming), "initiator");
    assert_eq!(derive_variable_name("signerColl", &naming), "signerEach");
    assert_eq!(derive_variable_name("startUser", &naming), "startUserEach");
}

#[test]
fn test_empty_list_marker_falls_back_to_plural() {
    let naming = NamingConfig {
        list_marker: String::new(),
        ..NamingConfig::default()
    };
    assert_eq!(derive_variable_name("approverList", &naming), "approverLists");
}

#[tokio::test]
async fn test_verify_user_names() {
    let source = InMemoryAssigneeSource::new();
    source.add_sign_up(7, "approve", vec![Assignee::new("u1", "Alice"), Assignee::new("u2", "Bob")]);

    let names = verify_user_names(&source, 7, "approve").await.expect("lookup succeeds");
    assert_eq!(names, "Alice,Bob");

    let none = verify_user_names(&source, 7, "review").await.expect("lookup succeeds");
    assert_eq!(none, "");
}
