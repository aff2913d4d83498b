use crate::config::NamingConfig;
use crate::error::Result;
use crate::runtime::storage::AssigneeSource;

pub fn is_starter(configured: &str, naming: &NamingConfig) -> bool {
    configured == naming.starter_marker
}

/// Per-task variable name for an activity's configured assignee variable.
///
/// - the starter marker is kept as is
/// - `approverList` becomes `approvers` (marker removed, then pluralized)
/// - anything else is pluralized: `approver` becomes `approvers`
pub fn derive_variable_name(configured: &str, naming: &NamingConfig) -> String {
    if is_starter(configured, naming) {
        return configured.to_string();
    }
    let marker = naming.list_marker.as_str();
    match configured.find(marker).filter(|_| !marker.is_empty()) {
        Some(index) => {
            let (head, tail) = configured.split_at(index);
            format!("{}{}{}", head, tail.replace(marker, ""), naming.plural_suffix)
        }
        None => format!("{}{}", configured, naming.plural_suffix),
    }
}

/// Display names of the sign-up assignees recorded for an element, comma-joined.
pub async fn verify_user_names(source: &dyn AssigneeSource, variable_id: i64, element_id: &str) -> Result<String> {
    let signed_up = source.sign_up_assignees(variable_id, element_id).await?;
    Ok(signed_up.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(","))
}
