pub mod naming;
pub mod reconcile;
pub mod redirect;
