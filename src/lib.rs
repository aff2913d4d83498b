pub mod config;
pub mod definition;
pub mod error;
pub mod flow;
pub mod navigator;
pub mod runtime;
pub mod scenario;
