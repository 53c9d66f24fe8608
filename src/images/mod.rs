//! Binary images attached to reports.

pub mod repo;
pub mod repo_types;
pub mod services;
