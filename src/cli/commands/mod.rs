//! CLI command implementations.

pub mod execute;
pub mod operations;
pub mod plan;
pub mod rollback;
pub mod templates;
