//! Core business logic modules.

pub mod engine;
pub mod executor;
pub mod link;
pub mod operation_log;
pub mod planner;
pub mod registry;
pub mod rollback;
pub mod scanner;

pub use engine::MigrationEngine;
