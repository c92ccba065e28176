//! Data models.

pub mod config;
pub mod link;
pub mod operation;
pub mod options;
pub mod plan;
pub mod progress;
pub mod registry;
pub mod result;
pub mod software;
