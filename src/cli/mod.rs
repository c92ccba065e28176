//! CLI module.

pub mod args;
pub mod commands;
