//! App Relocator Library
//!
//! Moves an installed application to another drive, leaves a junction or
//! symbolic link at the original path, rewrites registry references and keeps
//! a durable record of every step so the move can be rolled back.

pub mod cli;
pub mod core;
pub mod error;
pub mod generators;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
