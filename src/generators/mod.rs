//! Name generators.

pub mod naming;
