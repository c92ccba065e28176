//! Host integrations used by the engine.

pub mod disk;
pub mod registry;
