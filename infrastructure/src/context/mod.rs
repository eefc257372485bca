//! Context-processing adapters

pub mod loader;
