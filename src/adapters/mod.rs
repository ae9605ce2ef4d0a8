// Adapters layer: concrete implementations for external systems.

pub mod rest;
pub mod writer;
