// src/core/mod.rs

/// Error types shared across the scan pipeline.
pub mod errors;

/// Result records and their JSON shape.
pub mod models;

/// External lookups and the orchestrator that sequences them.
pub mod scanner;

pub mod store;
pub mod target;
pub mod worker;
