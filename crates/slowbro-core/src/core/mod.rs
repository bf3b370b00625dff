// crates/slowbro-core/src/core/mod.rs
// ============================================================================
// Module: Slowbro Core Types
// Description: Data model shared by the orchestrator and its adapters.
// Purpose: Group identifiers, snapshots, settings, jobs, and faults.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain data with validation at construction boundaries.

pub mod fault;
pub mod identifiers;
pub mod instance;
pub mod job;
pub mod settings;

#[cfg(test)]
mod tests;

pub use fault::*;
pub use identifiers::*;
pub use instance::*;
pub use job::*;
pub use settings::*;
