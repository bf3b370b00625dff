// crates/slowbro-core/src/runtime/mod.rs
// ============================================================================
// Module: Slowbro Runtime
// Description: Orchestration engine, convergence waits, and compensation.
// Purpose: Execute diagnostic runs against the interface boundaries.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! The runtime owns sequencing and failure handling. Remote access goes
//! through [`crate::interfaces`]; [`memory`] provides an in-memory control
//! plane for tests and dry runs.

pub mod audit;
pub mod cancel;
pub mod memory;
pub mod orchestrator;
pub mod revert;
pub mod steps;
pub mod waiter;


pub use audit::*;
pub use cancel::*;
pub use memory::*;
pub use orchestrator::*;
pub use revert::*;
pub use steps::*;
pub use waiter::*;
