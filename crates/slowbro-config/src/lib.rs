// crates/slowbro-config/src/lib.rs
// ============================================================================
// Module: Slowbro Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for slowbro.toml semantics.
// Dependencies: slowbro-core, serde, toml
// ============================================================================

//! ## Overview
//! `slowbro-config` defines the configuration model shared by the server and
//! CLI. Validation is strict and fail-closed; values convert into the core's
//! [`slowbro_core::OrchestratorConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
