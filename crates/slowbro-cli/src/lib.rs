// crates/slowbro-cli/src/lib.rs
// ============================================================================
// Module: Slowbro CLI Library
// Description: Shared wiring for the slowbro binary.
// Purpose: Expose production collaborator assembly for reuse and tests.
// Dependencies: slowbro-config, slowbro-core, slowbro-digest, slowbro-rds
// ============================================================================

//! ## Overview
//! Builds the RDS-backed diagnostician and the serve-time bind checks used by
//! the `slowbro` binary.

pub mod wiring;
