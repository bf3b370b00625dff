// crates/slowbro-digest/src/lib.rs
// ============================================================================
// Module: Slowbro Digest
// Description: Slow-query log analysis through an external digest tool.
// Purpose: Turn raw slow-query log bytes into deterministic digest text.
// Dependencies: slowbro-core, reqwest, tempfile, tokio
// ============================================================================

//! ## Overview
//! [`PtQueryDigest`] implements [`slowbro_core::DigestProducer`] by running
//! `pt-query-digest` over a temporary copy of the log. The tool is downloaded
//! on first use when it is missing and auto-download is enabled.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod install;
pub mod tool;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use install::MAX_TOOL_BYTES;
pub use tool::PtQueryDigest;
pub use tool::PtQueryDigestConfig;
pub use tool::REPORT_FORMAT;
