// crates/slowbro-server/src/lib.rs
// ============================================================================
// Module: Slowbro Server
// Description: HTTP adapter for diagnostic runs.
// Purpose: Accept diagnostic requests and return digests over HTTP.
// Dependencies: slowbro-core, slowbro-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server accepts a JSON diagnostic request on `POST /` or
//! `POST /diagnose`, validates it into a [`slowbro_core::DiagnosticJob`], and
//! runs it through a [`slowbro_core::Diagnostician`] built per request by a
//! [`DiagnosticianFactory`]. Inputs are untrusted and validated before any
//! remote call.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod form;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use form::FormError;
pub use form::TuneForm;
pub use server::DiagnosticianFactory;
pub use server::ServerError;
pub use server::ServerSettings;
pub use server::SlowbroServer;
