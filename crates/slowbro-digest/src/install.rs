// crates/slowbro-digest/src/install.rs
// ============================================================================
// Module: Digest Tool Installation
// Description: Download and atomic installation of the analysis tool.
// Purpose: Make the tool available at its configured path on first use.
// Dependencies: reqwest, tempfile, tokio
// ============================================================================

//! ## Overview
//! The tool is fetched over HTTP(S) with a bounded body, written to a
//! temporary file beside the target, marked executable, and renamed into
//! place so a concurrent reader never sees a partial file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use reqwest::Client;
use slowbro_core::DigestError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on the downloaded tool size.
pub const MAX_TOOL_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Download
// ============================================================================

/// Downloads the tool body from `url`.
///
/// # Errors
///
/// Returns [`DigestError::Unavailable`] on transport failures, non-success
/// statuses, or oversized bodies.
pub async fn download_tool(client: &Client, url: &str) -> Result<Vec<u8>, DigestError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|err| DigestError::Unavailable(format!("download from {url} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(DigestError::Unavailable(format!(
            "download from {url} returned http status {}",
            response.status()
        )));
    }
    if let Some(length) = response.content_length()
        && usize::try_from(length).unwrap_or(usize::MAX) > MAX_TOOL_BYTES
    {
        return Err(too_large());
    }
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| DigestError::Unavailable(format!("download from {url} failed: {err}")))?
    {
        if body.len().saturating_add(chunk.len()) > MAX_TOOL_BYTES {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    if body.is_empty() {
        return Err(DigestError::Unavailable(format!("download from {url} was empty")));
    }
    Ok(body)
}

/// Error for a tool body over the size bound.
fn too_large() -> DigestError {
    DigestError::Unavailable(format!("tool download exceeds {MAX_TOOL_BYTES} bytes"))
}

// ============================================================================
// SECTION: Installation
// ============================================================================

/// Writes `body` to `target` atomically with mode 0755.
///
/// # Errors
///
/// Returns [`DigestError::Unavailable`] when the file cannot be written.
pub fn install_tool(target: &Path, body: &[u8]) -> Result<PathBuf, DigestError> {
    let io_err = |err: std::io::Error| {
        DigestError::Unavailable(format!("installing {} failed: {err}", target.display()))
    };
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(io_err)?;
    let mut staged = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    staged.write_all(body).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    set_executable(staged.path()).map_err(io_err)?;
    staged.persist(target).map_err(|err| io_err(err.error))?;
    Ok(target.to_path_buf())
}

/// Marks a file executable by its owner and readable by everyone.
#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

/// Marks a file executable; a no-op where modes do not apply.
#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
