//! ID prefixes and generation.
//!
//! IDs look like `tsk-a3f8b2c1`: a three-letter prefix naming the entity kind
//! and eight random hex characters.

use crate::errors::CoreError;

pub const PREFIX_TASK: &str = "tsk";
pub const PREFIX_BUILD_REQUEST: &str = "brq";
pub const PREFIX_DEBUG_LOG: &str = "dbg";
pub const PREFIX_ACTIVITY: &str = "act";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_TASK,
    PREFIX_BUILD_REQUEST,
    PREFIX_DEBUG_LOG,
    PREFIX_ACTIVITY,
];

/// Generate a prefixed ID from four random bytes.
///
/// # Errors
///
/// Returns `CoreError::Other` if the OS random source is unavailable.
pub fn generate_id(prefix: &str) -> Result<String, CoreError> {
    let mut bytes = [0u8; 4];
    getrandom::fill(&mut bytes)
        .map_err(|e| CoreError::Other(anyhow::anyhow!("failed to generate id: {e}")))?;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("{prefix}-{hex}"))
}
