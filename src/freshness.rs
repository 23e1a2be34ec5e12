//! Timestamp-based rebuild detection.
//!
//! A derived artifact is stale when it is missing or when its source was
//! modified strictly later. Equal timestamps count as up to date, so coarse
//! filesystem clocks don't trigger rebuild storms.

use std::fs;
use std::path::Path;

use crate::error::{BuildError, Result};

/// Check whether `derived` must be rebuilt from `source`.
///
/// Fails if `source` cannot be stat'ed: a missing source is an environment
/// problem, not a reason to rebuild.
pub fn is_stale(source: &Path, derived: &Path) -> Result<bool> {
    let src_time = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| BuildError::io(source, e))?;

    let Ok(derived_meta) = fs::metadata(derived) else {
        return Ok(true);
    };
    let Ok(derived_time) = derived_meta.modified() else {
        return Ok(true);
    };

    Ok(src_time > derived_time)
}
