//! Error types for cbuild.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run.
///
/// Every variant is fatal. Degraded-but-successful conditions (a failed
/// library copy) are reported on [`crate::build::BuildReport`] instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot stat {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compilation failed for {} (exit code {code})", unit.display())]
    CompileFailure { unit: PathBuf, code: i32 },

    #[error("Linking failed (exit code {code})")]
    LinkFailure { code: i32 },

    #[error("Relaunch failed: {0}")]
    RelaunchFailure(String),

    #[error("Failed to execute '{program}'. Is it installed? ({source})")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
