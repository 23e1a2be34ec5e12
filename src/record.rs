//! `compile_commands.json` emission for editor and IDE tooling.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::invocation::Invocation;

/// File name of the build record, written into the project root.
pub const RECORD_FILE: &str = "compile_commands.json";

/// One compile command and the source file it was synthesized for.
#[derive(Debug, Clone)]
struct InvocationRecord {
    invocation: Invocation,
    source: PathBuf,
}

/// A single entry of the JSON compilation database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    pub directory: String,
    pub command: String,
    pub file: String,
}

/// Compile invocations collected during one build pass, in discovery order.
#[derive(Debug, Default)]
pub struct BuildRecord {
    records: Vec<InvocationRecord>,
}

impl BuildRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, invocation: Invocation, source: PathBuf) {
        self.records.push(InvocationRecord { invocation, source });
    }

    /// Convert every record into a database entry rooted at `directory`.
    pub fn entries(&self, directory: &Path) -> Vec<CompileCommand> {
        let directory = directory.to_string_lossy().into_owned();
        self.records
            .iter()
            .map(|record| {
                let file = match extract_source(&record.invocation) {
                    Some(file) => file.to_string(),
                    None => {
                        eprintln!(
                            "  [WARN] No source token in '{}', using {}",
                            record.invocation,
                            record.source.display()
                        );
                        record.source.to_string_lossy().into_owned()
                    }
                };
                CompileCommand {
                    directory: directory.clone(),
                    command: record.invocation.to_string(),
                    file,
                }
            })
            .collect()
    }

    /// Write the database to `<directory>/compile_commands.json`, replacing
    /// any previous one. Consumes the record; it is not needed afterwards.
    pub fn write(self, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(&self.entries(directory))
            .map_err(|e| BuildError::io(&path, e.into()))?;
        fs::write(&path, json + "\n").map_err(|e| BuildError::io(&path, e))?;
        tracing::debug!(entries = self.records.len(), path = %path.display(), "wrote build record");
        Ok(path)
    }
}

/// The source file is the token following `-c`.
fn extract_source(invocation: &Invocation) -> Option<&str> {
    let mut args = invocation.args.iter();
    args.by_ref().find(|a| *a == "-c")?;
    args.next().map(String::as_str)
}
