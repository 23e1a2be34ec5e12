//! Self-rebuild and relaunch.
//!
//! Before doing anything else, cbuild compares its own source against the
//! running executable. If the source is newer, it recompiles itself over the
//! executable and hands control to the fresh binary with the original
//! arguments. The relaunched process carries a generation marker; a
//! relaunched generation that still looks stale fails instead of looping.

use std::ffi::OsString;
use std::path::Path;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::freshness;
use crate::invocation;
use crate::process::{Cmd, Toolchain};

/// Environment variable counting how many relaunches led to this process.
pub const GENERATION_VAR: &str = "CBUILD_BOOTSTRAP_GENERATION";

/// Result of the bootstrap check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// Self-rebuild is not configured.
    Disabled,
    /// The running executable is up to date; carry on.
    Fresh,
    /// Control went to a rebuilt binary which exited with this code.
    Relaunched(i32),
}

/// Transfers control to a rebuilt executable.
pub trait Relauncher {
    /// Start `exe` with `args` (including `args[0]`), marking the child as
    /// `generation`.
    ///
    /// Implementations that replace the process image never return `Ok`.
    fn relaunch(&mut self, exe: &Path, args: &[OsString], generation: u32) -> Result<i32>;
}

/// Relaunches through the operating system.
///
/// On Unix the process image is replaced in place. Elsewhere the rebuilt
/// binary runs as a child and its exit code is passed back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRelauncher;

impl Relauncher for ProcessRelauncher {
    fn relaunch(&mut self, exe: &Path, args: &[OsString], generation: u32) -> Result<i32> {
        let cmd = Cmd::new(exe)
            .args(args.iter().skip(1))
            .env(GENERATION_VAR, generation.to_string());

        #[cfg(unix)]
        {
            let arg0 = args.first().map(OsString::as_os_str).unwrap_or(exe.as_os_str());
            let err = cmd.exec_replace(arg0);
            Err(BuildError::RelaunchFailure(err.to_string()))
        }

        #[cfg(not(unix))]
        {
            cmd.run_interactive()
                .map_err(|e| BuildError::RelaunchFailure(e.to_string()))
        }
    }
}

/// Read this process's bootstrap generation from the environment.
pub fn current_generation() -> u32 {
    std::env::var(GENERATION_VAR)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Read this process's bootstrap generation and clear the marker, so side
/// commands and the run-phase binary start without it.
pub fn take_generation() -> u32 {
    let generation = current_generation();
    std::env::remove_var(GENERATION_VAR);
    generation
}

/// Rebuild and relaunch `exe` if its source changed.
///
/// `args` is the untouched argument vector of this process.
pub fn ensure_fresh<T: Toolchain, R: Relauncher>(
    config: &BuildConfig,
    exe: &Path,
    args: &[OsString],
    generation: u32,
    toolchain: &mut T,
    relauncher: &mut R,
) -> Result<Bootstrap> {
    let Some(source) = &config.self_source else {
        return Ok(Bootstrap::Disabled);
    };

    if !freshness::is_stale(&config.resolve(source), exe)? {
        tracing::debug!(exe = %exe.display(), generation, "executable is fresh");
        return Ok(Bootstrap::Fresh);
    }

    if generation > 0 {
        return Err(BuildError::RelaunchFailure(format!(
            "{} is still older than {} after rebuilding (clock skew?)",
            exe.display(),
            source.display()
        )));
    }

    let cmd = invocation::self_rebuild(config, source, exe);
    println!("Rebuilding: {cmd}");
    let code = toolchain
        .execute(&cmd, &config.root)
        .map_err(|e| BuildError::RelaunchFailure(e.to_string()))?;
    if code != 0 {
        return Err(BuildError::RelaunchFailure(format!(
            "rebuild failed (exit code {code})"
        )));
    }

    let shown: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
    println!("Relaunching: {}", shown.join(" "));
    let code = relauncher.relaunch(exe, args, generation + 1)?;
    Ok(Bootstrap::Relaunched(code))
}
