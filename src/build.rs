//! Build orchestration.
//!
//! One pass runs the requested phases strictly in order:
//! clean, directory creation, init, compile, link and library copy, run.
//! Any fatal error stops the pass; objects already produced stay on disk and
//! the next pass's staleness check picks up where this one stopped.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::freshness;
use crate::invocation::{self, Invocation};
use crate::process::Toolchain;
use crate::record::BuildRecord;
use crate::timing::Timer;
use crate::unit::{self, TranslationUnit};

/// Which optional phases a pass executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    pub clean: bool,
    pub init: bool,
    pub build: bool,
    pub run: bool,
}

impl Actions {
    /// The no-flag default: build only.
    pub fn build_only() -> Self {
        Self {
            build: true,
            ..Self::default()
        }
    }
}

/// What a successful pass did.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Sources compiled this pass, in link order.
    pub compiled: Vec<PathBuf>,
    /// Sources whose objects were already up to date.
    pub skipped: Vec<PathBuf>,
    pub linked: bool,
    /// Path of the written `compile_commands.json`, if any.
    pub record: Option<PathBuf>,
    /// Non-fatal problems (failed library copy, unwritable build record).
    pub warnings: Vec<String>,
    /// Exit code of the built binary when the run phase executed.
    pub run_exit: Option<i32>,
}

impl BuildReport {
    /// A pass that succeeded with warnings.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn warn(&mut self, message: String) {
        eprintln!("[WARN] {message}");
        self.warnings.push(message);
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The pass completed; carries the built binary's exit code when the
    /// run phase executed.
    Success { run_exit: Option<i32> },
    CompileFailure(PathBuf),
    LinkFailure,
    RelaunchFailure,
    ConfigurationError,
}

impl BuildOutcome {
    pub fn from_result(result: &Result<BuildReport>) -> Self {
        match result {
            Ok(report) => Self::Success {
                run_exit: report.run_exit,
            },
            Err(err) => Self::from_error(err),
        }
    }

    pub fn from_error(err: &BuildError) -> Self {
        match err {
            BuildError::CompileFailure { unit, .. } => Self::CompileFailure(unit.clone()),
            BuildError::LinkFailure { .. } => Self::LinkFailure,
            BuildError::RelaunchFailure(_) => Self::RelaunchFailure,
            BuildError::Configuration(_) | BuildError::Io { .. } | BuildError::Spawn { .. } => {
                Self::ConfigurationError
            }
        }
    }

    /// Process exit code: the run phase's code if it ran, otherwise 0 for
    /// success and 1 for any failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { run_exit } => run_exit.unwrap_or(0),
            _ => 1,
        }
    }
}

/// Stamp file under the object directory holding the last link command.
pub const LINK_STAMP: &str = ".link-command";

/// Last recorded link command. `None` if there is none or it can't be read.
fn read_link_stamp(stamp: &Path) -> Option<String> {
    if !stamp.exists() {
        return None;
    }
    match fs::read_to_string(stamp) {
        Ok(s) => Some(s.trim().to_string()),
        Err(e) => {
            eprintln!(
                "  [WARN] Failed to read link stamp {}: {} (will relink)",
                stamp.display(),
                e
            );
            None
        }
    }
}

/// Drives one build pass against a toolchain.
pub struct Orchestrator<'a, T: Toolchain> {
    config: &'a BuildConfig,
    toolchain: T,
}

impl<'a, T: Toolchain> Orchestrator<'a, T> {
    pub fn new(config: &'a BuildConfig, toolchain: T) -> Self {
        Self { config, toolchain }
    }

    /// Give back the toolchain (tests inspect what was executed).
    pub fn into_toolchain(self) -> T {
        self.toolchain
    }

    /// Execute the requested phases in order.
    pub fn run(&mut self, actions: Actions) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        if actions.clean {
            self.clean()?;
        }

        self.ensure_dirs()?;

        if actions.init {
            self.init()?;
        }

        if !actions.build {
            return Ok(report);
        }

        let target = self.config.target_binary();
        println!("Target binary: {}", target.display());

        let t = Timer::start("Compile");
        let units = unit::discover(self.config)?;
        if units.is_empty() {
            return Err(BuildError::Configuration(format!(
                "No *{} sources found in {}",
                self.config.src_ext,
                self.config.src_dir.display()
            )));
        }
        let mut record = BuildRecord::new();
        self.compile_units(&units, &mut record, &mut report)?;
        t.finish();

        if self.config.compile_commands {
            match record.write(&self.config.root) {
                Ok(path) => report.record = Some(path),
                Err(e) => report.warn(format!("Build record not written: {e}")),
            }
        }

        let t = Timer::start("Link");
        let recompiled = !report.compiled.is_empty();
        let linked = self.link(&units, recompiled, &mut report)?;
        report.linked = linked;
        self.copy_libraries(&mut report);
        t.finish();

        println!("Success: Executable created at {}", target.display());

        if actions.run {
            report.run_exit = Some(self.run_binary()?);
        }

        Ok(report)
    }

    fn exec(&mut self, invocation: &Invocation) -> Result<i32> {
        self.toolchain.execute(invocation, &self.config.root)
    }

    /// Remove the object and binary directories.
    fn clean(&mut self) -> Result<()> {
        let cmd = invocation::clean(self.config)?;
        println!("Cleaning: {cmd}");
        let code = self.exec(&cmd)?;
        if code != 0 {
            return Err(BuildError::Configuration(format!(
                "clean command failed (exit code {code})"
            )));
        }
        Ok(())
    }

    /// Create every project directory. Existing directories are fine.
    fn ensure_dirs(&self) -> Result<()> {
        for dir in self.config.required_dirs() {
            let path = self.config.resolve(&dir);
            fs::create_dir_all(&path).map_err(|e| {
                BuildError::Configuration(format!("mkdir {} failed: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        let Some(cmd) = invocation::init(self.config) else {
            println!("No additional init specified");
            return Ok(());
        };
        println!("Additional init: {cmd}");
        let code = self.exec(&cmd)?;
        if code != 0 {
            return Err(BuildError::Configuration(format!(
                "init command '{cmd}' failed (exit code {code})"
            )));
        }
        Ok(())
    }

    /// Compile every stale unit, stopping at the first failure.
    ///
    /// Every discovered unit lands in `record`, compiled or not, so the
    /// build record always describes the whole project.
    fn compile_units(
        &mut self,
        units: &[TranslationUnit],
        record: &mut BuildRecord,
        report: &mut BuildReport,
    ) -> Result<()> {
        for unit in units {
            let cmd = invocation::compile(self.config, unit);
            let stale = freshness::is_stale(
                &self.config.resolve(&unit.source),
                &self.config.resolve(&unit.object),
            )?;

            if stale {
                println!("Compiling: {cmd}");
                let code = self.exec(&cmd)?;
                if code != 0 {
                    return Err(BuildError::CompileFailure {
                        unit: unit.source.clone(),
                        code,
                    });
                }
                report.compiled.push(unit.source.clone());
            } else {
                println!("[SKIP] {} (up-to-date)", unit.source.display());
                report.skipped.push(unit.source.clone());
            }

            record.push(cmd, unit.source.clone());
        }
        Ok(())
    }

    /// Link all objects unless the binary is already up to date.
    ///
    /// The binary is up to date when nothing was recompiled, it is newer than
    /// every object, and the last successful link used the same command. The
    /// last command is kept in a stamp file under the object directory, so
    /// removing or adding a unit changes the object list and forces a relink.
    fn link(
        &mut self,
        units: &[TranslationUnit],
        recompiled: bool,
        report: &mut BuildReport,
    ) -> Result<bool> {
        let binary = self.config.resolve(&self.config.target_binary());
        let cmd = invocation::link(self.config, units);
        let stamp = self.config.resolve(&self.config.obj_dir.join(LINK_STAMP));

        let mut needed = recompiled || !binary.exists();
        if !needed && read_link_stamp(&stamp).as_deref() != Some(cmd.to_string().as_str()) {
            tracing::debug!(stamp = %stamp.display(), "link command changed since last link");
            needed = true;
        }
        for unit in units {
            if needed {
                break;
            }
            needed = freshness::is_stale(&self.config.resolve(&unit.object), &binary)?;
        }

        if !needed {
            println!("[SKIP] Link ({} is up-to-date)", self.config.target_binary().display());
            return Ok(false);
        }

        println!("Linking: {cmd}");
        let code = self.exec(&cmd)?;
        if code != 0 {
            return Err(BuildError::LinkFailure { code });
        }
        if let Err(e) = fs::write(&stamp, cmd.to_string()) {
            report.warn(format!("Cannot write {}: {}", stamp.display(), e));
        }
        Ok(true)
    }

    /// Best-effort copy of runtime libraries beside the binary.
    fn copy_libraries(&mut self, report: &mut BuildReport) {
        let lib_dir = self.config.resolve(&self.config.lib_dir);
        let mut files = Vec::new();
        for entry in WalkDir::new(&lib_dir).min_depth(1).max_depth(1) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    files.push(self.config.lib_dir.join(entry.file_name()));
                }
                Ok(_) => {}
                Err(e) => {
                    report.warn(format!("Cannot read {}: {}", lib_dir.display(), e));
                    return;
                }
            }
        }

        if files.is_empty() {
            println!("Nothing to copy");
            return;
        }
        files.sort();

        let result = invocation::copy_libraries(self.config, &files).and_then(|cmd| {
            println!("Copying libraries: {cmd}");
            self.exec(&cmd)
        });
        match result {
            Ok(0) => {}
            Ok(code) => report.warn(format!(
                "Some or all library files could not be copied (exit code {code})"
            )),
            Err(e) => report.warn(format!("Some or all library files could not be copied: {e}")),
        }
    }

    fn run_binary(&mut self) -> Result<i32> {
        let cmd = invocation::run(self.config);
        println!("Executing: {cmd}\n--- RUN OUTPUT ---");
        let code = self.exec(&cmd)?;
        if code != 0 {
            eprintln!(
                "Execution failed for {} (exit code {code})",
                self.config.target_binary().display()
            );
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(BuildOutcome::Success { run_exit: None }.exit_code(), 0);
        assert_eq!(BuildOutcome::Success { run_exit: Some(7) }.exit_code(), 7);
        assert_eq!(BuildOutcome::LinkFailure.exit_code(), 1);
        assert_eq!(BuildOutcome::CompileFailure("src/a.c".into()).exit_code(), 1);
    }

    #[test]
    fn test_outcome_from_result() {
        let report = BuildReport {
            run_exit: Some(3),
            ..BuildReport::default()
        };
        assert_eq!(
            BuildOutcome::from_result(&Ok(report)),
            BuildOutcome::Success { run_exit: Some(3) }
        );
        let failed: Result<BuildReport> = Err(BuildError::LinkFailure { code: 2 });
        assert_eq!(BuildOutcome::from_result(&failed), BuildOutcome::LinkFailure);
    }

    #[test]
    fn test_outcome_from_error() {
        let err = BuildError::CompileFailure {
            unit: "src/a.c".into(),
            code: 2,
        };
        assert_eq!(
            BuildOutcome::from_error(&err),
            BuildOutcome::CompileFailure("src/a.c".into())
        );
        assert_eq!(
            BuildOutcome::from_error(&BuildError::RelaunchFailure("x".into())),
            BuildOutcome::RelaunchFailure
        );
        let io = BuildError::io("src/a.c", std::io::Error::other("gone"));
        assert_eq!(BuildOutcome::from_error(&io), BuildOutcome::ConfigurationError);
    }

    #[test]
    fn test_build_only_default() {
        let a = Actions::build_only();
        assert!(a.build && !a.clean && !a.init && !a.run);
    }
}
