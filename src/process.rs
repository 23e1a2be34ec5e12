//! External command execution.
//!
//! Every toolchain call goes through [`Toolchain`], so the build engine can
//! be driven by a fake in tests. [`SystemToolchain`] runs real processes via
//! the [`Cmd`] builder: no shell, inherited stdio, blocking until exit.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{BuildError, Result};
use crate::invocation::Invocation;

/// Something that can run a synthesized command to completion.
pub trait Toolchain {
    /// Run `invocation` in `dir` and return its exit code.
    ///
    /// A non-zero code is not an error here; callers decide what failure
    /// means for their step. Errors are reserved for commands that could
    /// not be started at all.
    fn execute(&mut self, invocation: &Invocation, dir: &Path) -> Result<i32>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn execute(&mut self, invocation: &Invocation, dir: &Path) -> Result<i32> {
        Cmd::from(invocation).dir(dir).run_interactive()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> BuildError {
        BuildError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        }
    }

    /// Run the command with inherited stdio and return its exit code.
    ///
    /// Output goes directly to the terminal. A process killed by a signal
    /// reports -1.
    pub fn run_interactive(self) -> Result<i32> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        tracing::debug!(program = ?self.program, args = ?self.args, "spawning");
        let status = cmd.status().map_err(|e| self.spawn_error(e))?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Replace the current process image with this command.
    ///
    /// Only returns if the replacement failed.
    #[cfg(unix)]
    pub fn exec_replace(self, arg0: &OsStr) -> BuildError {
        use std::os::unix::process::CommandExt;

        let mut cmd = self.command();
        cmd.arg0(arg0);
        let err = cmd.exec();
        self.spawn_error(err)
    }
}

impl From<&Invocation> for Cmd {
    fn from(invocation: &Invocation) -> Self {
        Cmd::new(&invocation.program).args(&invocation.args)
    }
}
